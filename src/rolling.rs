use std::collections::{HashMap, VecDeque};

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::neutralize::NeutralizedPlay;
use crate::params::BuildParams;
use crate::taxonomy::{ComboTable, PLAY_TYPE_COUNT, PitbatCombo, PlayShares};

/// Rolled, renormalized trailing shares for one plate appearance. Each entry
/// is aligned with `BuildParams::rolling_windows`; `None` marks a window
/// with insufficient history (below the min-periods floor, or an empty sum),
/// which is an explicit missing-data signal rather than a zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolledPa {
    pub play_id: u64,
    pub batter_windows: Vec<Option<PlayShares>>,
    pub pitcher_windows: Vec<Option<PlayShares>>,
}

/// Compute trailing-window shares for every play, per combo, for batters and
/// pitchers. Windows are closed-left: the window for a play covers only
/// strictly earlier plays by the same player, never the play itself, so the
/// features carry no lookahead.
pub fn roll_neutralized_stats(
    neutralized: &ComboTable<Vec<NeutralizedPlay>>,
    params: &BuildParams,
) -> ComboTable<Vec<RolledPa>> {
    let rolled: Vec<Vec<RolledPa>> = PitbatCombo::ALL
        .par_iter()
        .map(|combo| roll_combo(neutralized.get(*combo), params))
        .collect();

    let mut out: ComboTable<Vec<RolledPa>> = ComboTable::default();
    for (combo, combo_rows) in PitbatCombo::ALL.into_iter().zip(rolled) {
        *out.get_mut(combo) = combo_rows;
    }
    out
}

fn roll_combo(rows: &[NeutralizedPlay], params: &BuildParams) -> Vec<RolledPa> {
    let mut out: Vec<RolledPa> = rows
        .iter()
        .map(|r| RolledPa {
            play_id: r.play.play_id,
            batter_windows: Vec::with_capacity(params.rolling_windows.len()),
            pitcher_windows: Vec::with_capacity(params.rolling_windows.len()),
        })
        .collect();

    for &window in &params.rolling_windows {
        let min_periods = params.min_periods(window);
        let batter = roll_grouped(rows, window, min_periods, |r| r.play.batter);
        let pitcher = roll_grouped(rows, window, min_periods, |r| r.play.pitcher);
        for (idx, rolled) in out.iter_mut().enumerate() {
            rolled.batter_windows.push(batter[idx]);
            rolled.pitcher_windows.push(pitcher[idx]);
        }
    }
    out
}

/// Trailing sums of play-value indicators over the previous `window` plays
/// per player, renormalized so the shares sum to 1.
fn roll_grouped(
    rows: &[NeutralizedPlay],
    window: usize,
    min_periods: usize,
    player: impl Fn(&NeutralizedPlay) -> u32,
) -> Vec<Option<PlayShares>> {
    struct Trail {
        recent: VecDeque<(usize, f64)>,
        totals: PlayShares,
    }

    let mut trails: HashMap<u32, Trail> = HashMap::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        let trail = trails.entry(player(row)).or_insert_with(|| Trail {
            recent: VecDeque::with_capacity(window + 1),
            totals: [0.0; PLAY_TYPE_COUNT],
        });

        // Emit before pushing: the current PA never contributes to its own
        // window.
        out.push(normalized(&trail.totals, trail.recent.len(), min_periods));

        let type_index = row.play.play_type.index();
        trail.recent.push_back((type_index, row.play_value));
        trail.totals[type_index] += row.play_value;
        if trail.recent.len() > window
            && let Some((evicted_type, evicted_value)) = trail.recent.pop_front()
        {
            trail.totals[evicted_type] -= evicted_value;
        }
    }
    out
}

fn normalized(totals: &PlayShares, prior: usize, min_periods: usize) -> Option<PlayShares> {
    if prior < min_periods.max(1) {
        return None;
    }
    let sum: f64 = totals.iter().sum();
    if sum <= 0.0 {
        return None;
    }
    let mut shares = *totals;
    for share in &mut shares {
        *share /= sum;
    }
    Some(shares)
}

/// League-wide trailing rates per (combo, game date, window): the raw share
/// of each play type among plays strictly before the date and within
/// `window / divisor` days of it.
#[derive(Debug, Clone, Default)]
pub struct LeagueAverageTable {
    by_combo: ComboTable<HashMap<NaiveDate, Vec<Option<PlayShares>>>>,
}

impl LeagueAverageTable {
    pub fn build(neutralized: &ComboTable<Vec<NeutralizedPlay>>, params: &BuildParams) -> Self {
        LeagueAverageTable {
            by_combo: neutralized.map(|_, rows| league_averages_for_combo(rows, params)),
        }
    }

    pub fn get(
        &self,
        combo: PitbatCombo,
        date: NaiveDate,
    ) -> Option<&Vec<Option<PlayShares>>> {
        self.by_combo.get(combo).get(&date)
    }
}

fn league_averages_for_combo(
    rows: &[NeutralizedPlay],
    params: &BuildParams,
) -> HashMap<NaiveDate, Vec<Option<PlayShares>>> {
    // Daily play-type counts, sorted by date.
    let mut daily: HashMap<NaiveDate, ([u64; PLAY_TYPE_COUNT], u64)> = HashMap::new();
    for row in rows {
        let entry = daily.entry(row.play.date).or_insert(([0; PLAY_TYPE_COUNT], 0));
        entry.0[row.play.play_type.index()] += 1;
        entry.1 += 1;
    }
    let mut days: Vec<(NaiveDate, [u64; PLAY_TYPE_COUNT], u64)> = daily
        .into_iter()
        .map(|(date, (counts, total))| (date, counts, total))
        .collect();
    days.sort_by_key(|(date, _, _)| *date);

    let mut out = HashMap::with_capacity(days.len());
    for (date, _, _) in &days {
        let mut per_window = Vec::with_capacity(params.rolling_windows.len());
        for &window in &params.rolling_windows {
            per_window.push(lookback_shares(
                &days,
                *date,
                window,
                params.league_average_window_divisor,
            ));
        }
        out.insert(*date, per_window);
    }
    out
}

fn lookback_shares(
    days: &[(NaiveDate, [u64; PLAY_TYPE_COUNT], u64)],
    date: NaiveDate,
    window: usize,
    divisor: f64,
) -> Option<PlayShares> {
    let lookback_seconds = (window as f64 / divisor * 86_400.0) as i64;
    let date_start = date.and_hms_opt(0, 0, 0)?;
    let earliest = date_start - Duration::seconds(lookback_seconds);

    let mut counts = [0u64; PLAY_TYPE_COUNT];
    let mut total = 0u64;
    for (day, day_counts, day_total) in days {
        let day_start = day.and_hms_opt(0, 0, 0)?;
        // Strictly before the date, strictly inside the lookback.
        if day_start < date_start && day_start > earliest {
            for (idx, count) in day_counts.iter().enumerate() {
                counts[idx] += count;
            }
            total += day_total;
        }
    }

    if total == 0 {
        return None;
    }
    let mut shares = [0.0; PLAY_TYPE_COUNT];
    for (idx, count) in counts.iter().enumerate() {
        shares[idx] = *count as f64 / total as f64;
    }
    Some(shares)
}
