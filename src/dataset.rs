use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::cleaning::HalfInning;
use crate::neutralize::NeutralizedPlay;
use crate::params::BuildParams;
use crate::rolling::{LeagueAverageTable, RolledPa};
use crate::taxonomy::{ComboTable, PitbatCombo, PlayShares, PlayType};
use crate::weather::WindColumns;

/// Model-facing features for one plate appearance: live game context, the
/// batter's and pitcher's trailing window shares, the league baseline, and
/// the flat weather columns. The categorical fields (`ballpark`, `pitbat`)
/// are left to the external preprocessing stack to encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaFeatures {
    pub ballpark: String,
    pub pitbat: PitbatCombo,
    pub batter: u32,
    pub pitcher: u32,
    pub on_1b: bool,
    pub on_2b: bool,
    pub on_3b: bool,
    pub outs: u8,
    pub inning: u8,
    pub half: HalfInning,
    pub bat_score: i32,
    pub fld_score: i32,
    pub batter_windows: Vec<PlayShares>,
    pub pitcher_windows: Vec<PlayShares>,
    pub league_windows: Vec<PlayShares>,
    pub wind: WindColumns,
    pub temperature_sq: f64,
}

/// One labeled row of the flat training table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub play_id: u64,
    pub date: NaiveDate,
    pub features: PaFeatures,
    pub play_type: PlayType,
    pub is_on_base: bool,
}

/// The assembled flat table. Rebuilt nightly over a trailing slice, the
/// same shape serves as the simulation-ready daily table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetTable {
    pub windows: Vec<usize>,
    pub rows: Vec<FeatureRow>,
}

impl DatasetTable {
    /// Most recent window shares and batter stand per batter, in row order.
    pub fn latest_batter_windows(&self) -> HashMap<u32, (Vec<PlayShares>, char)> {
        let mut out = HashMap::new();
        for row in &self.rows {
            out.insert(
                row.features.batter,
                (
                    row.features.batter_windows.clone(),
                    row.features.pitbat.batter_stand(),
                ),
            );
        }
        out
    }

    /// Most recent window shares and throwing hand per pitcher.
    pub fn latest_pitcher_windows(&self) -> HashMap<u32, (Vec<PlayShares>, char)> {
        let mut out = HashMap::new();
        for row in &self.rows {
            out.insert(
                row.features.pitcher,
                (
                    row.features.pitcher_windows.clone(),
                    row.features.pitbat.pitcher_throws(),
                ),
            );
        }
        out
    }

    /// League baseline from the most recent row (all rows of a daily table
    /// share the same league columns for a given combo and date).
    pub fn latest_league_windows(&self) -> Option<Vec<PlayShares>> {
        self.rows.last().map(|r| r.features.league_windows.clone())
    }
}

/// Row accounting for one assembly pass. Dropped counts make the "partially
/// missing rows are dropped, not imputed" rule visible to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleSummary {
    pub candidate_rows: usize,
    pub dropped_insufficient_batter_history: usize,
    pub dropped_insufficient_pitcher_history: usize,
    pub dropped_missing_league_average: usize,
    pub dropped_preseason: usize,
    pub kept: usize,
}

/// Merge batter rolling stats, pitcher rolling stats, league averages and
/// weather context into the flat table. Pitcher columns are joined
/// onto batter rows by the synthetic play id, so a reordering anywhere
/// upstream surfaces as a loud join failure instead of a silently corrupted
/// table.
pub fn assemble_dataset(
    neutralized: &ComboTable<Vec<NeutralizedPlay>>,
    rolled: &ComboTable<Vec<RolledPa>>,
    params: &BuildParams,
) -> Result<(DatasetTable, AssembleSummary)> {
    let league = LeagueAverageTable::build(neutralized, params);
    let mut summary = AssembleSummary::default();
    let mut rows = Vec::new();

    for (combo, combo_plays) in neutralized.iter() {
        let rolled_by_id: HashMap<u64, &RolledPa> = rolled
            .get(combo)
            .iter()
            .map(|r| (r.play_id, r))
            .collect();

        for row in combo_plays {
            summary.candidate_rows += 1;
            let play = &row.play;

            let Some(rolled_pa) = rolled_by_id.get(&play.play_id) else {
                bail!(
                    "play {} has no rolled stats; rolling and neutralization are out of sync",
                    play.play_id
                );
            };

            if play.date.month() < params.season_start_month {
                summary.dropped_preseason += 1;
                continue;
            }

            let Some(batter_windows) = collect_windows(&rolled_pa.batter_windows) else {
                summary.dropped_insufficient_batter_history += 1;
                continue;
            };
            let Some(pitcher_windows) = collect_windows(&rolled_pa.pitcher_windows) else {
                summary.dropped_insufficient_pitcher_history += 1;
                continue;
            };
            let Some(league_windows) = league
                .get(combo, play.date)
                .and_then(|per_window| collect_windows(per_window))
            else {
                summary.dropped_missing_league_average += 1;
                continue;
            };

            let temperature = f64::from(play.weather.temperature);
            rows.push(FeatureRow {
                play_id: play.play_id,
                date: play.date,
                features: PaFeatures {
                    ballpark: play.ballpark.clone(),
                    pitbat: combo,
                    batter: play.batter,
                    pitcher: play.pitcher,
                    on_1b: play.on_1b,
                    on_2b: play.on_2b,
                    on_3b: play.on_3b,
                    outs: play.outs,
                    inning: play.inning,
                    half: play.half,
                    bat_score: play.bat_score,
                    fld_score: play.fld_score,
                    batter_windows,
                    pitcher_windows,
                    league_windows,
                    wind: play.weather.wind(),
                    temperature_sq: temperature * temperature,
                },
                play_type: play.play_type,
                is_on_base: play.play_type.is_on_base(),
            });
        }
    }

    // Global chronological order, restored explicitly after the per-combo
    // passes.
    rows.sort_by_key(|r| r.play_id);
    summary.kept = rows.len();

    Ok((
        DatasetTable {
            windows: params.rolling_windows.clone(),
            rows,
        },
        summary,
    ))
}

fn collect_windows(windows: &[Option<PlayShares>]) -> Option<Vec<PlayShares>> {
    windows.iter().copied().collect()
}
