use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cleaning::Play;
use crate::params::BuildParams;
use crate::taxonomy::{ComboTable, PLAY_TYPE_COUNT, PitbatCombo, PlayShares, PlayType};
use crate::weather::WindColumns;

/// Rows more than this many standard deviations from the mean game share are
/// dropped before fitting (small-sample games distort the tails).
const SHARE_OUTLIER_SIGMA: f64 = 3.0;

/// Fitted linear model of a play type's game share on weather conditions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WeatherCoefficients {
    pub intercept: f64,
    pub temperature_sq: f64,
    pub wind_left_to_right: f64,
    pub wind_right_to_left: f64,
    pub wind_in: f64,
    pub wind_out: f64,
}

impl WeatherCoefficients {
    /// Expected game share under the given conditions.
    pub fn expectation(&self, temperature: f64, wind: &WindColumns) -> f64 {
        self.intercept
            + temperature * temperature * self.temperature_sq
            + wind.left_to_right * self.wind_left_to_right
            + wind.right_to_left * self.wind_right_to_left
            + wind.wind_in * self.wind_in
            + wind.wind_out * self.wind_out
    }

    /// Expected game share with wind zeroed and temperature pinned at the
    /// neutral baseline.
    pub fn neutral_expectation(&self, neutral_temperature: f64) -> f64 {
        self.intercept + neutral_temperature * neutral_temperature * self.temperature_sq
    }
}

/// In-park rate over out-of-park rate, or an explicit sentinel when the
/// out-of-park rate is zero. The sentinel must stay distinguishable from a
/// legitimate factor of 0 or 1 all the way downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ratio", rename_all = "snake_case")]
pub enum ParkFactor {
    Available(f64),
    NotAvailable,
}

impl ParkFactor {
    pub fn value(self) -> Option<f64> {
        match self {
            ParkFactor::Available(v) => Some(v),
            ParkFactor::NotAvailable => None,
        }
    }
}

/// Everything fitted for one handedness combo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComboCoefficients {
    pub weather: HashMap<PlayType, WeatherCoefficients>,
    pub park_factors: HashMap<String, HashMap<PlayType, ParkFactor>>,
}

/// The neutralization artifact: written once per training run, immutable and
/// read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoefficientSet {
    pub combos: ComboTable<ComboCoefficients>,
}

impl CoefficientSet {
    pub fn weather_for(
        &self,
        combo: PitbatCombo,
        play_type: PlayType,
    ) -> Result<&WeatherCoefficients> {
        self.combos.get(combo).weather.get(&play_type).ok_or_else(|| {
            anyhow!("no weather coefficients for {combo}/{play_type}; the coefficient build did not cover the taxonomy")
        })
    }

    pub fn park_factor_for(
        &self,
        combo: PitbatCombo,
        ballpark: &str,
        play_type: PlayType,
    ) -> Result<ParkFactor> {
        self.combos
            .get(combo)
            .park_factors
            .get(ballpark)
            .and_then(|by_type| by_type.get(&play_type))
            .copied()
            .ok_or_else(|| anyhow!("no park factor for {combo}/{ballpark}/{play_type}"))
    }
}

/// One game's worth of regression input: its weather conditions and the
/// share of every play type (absent types back-filled with an explicit 0).
#[derive(Debug, Clone)]
pub struct GameShareRow {
    pub game_pk: u64,
    pub date: NaiveDate,
    pub temperature: f64,
    pub wind: WindColumns,
    pub shares: PlayShares,
}

/// Per-game play-type shares within one combo partition. Shares in a row sum
/// to exactly 1: a type that never happened in the game is a 0, not a gap.
pub fn game_share_rows(plays: &[Play]) -> Vec<GameShareRow> {
    let mut rows: Vec<(GameShareRow, usize)> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();

    for play in plays {
        let slot = *index.entry(play.game_pk).or_insert_with(|| {
            rows.push((
                GameShareRow {
                    game_pk: play.game_pk,
                    date: play.date,
                    temperature: f64::from(play.weather.temperature),
                    wind: play.weather.wind(),
                    shares: [0.0; PLAY_TYPE_COUNT],
                },
                0,
            ));
            rows.len() - 1
        });
        let (row, total) = &mut rows[slot];
        row.shares[play.play_type.index()] += 1.0;
        *total += 1;
    }

    rows.into_iter()
        .map(|(mut row, total)| {
            for share in &mut row.shares {
                *share /= total as f64;
            }
            row
        })
        .collect()
}

/// Fit weather regressions and park factors for all four combos. Combos are
/// independent and fitted in parallel, each into a fresh accumulator.
pub fn build_coefficients(
    plays: &ComboTable<Vec<Play>>,
    params: &BuildParams,
) -> Result<CoefficientSet> {
    let fitted: Vec<Result<ComboCoefficients>> = PitbatCombo::ALL
        .par_iter()
        .map(|combo| {
            fit_combo(plays.get(*combo), params)
                .with_context(|| format!("fit coefficients for combo {combo}"))
        })
        .collect();

    let mut set = CoefficientSet::default();
    for (combo, result) in PitbatCombo::ALL.into_iter().zip(fitted) {
        *set.combos.get_mut(combo) = result?;
    }
    Ok(set)
}

fn fit_combo(plays: &[Play], params: &BuildParams) -> Result<ComboCoefficients> {
    if plays.is_empty() {
        return Ok(ComboCoefficients::default());
    }

    let share_rows = game_share_rows(plays);
    let regression_rows: Vec<&GameShareRow> = share_rows
        .iter()
        .filter(|row| row.date.month() >= params.season_start_month)
        .collect();
    if regression_rows.is_empty() {
        bail!(
            "no games from month {} onward to fit weather regressions",
            params.season_start_month
        );
    }

    let mut weather = HashMap::with_capacity(PLAY_TYPE_COUNT);
    for play_type in PlayType::ALL {
        let coefs = fit_play_type(&regression_rows, play_type)
            .with_context(|| format!("weather regression for {play_type}"))?;
        weather.insert(play_type, coefs);
    }

    Ok(ComboCoefficients {
        weather,
        park_factors: park_factors(plays),
    })
}

fn fit_play_type(rows: &[&GameShareRow], play_type: PlayType) -> Result<WeatherCoefficients> {
    let idx = play_type.index();
    let shares: Vec<f64> = rows.iter().map(|r| r.shares[idx]).collect();

    // Z-score outlier filter on the response. When filtering would leave
    // nothing (zero-variance shares, e.g. a play type that never happens),
    // keep every row instead.
    let kept: Vec<usize> = match share_mean_std(&shares) {
        Some((mean, std)) if std > 0.0 => {
            let kept: Vec<usize> = (0..shares.len())
                .filter(|i| ((shares[*i] - mean) / std).abs() < SHARE_OUTLIER_SIGMA)
                .collect();
            if kept.is_empty() { (0..shares.len()).collect() } else { kept }
        }
        _ => (0..shares.len()).collect(),
    };

    let xs: Vec<[f64; 5]> = kept
        .iter()
        .map(|&i| {
            let r = rows[i];
            [
                r.temperature * r.temperature,
                r.wind.left_to_right,
                r.wind.right_to_left,
                r.wind.wind_in,
                r.wind.wind_out,
            ]
        })
        .collect();
    let ys: Vec<f64> = kept.iter().map(|&i| shares[i]).collect();

    ols_fit(&xs, &ys)
}

fn share_mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Ordinary least squares with intercept, solved as a minimum-norm SVD
/// least-squares problem so degenerate predictor columns (a season of
/// dome-only games has all-zero wind magnitudes) stay well-defined.
fn ols_fit(xs: &[[f64; 5]], ys: &[f64]) -> Result<WeatherCoefficients> {
    if xs.is_empty() || xs.len() != ys.len() {
        bail!("cannot fit regression on {} observations", xs.len());
    }

    let n = xs.len();
    let mut design = DMatrix::<f64>::zeros(n, 6);
    for (i, x) in xs.iter().enumerate() {
        design[(i, 0)] = 1.0;
        for (j, value) in x.iter().enumerate() {
            design[(i, j + 1)] = *value;
        }
    }
    let response = DVector::<f64>::from_column_slice(ys);

    let svd = design.svd(true, true);
    let beta = svd
        .solve(&response, 1.0e-12)
        .map_err(|err| anyhow!("least-squares solve failed: {err}"))?;

    Ok(WeatherCoefficients {
        intercept: beta[0],
        temperature_sq: beta[1],
        wind_left_to_right: beta[2],
        wind_right_to_left: beta[3],
        wind_in: beta[4],
        wind_out: beta[5],
    })
}

/// Park factor per (ballpark, play type): the rate of the play type inside
/// the park over its rate everywhere else combined.
fn park_factors(plays: &[Play]) -> HashMap<String, HashMap<PlayType, ParkFactor>> {
    let mut per_park: HashMap<String, ([u64; PLAY_TYPE_COUNT], u64)> = HashMap::new();
    let mut overall = [0u64; PLAY_TYPE_COUNT];
    let mut overall_total = 0u64;

    for play in plays {
        let entry = per_park
            .entry(play.ballpark.clone())
            .or_insert(([0; PLAY_TYPE_COUNT], 0));
        entry.0[play.play_type.index()] += 1;
        entry.1 += 1;
        overall[play.play_type.index()] += 1;
        overall_total += 1;
    }

    per_park
        .into_iter()
        .map(|(ballpark, (counts, total))| {
            let mut by_type = HashMap::with_capacity(PLAY_TYPE_COUNT);
            let out_total = overall_total - total;
            for play_type in PlayType::ALL {
                let idx = play_type.index();
                let at_rate = counts[idx] as f64 / total as f64;
                let out_count = overall[idx] - counts[idx];
                let factor = if out_total == 0 || out_count == 0 {
                    ParkFactor::NotAvailable
                } else {
                    let out_rate = out_count as f64 / out_total as f64;
                    ParkFactor::Available(at_rate / out_rate)
                };
                by_type.insert(play_type, factor);
            }
            (ballpark, by_type)
        })
        .collect()
}
