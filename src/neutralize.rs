use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cleaning::Play;
use crate::coefficients::CoefficientSet;
use crate::params::BuildParams;
use crate::taxonomy::ComboTable;

/// A play annotated with its weather/park impact and the inverse weight used
/// everywhere downstream in place of a raw count of 1. A play that happened
/// under favorable conditions (impact > 1) is down-weighted so aggregated
/// rates reflect talent, not circumstances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeutralizedPlay {
    pub play: Play,
    pub impact: f64,
    pub play_value: f64,
}

/// Accounting for one neutralization pass. Dropped plays are a data-quality
/// signal surfaced to the caller, never a silent zero or infinity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralizeSummary {
    pub kept: usize,
    pub dropped_unavailable_park_factor: usize,
    pub dropped_degenerate_impact: usize,
}

/// Apply the fitted coefficients to every play.
///
/// A missing coefficient entry for an observed play type means the builder
/// did not cover the taxonomy and is a fatal configuration error. A play
/// whose park factor is the `NotAvailable` sentinel, or whose combined
/// impact comes out zero, negative or non-finite, is flagged and dropped.
pub fn neutralize_stats(
    plays: &ComboTable<Vec<Play>>,
    coefficients: &CoefficientSet,
    params: &BuildParams,
) -> Result<(ComboTable<Vec<NeutralizedPlay>>, NeutralizeSummary)> {
    let mut summary = NeutralizeSummary::default();
    let mut out: ComboTable<Vec<NeutralizedPlay>> = ComboTable::default();

    for (combo, combo_plays) in plays.iter() {
        let neutralized = out.get_mut(combo);
        neutralized.reserve(combo_plays.len());

        for play in combo_plays {
            let coefs = coefficients
                .weather_for(combo, play.play_type)
                .with_context(|| format!("neutralize play {}", play.play_id))?;

            let expectation =
                coefs.expectation(f64::from(play.weather.temperature), &play.weather.wind());
            let neutral_expectation = coefs.neutral_expectation(params.neutral_temperature);
            let weather_impact = expectation / neutral_expectation;

            let park_factor = coefficients
                .park_factor_for(combo, &play.ballpark, play.play_type)
                .with_context(|| format!("neutralize play {}", play.play_id))?;
            let Some(stadium_impact) = park_factor.value() else {
                summary.dropped_unavailable_park_factor += 1;
                continue;
            };

            let impact = weather_impact * stadium_impact;
            if !impact.is_finite() || impact <= 0.0 {
                summary.dropped_degenerate_impact += 1;
                continue;
            }

            neutralized.push(NeutralizedPlay {
                play: play.clone(),
                impact,
                play_value: 1.0 / impact,
            });
        }
    }

    summary.kept = out.iter().map(|(_, rows)| rows.len()).sum();
    Ok((out, summary))
}
