use anyhow::{Result, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::PaFeatures;
use crate::neutralize::NeutralizedPlay;
use crate::taxonomy::{ComboTable, PLAY_TYPE_COUNT, PlayShares, PlayType};

/// Tolerance on a probability vector's sum.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1.0e-6;

/// A trained plate-appearance outcome classifier. Implementations return one
/// probability per canonical play type, in `PlayType::ALL` order.
pub trait OutcomeModel {
    fn predict_proba(&self, pa: &PaFeatures) -> Result<Vec<f64>>;
}

/// Reject malformed classifier output: wrong length, negative entries, or a
/// sum off 1 beyond tolerance are fatal precondition violations, not
/// something to renormalize quietly mid-game.
pub fn validate_probabilities(probs: &[f64]) -> Result<()> {
    if probs.len() != PLAY_TYPE_COUNT {
        bail!(
            "classifier returned {} probabilities, expected {PLAY_TYPE_COUNT}",
            probs.len()
        );
    }
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
        bail!("classifier returned a negative or non-finite probability");
    }
    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        bail!("classifier probabilities sum to {sum}, expected 1");
    }
    Ok(())
}

/// Draw one outcome from a validated probability vector. This categorical
/// draw is the only randomness behind plate-appearance outcomes.
pub fn sample_outcome(probs: &[f64], rng: &mut impl Rng) -> PlayType {
    let draw: f64 = rng.gen_range(0.0..1.0);
    let mut cumulative = 0.0;
    for (idx, p) in probs.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return PlayType::ALL[idx];
        }
    }
    // Float residue can leave the last boundary fractionally short.
    PlayType::ALL[PLAY_TYPE_COUNT - 1]
}

/// The baseline guesser: per-combo observed play-type shares over a
/// neutralized play set. Ignores everything about the matchup except the
/// handedness combo, which makes it the floor any real model must beat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueAverageModel {
    pub shares: ComboTable<PlayShares>,
}

impl LeagueAverageModel {
    pub fn fit(neutralized: &ComboTable<Vec<NeutralizedPlay>>) -> Result<Self> {
        let shares = neutralized.map(|_, rows| {
            let mut counts = [0.0f64; PLAY_TYPE_COUNT];
            for row in rows {
                counts[row.play.play_type.index()] += 1.0;
            }
            let total: f64 = counts.iter().sum();
            if total > 0.0 {
                for count in &mut counts {
                    *count /= total;
                }
            } else {
                // No observations for the combo: fall back to uniform so the
                // model still emits a legal vector.
                counts = [1.0 / PLAY_TYPE_COUNT as f64; PLAY_TYPE_COUNT];
            }
            counts
        });
        Ok(LeagueAverageModel { shares })
    }
}

impl OutcomeModel for LeagueAverageModel {
    fn predict_proba(&self, pa: &PaFeatures) -> Result<Vec<f64>> {
        Ok(self.shares.get(pa.pitbat).to_vec())
    }
}
