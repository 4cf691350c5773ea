use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cleaning::HalfInning;
use crate::dataset::{DatasetTable, PaFeatures};
use crate::lineups::{GameCard, PlayerRef};
use crate::model::{OutcomeModel, sample_outcome, validate_probabilities};
use crate::taxonomy::{PitbatCombo, PlayShares, PlayType};
use crate::weather::WeatherObs;

/// Secondary base-advancement probabilities. Independent uniform draws,
/// separate from the model's outcome draw.
const P_SCORE_FROM_2B_ON_SINGLE: f64 = 0.62;
const P_SCORE_FROM_1B_ON_SINGLE: f64 = 0.01;
const P_FIRST_TO_THIRD_ON_SINGLE: f64 = 0.40;
const P_SCORE_FROM_1B_ON_DOUBLE: f64 = 0.38;
const P_TWO_BASE_ERROR: f64 = 0.25;

/// Base occupancy plus outs for the half-inning in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseOutState {
    pub on_1b: bool,
    pub on_2b: bool,
    pub on_3b: bool,
    pub outs: u8,
}

impl BaseOutState {
    pub fn runners(&self) -> u32 {
        u32::from(self.on_1b) + u32::from(self.on_2b) + u32::from(self.on_3b)
    }

    /// Add outs, never past 3: a half-inning records exactly three outs.
    fn add_outs(&mut self, wanted: u8) -> u8 {
        let added = wanted.min(3 - self.outs);
        self.outs += added;
        added
    }
}

/// What one resolved plate appearance did to the half-inning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaResolution {
    pub runs: u32,
    pub outs_added: u8,
}

/// The fixed outcome -> state transition table.
///
/// Draw order, for tests that script the RNG: on a single, the
/// runner-on-2nd scoring draw comes first (only if 2nd is occupied), then
/// the runner-on-1st scoring draw (only if 1st is occupied), then the
/// first-to-third draw (only if 1st is occupied and 2nd scored). On a
/// double, the single draw is the runner-on-1st scoring chance. An error
/// draws its two-base chance first (< 0.25 means two bases), then falls into
/// the corresponding hit advancement.
pub fn apply_outcome(
    state: &mut BaseOutState,
    outcome: PlayType,
    rng: &mut impl Rng,
) -> PaResolution {
    let outs_before = state.outs;
    let mut runs = 0u32;

    match outcome {
        PlayType::Strikeout | PlayType::FlyOut | PlayType::Out | PlayType::FieldersChoice => {
            state.add_outs(1);
        }
        PlayType::Walk | PlayType::IntentWalk => {
            advance_on_walk(state, &mut runs);
        }
        PlayType::Single => {
            advance_on_single(state, &mut runs, rng);
        }
        PlayType::Double => {
            advance_on_double(state, &mut runs, rng);
        }
        PlayType::Triple => {
            runs += state.runners();
            state.on_1b = false;
            state.on_2b = false;
            state.on_3b = true;
        }
        PlayType::HomeRun => {
            runs += state.runners() + 1;
            state.on_1b = false;
            state.on_2b = false;
            state.on_3b = false;
        }
        PlayType::Error => {
            if rng.gen_range(0.0..1.0) < P_TWO_BASE_ERROR {
                advance_on_double(state, &mut runs, rng);
            } else {
                advance_on_single(state, &mut runs, rng);
            }
        }
        PlayType::DoublePlay => {
            state.add_outs(2);
            apply_double_play_runners(state, &mut runs);
        }
        PlayType::Sacrifice => {
            state.add_outs(1);
            if state.on_3b {
                state.on_3b = false;
                runs += 1;
            }
            if state.on_2b {
                state.on_2b = false;
                state.on_3b = true;
            }
            if state.on_1b {
                state.on_1b = false;
                state.on_2b = true;
            }
        }
    }

    PaResolution {
        runs,
        outs_added: state.outs - outs_before,
    }
}

/// A runner moves up only when every base behind them is occupied; the run
/// scores only off a bases-loaded walk.
fn advance_on_walk(state: &mut BaseOutState, runs: &mut u32) {
    if state.on_1b {
        if state.on_2b {
            if state.on_3b {
                *runs += 1;
            } else {
                state.on_3b = true;
            }
        } else {
            state.on_2b = true;
        }
    }
    state.on_1b = true;
}

fn advance_on_single(state: &mut BaseOutState, runs: &mut u32, rng: &mut impl Rng) {
    if state.on_3b {
        *runs += 1;
        state.on_3b = false;
    }

    let second_scores = state.on_2b && rng.gen_range(0.0..1.0) < P_SCORE_FROM_2B_ON_SINGLE;
    let first_scores = state.on_1b && rng.gen_range(0.0..1.0) < P_SCORE_FROM_1B_ON_SINGLE;
    let first_to_third =
        state.on_1b && second_scores && rng.gen_range(0.0..1.0) < P_FIRST_TO_THIRD_ON_SINGLE;

    if second_scores {
        *runs += 1;
        state.on_2b = false;
    }
    if first_scores {
        *runs += 1;
        state.on_1b = false;
    } else if state.on_1b {
        if first_to_third {
            state.on_3b = true;
        } else {
            state.on_2b = true;
        }
        state.on_1b = false;
    }

    state.on_1b = true;
}

fn advance_on_double(state: &mut BaseOutState, runs: &mut u32, rng: &mut impl Rng) {
    if state.on_3b {
        *runs += 1;
        state.on_3b = false;
    }
    if state.on_2b {
        *runs += 1;
        state.on_2b = false;
    }
    if state.on_1b {
        if rng.gen_range(0.0..1.0) < P_SCORE_FROM_1B_ON_DOUBLE {
            *runs += 1;
        } else {
            state.on_3b = true;
        }
        state.on_1b = false;
    }
    state.on_2b = true;
}

/// Lead-runner removal: adjacent occupied pairs both clear; the non-adjacent
/// corners case clears 1st and lets 3rd score if the inning is still alive;
/// a lone runner is simply erased.
fn apply_double_play_runners(state: &mut BaseOutState, runs: &mut u32) {
    if state.on_1b && state.on_2b {
        state.on_1b = false;
        state.on_2b = false;
    } else if state.on_2b && state.on_3b {
        state.on_2b = false;
        state.on_3b = false;
    } else if state.on_1b && state.on_3b {
        state.on_1b = false;
        if state.outs < 3 {
            state.on_3b = false;
            *runs += 1;
        }
    } else if state.on_3b {
        state.on_3b = false;
    } else if state.on_2b {
        state.on_2b = false;
    } else if state.on_1b {
        state.on_1b = false;
    }
}

/// Accumulated batting line for one lineup slot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BattingLine {
    pub plate_appearances: u32,
    pub at_bats: u32,
    pub singles: u32,
    pub doubles: u32,
    pub triples: u32,
    pub home_runs: u32,
    pub walks: u32,
    pub strikeouts: u32,
    pub sacrifices: u32,
    pub rbi: u32,
}

impl BattingLine {
    pub fn hits(&self) -> u32 {
        self.singles + self.doubles + self.triples + self.home_runs
    }

    pub fn total_bases(&self) -> u32 {
        self.singles + 2 * self.doubles + 3 * self.triples + 4 * self.home_runs
    }
}

/// Accumulated pitching line for a starter going the distance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PitchingLine {
    pub outs_recorded: u32,
    pub strikeouts: u32,
    pub hits_allowed: u32,
    pub walks_allowed: u32,
    pub runs_allowed: u32,
}

/// Final box score for one side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamBoxScore {
    pub team: String,
    pub batting: Vec<(PlayerRef, BattingLine)>,
    pub pitching: (PlayerRef, PitchingLine),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResult {
    pub home_score: u32,
    pub away_score: u32,
    pub home: TeamBoxScore,
    pub away: TeamBoxScore,
}

#[derive(Debug, Clone)]
struct PlayerDay {
    windows: Vec<PlayShares>,
    hand: char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Away,
    Home,
}

/// Per-game simulation engine. Construction resolves every lineup player's
/// most recent rolling stats and the league baseline up front and refuses to
/// start if anything is missing; `simulate_game` owns all of its mutable
/// state, so one instance can run many independent games.
pub struct GameSimulation<M: OutcomeModel> {
    card: GameCard,
    model: M,
    weather: WeatherObs,
    innings: u8,
    batters: HashMap<u32, PlayerDay>,
    pitchers: HashMap<u32, PlayerDay>,
    league: Vec<PlayShares>,
}

impl<M: OutcomeModel> GameSimulation<M> {
    pub fn new(
        card: GameCard,
        daily: &DatasetTable,
        model: M,
        weather: WeatherObs,
        innings: u8,
    ) -> Result<Self> {
        card.validate()?;
        if daily.rows.is_empty() {
            bail!("daily dataset is empty; refusing to simulate from stale or default stats");
        }
        let league = daily
            .latest_league_windows()
            .ok_or_else(|| anyhow!("daily dataset carries no league-average columns"))?;

        let daily_batters = daily.latest_batter_windows();
        let daily_pitchers = daily.latest_pitcher_windows();

        let mut batters = HashMap::new();
        for player in card.home.batters.iter().chain(card.away.batters.iter()) {
            let (windows, hand) = daily_batters.get(&player.id).ok_or_else(|| {
                anyhow!(
                    "no daily rolling stats for batter {} ({})",
                    player.name,
                    player.id
                )
            })?;
            if windows.len() != daily.windows.len() {
                bail!(
                    "batter {} carries {} window vectors but the table declares {}",
                    player.id,
                    windows.len(),
                    daily.windows.len()
                );
            }
            batters.insert(
                player.id,
                PlayerDay {
                    windows: windows.clone(),
                    hand: *hand,
                },
            );
        }

        let mut pitchers = HashMap::new();
        for player in [&card.home.starting_pitcher, &card.away.starting_pitcher] {
            let (windows, hand) = daily_pitchers.get(&player.id).ok_or_else(|| {
                anyhow!(
                    "no daily rolling stats for pitcher {} ({})",
                    player.name,
                    player.id
                )
            })?;
            pitchers.insert(
                player.id,
                PlayerDay {
                    windows: windows.clone(),
                    hand: *hand,
                },
            );
        }

        Ok(GameSimulation {
            card,
            model,
            weather,
            innings,
            batters,
            pitchers,
            league,
        })
    }

    pub fn simulate_game(&self, rng: &mut impl Rng) -> Result<GameResult> {
        let mut scores = [0u32; 2];
        let mut lineup_pos = [0usize; 2];
        let mut batting_lines = [[BattingLine::default(); 9], [BattingLine::default(); 9]];
        let mut pitching_lines = [PitchingLine::default(), PitchingLine::default()];

        for inning in 1..=self.innings {
            for side in [Side::Away, Side::Home] {
                self.play_half_inning(
                    inning,
                    side,
                    &mut scores,
                    &mut lineup_pos,
                    &mut batting_lines,
                    &mut pitching_lines,
                    rng,
                )?;
            }
        }

        // Batting lines index by batting side, pitching lines by fielding
        // side: the away pitcher's line accumulates while the away team
        // fields.
        let box_score = |side: Side| {
            let (lineup, batting, pitching) = match side {
                Side::Away => (&self.card.away, &batting_lines[0], pitching_lines[0]),
                Side::Home => (&self.card.home, &batting_lines[1], pitching_lines[1]),
            };
            TeamBoxScore {
                team: lineup.team.clone(),
                batting: lineup
                    .batters
                    .iter()
                    .cloned()
                    .zip(batting.iter().copied())
                    .collect(),
                pitching: (lineup.starting_pitcher.clone(), pitching),
            }
        };

        Ok(GameResult {
            away_score: scores[0],
            home_score: scores[1],
            away: box_score(Side::Away),
            home: box_score(Side::Home),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn play_half_inning(
        &self,
        inning: u8,
        batting_side: Side,
        scores: &mut [u32; 2],
        lineup_pos: &mut [usize; 2],
        batting_lines: &mut [[BattingLine; 9]; 2],
        pitching_lines: &mut [PitchingLine; 2],
        rng: &mut impl Rng,
    ) -> Result<()> {
        let bat_idx = if batting_side == Side::Away { 0 } else { 1 };
        let fld_idx = 1 - bat_idx;
        let (batting_lineup, pitcher) = match batting_side {
            Side::Away => (&self.card.away, &self.card.home.starting_pitcher),
            Side::Home => (&self.card.home, &self.card.away.starting_pitcher),
        };

        let mut state = BaseOutState::default();
        while state.outs < 3 {
            let slot = lineup_pos[bat_idx];
            let batter = &batting_lineup.batters[slot];

            let features = self.pa_features(
                batter.id,
                pitcher.id,
                inning,
                batting_side,
                &state,
                scores[bat_idx],
                scores[fld_idx],
            )?;
            let probs = self
                .model
                .predict_proba(&features)
                .context("classifier failed on a simulated plate appearance")?;
            validate_probabilities(&probs)?;
            let outcome = sample_outcome(&probs, rng);

            let resolution = apply_outcome(&mut state, outcome, rng);
            scores[bat_idx] += resolution.runs;
            record_lines(
                &mut batting_lines[bat_idx][slot],
                &mut pitching_lines[fld_idx],
                outcome,
                resolution,
            );

            lineup_pos[bat_idx] = (slot + 1) % 9;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn pa_features(
        &self,
        batter_id: u32,
        pitcher_id: u32,
        inning: u8,
        batting_side: Side,
        state: &BaseOutState,
        bat_score: u32,
        fld_score: u32,
    ) -> Result<PaFeatures> {
        let batter = self
            .batters
            .get(&batter_id)
            .ok_or_else(|| anyhow!("batter {batter_id} vanished from the daily stats"))?;
        let pitcher = self
            .pitchers
            .get(&pitcher_id)
            .ok_or_else(|| anyhow!("pitcher {pitcher_id} vanished from the daily stats"))?;
        let pitbat = PitbatCombo::from_hands(batter.hand, pitcher.hand).ok_or_else(|| {
            anyhow!(
                "unusable handedness pair {}/{} for {batter_id} vs {pitcher_id}",
                batter.hand,
                pitcher.hand
            )
        })?;

        let temperature = f64::from(self.weather.temperature);
        Ok(PaFeatures {
            ballpark: self.card.stadium.clone(),
            pitbat,
            batter: batter_id,
            pitcher: pitcher_id,
            on_1b: state.on_1b,
            on_2b: state.on_2b,
            on_3b: state.on_3b,
            outs: state.outs,
            inning,
            half: if batting_side == Side::Away {
                HalfInning::Top
            } else {
                HalfInning::Bottom
            },
            bat_score: bat_score as i32,
            fld_score: fld_score as i32,
            batter_windows: batter.windows.clone(),
            pitcher_windows: pitcher.windows.clone(),
            league_windows: self.league.clone(),
            wind: self.weather.wind(),
            temperature_sq: temperature * temperature,
        })
    }
}

fn record_lines(
    batting: &mut BattingLine,
    pitching: &mut PitchingLine,
    outcome: PlayType,
    resolution: PaResolution,
) {
    batting.plate_appearances += 1;
    match outcome {
        PlayType::Strikeout => {
            batting.at_bats += 1;
            batting.strikeouts += 1;
            pitching.strikeouts += 1;
        }
        PlayType::FlyOut | PlayType::Out | PlayType::FieldersChoice | PlayType::DoublePlay => {
            batting.at_bats += 1;
        }
        PlayType::Walk | PlayType::IntentWalk => {
            batting.walks += 1;
            pitching.walks_allowed += 1;
        }
        PlayType::Single => {
            batting.at_bats += 1;
            batting.singles += 1;
            pitching.hits_allowed += 1;
        }
        PlayType::Double => {
            batting.at_bats += 1;
            batting.doubles += 1;
            pitching.hits_allowed += 1;
        }
        PlayType::Triple => {
            batting.at_bats += 1;
            batting.triples += 1;
            pitching.hits_allowed += 1;
        }
        PlayType::HomeRun => {
            batting.at_bats += 1;
            batting.home_runs += 1;
            pitching.hits_allowed += 1;
        }
        PlayType::Error => {
            // Reached on error: an at-bat but not a hit.
            batting.at_bats += 1;
        }
        PlayType::Sacrifice => {
            batting.sacrifices += 1;
        }
    }
    batting.rbi += resolution.runs;
    pitching.runs_allowed += resolution.runs;
    pitching.outs_recorded += u32::from(resolution.outs_added);
}
