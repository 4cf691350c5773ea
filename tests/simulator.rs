use anyhow::Result;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use dugout::cleaning::HalfInning;
use dugout::dataset::{DatasetTable, FeatureRow, PaFeatures};
use dugout::lineups::{GameCard, LineupCard, PlayerRef};
use dugout::model::OutcomeModel;
use dugout::simulator::{BaseOutState, GameSimulation, apply_outcome};
use dugout::taxonomy::{PLAY_TYPE_COUNT, PitbatCombo, PlayType};
use dugout::weather::{WeatherObs, WindColumns};

/// Replays a scripted sequence of raw draws; 0 maps to ~0.0 and u64::MAX to
/// ~1.0 under `gen_range(0.0..1.0)`. Draws past the end repeat the final
/// value.
struct SeqRng {
    draws: Vec<u64>,
    pos: usize,
}

impl SeqRng {
    fn new(draws: Vec<u64>) -> Self {
        SeqRng { draws, pos: 0 }
    }
}

const LOW: u64 = 0;
const HIGH: u64 = u64::MAX;

impl RngCore for SeqRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let value = self
            .draws
            .get(self.pos)
            .or(self.draws.last())
            .copied()
            .unwrap_or(0);
        self.pos += 1;
        value
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let value = self.next_u64().to_le_bytes();
        for (idx, byte) in dest.iter_mut().enumerate() {
            *byte = value[idx % 8];
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[test]
fn double_with_runner_on_first_holding_at_third() {
    // The 0.38 draw comes up high: the runner does not score.
    let mut state = BaseOutState {
        on_1b: true,
        ..BaseOutState::default()
    };
    let mut rng = SeqRng::new(vec![HIGH]);
    let res = apply_outcome(&mut state, PlayType::Double, &mut rng);

    assert_eq!(res.runs, 0);
    assert_eq!(res.outs_added, 0);
    assert!(state.on_3b, "runner from first holds at third");
    assert!(state.on_2b, "batter stands on second");
    assert!(!state.on_1b);
    assert_eq!(state.outs, 0);
}

#[test]
fn double_with_runner_on_first_scoring() {
    // The 0.38 draw comes up low: the runner scores from first.
    let mut state = BaseOutState {
        on_1b: true,
        ..BaseOutState::default()
    };
    let mut rng = SeqRng::new(vec![LOW]);
    let res = apply_outcome(&mut state, PlayType::Double, &mut rng);

    assert_eq!(res.runs, 1);
    assert!(!state.on_3b && state.on_2b && !state.on_1b);
}

#[test]
fn single_draw_order_is_second_then_first_then_advance() {
    // Runners on first and second. Scripted draws: the runner on second
    // scores (low), the runner on first does not score (high), and the
    // first-to-third advance succeeds (low).
    let mut state = BaseOutState {
        on_1b: true,
        on_2b: true,
        ..BaseOutState::default()
    };
    let mut rng = SeqRng::new(vec![LOW, HIGH, LOW]);
    let res = apply_outcome(&mut state, PlayType::Single, &mut rng);

    assert_eq!(res.runs, 1);
    assert!(state.on_3b, "runner from first took third behind the scoring runner");
    assert!(!state.on_2b);
    assert!(state.on_1b, "batter stands on first");
}

#[test]
fn single_without_the_advance_puts_the_runner_on_second() {
    let mut state = BaseOutState {
        on_1b: true,
        on_2b: true,
        ..BaseOutState::default()
    };
    let mut rng = SeqRng::new(vec![LOW, HIGH, HIGH]);
    let res = apply_outcome(&mut state, PlayType::Single, &mut rng);

    assert_eq!(res.runs, 1);
    assert!(!state.on_3b);
    assert!(state.on_2b && state.on_1b);
}

#[test]
fn error_splits_between_one_and_two_base_advances() {
    // Low first draw: the error behaves like a double.
    let mut state = BaseOutState::default();
    let mut rng = SeqRng::new(vec![LOW]);
    let res = apply_outcome(&mut state, PlayType::Error, &mut rng);
    assert_eq!(res.outs_added, 0);
    assert_eq!(res.runs, 0);
    assert!(state.on_2b && !state.on_1b);

    // High first draw: the error behaves like a single.
    let mut state = BaseOutState::default();
    let mut rng = SeqRng::new(vec![HIGH]);
    apply_outcome(&mut state, PlayType::Error, &mut rng);
    assert!(state.on_1b && !state.on_2b);
}

// ---------------------------------------------------------------------------
// Full-game scaffolding
// ---------------------------------------------------------------------------

struct FixedModel {
    probs: Vec<f64>,
}

impl FixedModel {
    fn certain(play_type: PlayType) -> Self {
        let mut probs = vec![0.0; PLAY_TYPE_COUNT];
        probs[play_type.index()] = 1.0;
        FixedModel { probs }
    }

    fn mixed() -> Self {
        let mut probs = vec![0.0; PLAY_TYPE_COUNT];
        probs[PlayType::Strikeout.index()] = 0.30;
        probs[PlayType::FlyOut.index()] = 0.25;
        probs[PlayType::Single.index()] = 0.18;
        probs[PlayType::Walk.index()] = 0.10;
        probs[PlayType::Double.index()] = 0.07;
        probs[PlayType::DoublePlay.index()] = 0.04;
        probs[PlayType::Sacrifice.index()] = 0.03;
        probs[PlayType::HomeRun.index()] = 0.03;
        FixedModel { probs }
    }
}

impl OutcomeModel for FixedModel {
    fn predict_proba(&self, _pa: &PaFeatures) -> Result<Vec<f64>> {
        Ok(self.probs.clone())
    }
}

struct BrokenModel;

impl OutcomeModel for BrokenModel {
    fn predict_proba(&self, _pa: &PaFeatures) -> Result<Vec<f64>> {
        Ok(vec![0.5, 0.5])
    }
}

fn daily_table() -> DatasetTable {
    let uniform = [1.0 / PLAY_TYPE_COUNT as f64; PLAY_TYPE_COUNT];
    let mut rows = Vec::new();
    let date = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();

    for batter in 1..=18u32 {
        let pitcher = if batter % 2 == 0 { 101 } else { 102 };
        rows.push(FeatureRow {
            play_id: u64::from(batter),
            date,
            features: PaFeatures {
                ballpark: "Fenway Park".to_string(),
                pitbat: PitbatCombo::RR,
                batter,
                pitcher,
                on_1b: false,
                on_2b: false,
                on_3b: false,
                outs: 0,
                inning: 1,
                half: HalfInning::Top,
                bat_score: 0,
                fld_score: 0,
                batter_windows: vec![uniform],
                pitcher_windows: vec![uniform],
                league_windows: vec![uniform],
                wind: WindColumns::default(),
                temperature_sq: 72.0 * 72.0,
            },
            play_type: PlayType::Single,
            is_on_base: true,
        });
    }

    DatasetTable {
        windows: vec![5],
        rows,
    }
}

fn game_card() -> GameCard {
    let side = |team: &str, first_batter: u32, pitcher: u32| LineupCard {
        team: team.to_string(),
        batters: (first_batter..first_batter + 9)
            .map(|id| PlayerRef {
                id,
                name: format!("Batter {id}"),
            })
            .collect(),
        starting_pitcher: PlayerRef {
            id: pitcher,
            name: format!("Pitcher {pitcher}"),
        },
    };
    GameCard {
        date: NaiveDate::from_ymd_opt(2023, 7, 2).unwrap(),
        stadium: "Fenway Park".to_string(),
        home: side("BOS", 1, 101),
        away: side("NYY", 10, 102),
    }
}

#[test]
fn all_strikeouts_yields_a_scoreless_27_out_game() {
    let sim = GameSimulation::new(
        game_card(),
        &daily_table(),
        FixedModel::certain(PlayType::Strikeout),
        WeatherObs::neutral(),
        9,
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let result = sim.simulate_game(&mut rng).unwrap();

    assert_eq!(result.home_score, 0);
    assert_eq!(result.away_score, 0);
    assert_eq!(result.home.pitching.1.outs_recorded, 27);
    assert_eq!(result.away.pitching.1.outs_recorded, 27);
    assert_eq!(result.home.pitching.1.strikeouts, 27);

    // 27 PAs per side: the lineup turned over exactly three times.
    for (_, line) in &result.home.batting {
        assert_eq!(line.plate_appearances, 3);
        assert_eq!(line.strikeouts, 3);
    }
}

#[test]
fn certain_double_plays_end_every_half_inning_in_two_pas() {
    let sim = GameSimulation::new(
        game_card(),
        &daily_table(),
        FixedModel::certain(PlayType::DoublePlay),
        WeatherObs::neutral(),
        9,
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let result = sim.simulate_game(&mut rng).unwrap();
    assert_eq!(result.home_score + result.away_score, 0);
    // Two PAs per half-inning: 2 outs, then the capped third.
    assert_eq!(result.home.pitching.1.outs_recorded, 27);
    assert_eq!(result.away.pitching.1.outs_recorded, 27);
}

#[test]
fn mixed_game_conserves_outs_runs_and_hits() {
    let sim = GameSimulation::new(
        game_card(),
        &daily_table(),
        FixedModel::mixed(),
        WeatherObs::neutral(),
        9,
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(20230701);
    for _ in 0..200 {
        let result = sim.simulate_game(&mut rng).unwrap();

        // Every half-inning records exactly three outs.
        assert_eq!(result.home.pitching.1.outs_recorded, 27);
        assert_eq!(result.away.pitching.1.outs_recorded, 27);

        // Every run is a batter's RBI and the opposing pitcher's run
        // allowed.
        let away_rbi: u32 = result.away.batting.iter().map(|(_, l)| l.rbi).sum();
        let home_rbi: u32 = result.home.batting.iter().map(|(_, l)| l.rbi).sum();
        assert_eq!(away_rbi, result.away_score);
        assert_eq!(home_rbi, result.home_score);
        assert_eq!(result.home.pitching.1.runs_allowed, result.away_score);
        assert_eq!(result.away.pitching.1.runs_allowed, result.home_score);

        // Hits and walks line up across the box score.
        let away_hits: u32 = result.away.batting.iter().map(|(_, l)| l.hits()).sum();
        assert_eq!(away_hits, result.home.pitching.1.hits_allowed);
        let home_walks: u32 = result.home.batting.iter().map(|(_, l)| l.walks).sum();
        assert_eq!(home_walks, result.away.pitching.1.walks_allowed);

        // PA bookkeeping: AB + walks + sacrifices == PA for every batter.
        for team in [&result.home, &result.away] {
            for (_, line) in &team.batting {
                assert_eq!(
                    line.at_bats + line.walks + line.sacrifices,
                    line.plate_appearances
                );
            }
        }
    }
}

#[test]
fn construction_fails_fast_on_missing_players() {
    let mut card = game_card();
    card.home.batters[4].id = 999;
    let err = GameSimulation::new(
        card,
        &daily_table(),
        FixedModel::mixed(),
        WeatherObs::neutral(),
        9,
    )
    .err()
    .expect("unknown batter must refuse to simulate");
    assert!(format!("{err:#}").contains("999"));

    let mut card = game_card();
    card.away.starting_pitcher.id = 888;
    assert!(
        GameSimulation::new(
            card,
            &daily_table(),
            FixedModel::mixed(),
            WeatherObs::neutral(),
            9,
        )
        .is_err()
    );
}

#[test]
fn empty_daily_dataset_refuses_to_simulate() {
    let empty = DatasetTable {
        windows: vec![5],
        rows: Vec::new(),
    };
    assert!(
        GameSimulation::new(
            game_card(),
            &empty,
            FixedModel::mixed(),
            WeatherObs::neutral(),
            9,
        )
        .is_err()
    );
}

#[test]
fn malformed_classifier_output_is_fatal_mid_game() {
    let sim = GameSimulation::new(
        game_card(),
        &daily_table(),
        BrokenModel,
        WeatherObs::neutral(),
        9,
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    assert!(sim.simulate_game(&mut rng).is_err());
}
