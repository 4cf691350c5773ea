use chrono::NaiveDate;

use dugout::cleaning::{HalfInning, RawPitch, clean_raw_pitches};
use dugout::coefficients::{build_coefficients, game_share_rows};
use dugout::corrections::CorrectionMode;
use dugout::dataset::{DatasetTable, assemble_dataset};
use dugout::model::{LeagueAverageModel, OutcomeModel, validate_probabilities};
use dugout::neutralize::neutralize_stats;
use dugout::params::BuildParams;
use dugout::parks::{ParkSpan, ParkTable};
use dugout::rolling::roll_neutralized_stats;
use dugout::storage::BlobStore;
use dugout::taxonomy::{PLAY_TYPE_COUNT, RELEVANT_RAW_EVENTS};
use dugout::weather::{WeatherArchive, WeatherRecord};

fn small_params() -> BuildParams {
    BuildParams {
        rolling_windows: vec![5],
        min_periods_cap: 2,
        ..BuildParams::default()
    }
}

fn park_table() -> ParkTable {
    ParkTable::new(vec![
        ParkSpan {
            stadium: "Fenway Park".to_string(),
            team: "BOS".to_string(),
            start_year: 1912,
            end_year: 9999,
        },
        ParkSpan {
            stadium: "Yankee Stadium".to_string(),
            team: "NYY".to_string(),
            start_year: 2009,
            end_year: 9999,
        },
    ])
}

fn weather_string(day: u32) -> String {
    let temp = 58 + 2 * day;
    match day % 4 {
        0 => format!("Start Time Weather: {temp}° F, Wind 0mph, In Dome."),
        1 => format!("Start Time Weather: {temp}° F, Wind 9mph, Out to CF."),
        2 => format!("Start Time Weather: {temp}° F, Wind 12mph, In from LF."),
        _ => format!("Start Time Weather: {temp}° F, Wind 6mph from Left to Right."),
    }
}

/// Twelve one-game days in June; every allow-listed event happens in every
/// game, four batters rotate through twenty PAs, starters alternate by day.
fn synthetic_inputs() -> (Vec<RawPitch>, WeatherArchive, ParkTable) {
    let mut pitches = Vec::new();
    let mut weather = Vec::new();

    for day in 1..=12u32 {
        let date = NaiveDate::from_ymd_opt(2023, 6, day).unwrap();
        let (home, away) = if day % 2 == 0 { ("BOS", "NYY") } else { ("NYY", "BOS") };
        let home_full = dugout::parks::team_full_name(home).unwrap();
        let away_full = dugout::parks::team_full_name(away).unwrap();
        weather.push(WeatherRecord {
            date,
            home_team: home_full.to_string(),
            away_team: away_full.to_string(),
            weather: weather_string(day),
        });

        let pitcher = if day % 2 == 0 { 101 } else { 102 };
        for pa in 0..20u32 {
            let event = RELEVANT_RAW_EVENTS[((pa + day) as usize) % RELEVANT_RAW_EVENTS.len()];
            pitches.push(RawPitch {
                game_pk: u64::from(1000 + day),
                game_date: date,
                game_type: "R".to_string(),
                events: Some(event.to_string()),
                batter: 1 + pa % 4,
                pitcher,
                stand: 'R',
                p_throws: 'R',
                home_team: home.to_string(),
                away_team: away.to_string(),
                on_1b: None,
                on_2b: None,
                on_3b: None,
                outs_when_up: (pa % 3) as u8,
                inning: (1 + pa / 4) as u8,
                half: if pa % 2 == 0 { HalfInning::Top } else { HalfInning::Bottom },
                at_bat_number: pa + 1,
                bat_score: 0,
                fld_score: 0,
            });
        }

        // Noise the cleaner must drop: a spring-training PA, an event-less
        // pitch, and a non-PA event.
        let mut spring = pitches.last().unwrap().clone();
        spring.game_type = "S".to_string();
        pitches.push(spring);
        let mut no_event = pitches.last().unwrap().clone();
        no_event.game_type = "R".to_string();
        no_event.events = None;
        pitches.push(no_event);
        let mut pickoff = pitches.last().unwrap().clone();
        pickoff.events = Some("pickoff_1b".to_string());
        pitches.push(pickoff);
    }

    (pitches, WeatherArchive::from_records(weather), park_table())
}

#[test]
fn pipeline_builds_a_complete_dataset() {
    let params = small_params();
    let (raw, weather, parks) = synthetic_inputs();
    let raw_len = raw.len();

    // ---- cleaning --------------------------------------------------------
    let (cleaned, clean_summary) =
        clean_raw_pitches(raw, &weather, &parks, CorrectionMode::Corrected).unwrap();
    assert_eq!(clean_summary.raw_rows, raw_len);
    assert_eq!(clean_summary.plays, 12 * 20);
    assert_eq!(clean_summary.defaulted_weather_games, 0);
    // Everything is an R-vs-R matchup by construction.
    assert_eq!(cleaned.rr.len(), 240);
    assert!(cleaned.rl.is_empty() && cleaned.lr.is_empty() && cleaned.ll.is_empty());

    // Chronological order and unique synthetic ids.
    for pair in cleaned.rr.windows(2) {
        assert!(pair[0].play_id < pair[1].play_id);
        assert!(pair[0].date <= pair[1].date);
    }

    // ---- per-game shares -------------------------------------------------
    let share_rows = game_share_rows(&cleaned.rr);
    assert_eq!(share_rows.len(), 12);
    for row in &share_rows {
        let total: f64 = row.shares.iter().sum();
        assert!((total - 1.0).abs() < 1.0e-9, "game shares sum to {total}");
    }

    // ---- coefficients ----------------------------------------------------
    let coefficients = build_coefficients(&cleaned, &params).unwrap();
    assert_eq!(coefficients.combos.rr.weather.len(), PLAY_TYPE_COUNT);
    assert_eq!(coefficients.combos.rr.park_factors.len(), 2);

    // ---- neutralization --------------------------------------------------
    let (neutralized, neutralize_summary) =
        neutralize_stats(&cleaned, &coefficients, &params).unwrap();
    // Every play type occurs at both parks, so no sentinel drops.
    assert_eq!(neutralize_summary.dropped_unavailable_park_factor, 0);
    assert!(neutralize_summary.kept > 200);
    for row in &neutralized.rr {
        assert!((row.play_value * row.impact - 1.0).abs() < 1.0e-9);
    }

    // ---- rolling ---------------------------------------------------------
    let rolled = roll_neutralized_stats(&neutralized, &params);
    assert_eq!(rolled.rr.len(), neutralized.rr.len());
    for pa in &rolled.rr {
        for window in pa.batter_windows.iter().chain(pa.pitcher_windows.iter()) {
            if let Some(shares) = window {
                let total: f64 = shares.iter().sum();
                assert!((total - 1.0).abs() < 1.0e-6, "window shares sum to {total}");
            }
        }
    }

    // ---- assembly --------------------------------------------------------
    let (table, assemble_summary) = assemble_dataset(&neutralized, &rolled, &params).unwrap();
    assert_eq!(assemble_summary.candidate_rows, neutralize_summary.kept);
    assert!(assemble_summary.kept > 0);
    assert!(assemble_summary.kept < assemble_summary.candidate_rows);
    assert_eq!(table.windows, params.rolling_windows);

    for pair in table.rows.windows(2) {
        assert!(pair[0].play_id < pair[1].play_id, "rows must stay chronological");
    }
    for row in &table.rows {
        assert_eq!(row.is_on_base, row.play_type.is_on_base());
        assert_eq!(row.features.batter_windows.len(), 1);
        assert_eq!(row.features.pitcher_windows.len(), 1);
        assert_eq!(row.features.league_windows.len(), 1);
        let total: f64 = row.features.batter_windows[0].iter().sum();
        assert!((total - 1.0).abs() < 1.0e-6);
        let league_total: f64 = row.features.league_windows[0].iter().sum();
        assert!((league_total - 1.0).abs() < 1.0e-6);
    }

    // ---- baseline model --------------------------------------------------
    let baseline = LeagueAverageModel::fit(&neutralized).unwrap();
    let probs = baseline.predict_proba(&table.rows[0].features).unwrap();
    validate_probabilities(&probs).unwrap();

    // ---- artifact round trip --------------------------------------------
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    store.put_json("final_dataset_test", &table).unwrap();
    store.put_json("neutralization_coefficients_test", &coefficients).unwrap();
    store.put_json("baseline_model_test", &baseline).unwrap();

    let reloaded: DatasetTable = store.get_json("final_dataset_test").unwrap();
    assert_eq!(reloaded.rows.len(), table.rows.len());
    assert_eq!(reloaded.windows, table.windows);

    let reloaded_coeffs: dugout::coefficients::CoefficientSet =
        store.get_json("neutralization_coefficients_test").unwrap();
    assert_eq!(
        reloaded_coeffs.combos.rr.weather.len(),
        coefficients.combos.rr.weather.len()
    );
}

#[test]
fn daily_lookups_expose_latest_player_rows() {
    let params = small_params();
    let (raw, weather, parks) = synthetic_inputs();
    let (cleaned, _) = clean_raw_pitches(raw, &weather, &parks, CorrectionMode::Corrected).unwrap();
    let coefficients = build_coefficients(&cleaned, &params).unwrap();
    let (neutralized, _) = neutralize_stats(&cleaned, &coefficients, &params).unwrap();
    let rolled = roll_neutralized_stats(&neutralized, &params);
    let (table, _) = assemble_dataset(&neutralized, &rolled, &params).unwrap();

    let batters = table.latest_batter_windows();
    let pitchers = table.latest_pitcher_windows();
    for batter in 1..=4u32 {
        let (windows, hand) = batters.get(&batter).expect("batter has a daily row");
        assert_eq!(windows.len(), 1);
        assert_eq!(*hand, 'R');
    }
    assert!(pitchers.contains_key(&101) && pitchers.contains_key(&102));
    assert!(table.latest_league_windows().is_some());
}
