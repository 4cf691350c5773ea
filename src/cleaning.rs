use std::collections::HashSet;

use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::corrections::{CorrectionMode, apply_corrections};
use crate::parks::ParkTable;
use crate::taxonomy::{ComboTable, PitbatCombo, PlayType, RELEVANT_RAW_EVENTS, canonical_play_type};
use crate::weather::{WeatherArchive, WeatherObs};

/// Top or bottom of an inning, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HalfInning {
    Top,
    Bottom,
}

impl HalfInning {
    pub fn from_topbot(raw: &str) -> Option<Self> {
        match raw {
            "Top" => Some(HalfInning::Top),
            "Bot" | "Bottom" => Some(HalfInning::Bottom),
            _ => None,
        }
    }
}

/// One raw pitch record as exported from the statcast archive. Most rows
/// carry no event; only PA-ending rows survive cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPitch {
    pub game_pk: u64,
    pub game_date: NaiveDate,
    pub game_type: String,
    pub events: Option<String>,
    pub batter: u32,
    pub pitcher: u32,
    pub stand: char,
    pub p_throws: char,
    pub home_team: String,
    pub away_team: String,
    /// Runner ids; occupancy is all the pipeline keeps.
    pub on_1b: Option<u64>,
    pub on_2b: Option<u64>,
    pub on_3b: Option<u64>,
    pub outs_when_up: u8,
    pub inning: u8,
    pub half: HalfInning,
    pub at_bat_number: u32,
    pub bat_score: i32,
    pub fld_score: i32,
}

/// A cleaned, weather- and park-annotated plate appearance. `play_id` is the
/// synthetic key assigned once here and threaded through every later stage;
/// all cross-stage joins use it instead of positional alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Play {
    pub play_id: u64,
    pub game_pk: u64,
    pub date: NaiveDate,
    pub batter: u32,
    pub pitcher: u32,
    pub combo: PitbatCombo,
    pub inning: u8,
    pub half: HalfInning,
    pub outs: u8,
    pub on_1b: bool,
    pub on_2b: bool,
    pub on_3b: bool,
    pub bat_score: i32,
    pub fld_score: i32,
    pub play_type: PlayType,
    pub weather: WeatherObs,
    pub ballpark: String,
}

/// Row accounting for one cleaning run.
#[derive(Debug, Clone, Default)]
pub struct CleanSummary {
    pub raw_rows: usize,
    pub regular_season_rows: usize,
    pub event_rows: usize,
    pub relevant_rows: usize,
    pub plays: usize,
    pub unknown_handedness_rows: usize,
    pub defaulted_weather_games: usize,
}

/// Run the full play cleaning pass: regular-season filter, home/away
/// corrections, chronological sort, event allow-list, canonical mapping,
/// weather and ballpark joins, play-id assignment and the four-way
/// handedness partition.
pub fn clean_raw_pitches(
    mut raw: Vec<RawPitch>,
    weather: &WeatherArchive,
    parks: &ParkTable,
    mode: CorrectionMode,
) -> Result<(ComboTable<Vec<Play>>, CleanSummary)> {
    let mut summary = CleanSummary {
        raw_rows: raw.len(),
        ..CleanSummary::default()
    };

    raw.retain(|p| p.game_type == "R");
    summary.regular_season_rows = raw.len();

    apply_corrections(&mut raw, mode);

    // The ordering every later rolling/sequential stage depends on. Any
    // transform that reorders rows after this point must re-sort.
    raw.sort_by(|a, b| {
        (a.game_date, a.inning, a.half, a.at_bat_number).cmp(&(
            b.game_date,
            b.inning,
            b.half,
            b.at_bat_number,
        ))
    });

    raw.retain(|p| p.events.is_some());
    summary.event_rows = raw.len();

    let relevant: HashSet<&str> = RELEVANT_RAW_EVENTS.iter().copied().collect();
    raw.retain(|p| {
        p.events
            .as_deref()
            .is_some_and(|e| relevant.contains(e))
    });
    summary.relevant_rows = raw.len();

    // The archive must cover every season present in the data before any
    // per-game lookups happen; a whole missing year is a data-availability
    // precondition, not a soft miss.
    let seasons: HashSet<i32> = raw.iter().map(|p| p.game_date.year()).collect();
    for year in &seasons {
        if !weather.covers_year(*year) {
            bail!("weather archive has no readings for the {year} season");
        }
    }

    let mut defaulted_games: HashSet<u64> = HashSet::new();
    let mut partitions: ComboTable<Vec<Play>> = ComboTable::default();
    let mut next_play_id = 0u64;

    for pitch in raw {
        let event = pitch.events.as_deref().unwrap_or_default();
        let Some(play_type) = canonical_play_type(event) else {
            // The allow-list filter above guarantees coverage; reaching this
            // arm means the taxonomy and the filter disagree.
            bail!("event {event:?} passed the allow-list but has no canonical play type");
        };

        let Some(combo) = PitbatCombo::from_hands(pitch.stand, pitch.p_throws) else {
            summary.unknown_handedness_rows += 1;
            continue;
        };

        let raw_weather =
            weather.raw_for_game(pitch.game_date, &pitch.home_team, &pitch.away_team);
        let obs = match raw_weather {
            Some(s) => crate::weather::parse_weather_or_default(s),
            None => {
                defaulted_games.insert(pitch.game_pk);
                WeatherObs::neutral()
            }
        };

        let ballpark = parks
            .lookup(&pitch.home_team, pitch.game_date.year())?
            .to_string();

        partitions.get_mut(combo).push(Play {
            play_id: next_play_id,
            game_pk: pitch.game_pk,
            date: pitch.game_date,
            batter: pitch.batter,
            pitcher: pitch.pitcher,
            combo,
            inning: pitch.inning,
            half: pitch.half,
            outs: pitch.outs_when_up,
            on_1b: pitch.on_1b.is_some(),
            on_2b: pitch.on_2b.is_some(),
            on_3b: pitch.on_3b.is_some(),
            bat_score: pitch.bat_score,
            fld_score: pitch.fld_score,
            play_type,
            weather: obs,
            ballpark,
        });
        next_play_id += 1;
    }

    summary.plays = next_play_id as usize;
    summary.defaulted_weather_games = defaulted_games.len();
    Ok((partitions, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parks::ParkSpan;
    use crate::weather::WeatherRecord;

    fn park_table() -> ParkTable {
        ParkTable::new(vec![ParkSpan {
            stadium: "Fenway Park".to_string(),
            team: "BOS".to_string(),
            start_year: 1912,
            end_year: 9999,
        }])
    }

    fn archive(date: NaiveDate) -> WeatherArchive {
        WeatherArchive::from_records(vec![WeatherRecord {
            date,
            home_team: "Boston Red Sox".to_string(),
            away_team: "New York Yankees".to_string(),
            weather: "Start Time Weather: 65° F, Wind 10mph, Out to CF.".to_string(),
        }])
    }

    fn pitch(date: NaiveDate, event: Option<&str>, at_bat: u32) -> RawPitch {
        RawPitch {
            game_pk: 77,
            game_date: date,
            game_type: "R".to_string(),
            events: event.map(|e| e.to_string()),
            batter: 1,
            pitcher: 2,
            stand: 'R',
            p_throws: 'L',
            home_team: "BOS".to_string(),
            away_team: "NYY".to_string(),
            on_1b: None,
            on_2b: Some(55),
            on_3b: None,
            outs_when_up: 1,
            inning: 3,
            half: HalfInning::Top,
            at_bat_number: at_bat,
            bat_score: 2,
            fld_score: 1,
        }
    }

    #[test]
    fn keeps_only_relevant_events_and_annotates() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 10).unwrap();
        let mut spring = pitch(date, Some("single"), 1);
        spring.game_type = "S".to_string();

        let raw = vec![
            spring,
            pitch(date, None, 2),
            pitch(date, Some("pickoff_1b"), 3),
            pitch(date, Some("single"), 4),
            pitch(date, Some("hit_by_pitch"), 5),
        ];

        let (partitions, summary) =
            clean_raw_pitches(raw, &archive(date), &park_table(), CorrectionMode::Corrected)
                .unwrap();

        assert_eq!(summary.raw_rows, 5);
        assert_eq!(summary.regular_season_rows, 4);
        assert_eq!(summary.relevant_rows, 2);
        assert_eq!(summary.plays, 2);

        let rl = &partitions.rl;
        assert_eq!(rl.len(), 2);
        assert_eq!(rl[0].play_type, PlayType::Single);
        assert_eq!(rl[1].play_type, PlayType::Walk);
        assert_eq!(rl[0].ballpark, "Fenway Park");
        assert_eq!(rl[0].weather.wind_speed, 10);
        assert!(rl[0].on_2b && !rl[0].on_1b && !rl[0].on_3b);
        // Synthetic ids follow the chronological sort.
        assert!(rl[0].play_id < rl[1].play_id);
    }

    #[test]
    fn missing_game_weather_defaults_instead_of_failing() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 10).unwrap();
        let other = NaiveDate::from_ymd_opt(2023, 6, 11).unwrap();
        let raw = vec![pitch(other, Some("double"), 1)];

        let (partitions, summary) =
            clean_raw_pitches(raw, &archive(date), &park_table(), CorrectionMode::Corrected)
                .unwrap();
        assert_eq!(summary.defaulted_weather_games, 1);
        assert_eq!(partitions.rl[0].weather, WeatherObs::neutral());
    }

    #[test]
    fn empty_weather_archive_is_fatal() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 10).unwrap();
        let raw = vec![pitch(date, Some("double"), 1)];
        let result = clean_raw_pitches(
            raw,
            &WeatherArchive::default(),
            &park_table(),
            CorrectionMode::Corrected,
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_ballpark_interval_is_fatal() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 10).unwrap();
        let mut p = pitch(date, Some("double"), 1);
        p.home_team = "SEA".to_string();
        let result = clean_raw_pitches(
            vec![p],
            &archive(date),
            &park_table(),
            CorrectionMode::Corrected,
        );
        assert!(result.is_err());
    }
}
