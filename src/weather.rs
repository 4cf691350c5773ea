use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::parks::team_full_name;

/// Temperature assumed when a weather string cannot be parsed, and the
/// baseline the neutralizer compares against by default.
pub const DEFAULT_TEMPERATURE: i32 = 72;

/// Substitute reading for games whose weather never made it into the
/// archive. A missing single game degrades to this; it never aborts a build.
pub const DEFAULT_WEATHER: &str = "Start Time Weather: 72° F, Wind 0mph, In Dome.";

/// Wind direction category. `Zero` is forced whenever the parsed speed is 0,
/// regardless of any direction text present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindDirection {
    In,
    Out,
    Zero,
    LeftToRight,
    RightToLeft,
}

/// Parsed per-game weather reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObs {
    pub temperature: i32,
    pub wind_speed: u32,
    pub direction: Option<WindDirection>,
}

impl WeatherObs {
    pub fn neutral() -> Self {
        WeatherObs {
            temperature: DEFAULT_TEMPERATURE,
            wind_speed: 0,
            direction: Some(WindDirection::Zero),
        }
    }

    pub fn wind(&self) -> WindColumns {
        wind_columns(self.direction, self.wind_speed)
    }
}

/// The one-hot-times-magnitude wind encoding: each reading gets its speed in
/// its own category column and 0 everywhere else. A reading with no category
/// is all zeros, and the `zero` column is structurally always 0 (the category
/// only exists at speed 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindColumns {
    pub wind_in: f64,
    pub wind_out: f64,
    pub wind_zero: f64,
    pub left_to_right: f64,
    pub right_to_left: f64,
}

pub fn wind_columns(direction: Option<WindDirection>, speed: u32) -> WindColumns {
    let mut cols = WindColumns::default();
    let mph = f64::from(speed);
    match direction {
        Some(WindDirection::In) => cols.wind_in = mph,
        Some(WindDirection::Out) => cols.wind_out = mph,
        Some(WindDirection::Zero) => cols.wind_zero = mph,
        Some(WindDirection::LeftToRight) => cols.left_to_right = mph,
        Some(WindDirection::RightToLeft) => cols.right_to_left = mph,
        None => {}
    }
    cols
}

/// Parse a box-score weather string of the form
/// `"Start Time Weather: 72° F, Wind 8mph, Out to CF."`.
///
/// Returns `None` only when the temperature cannot be recovered; callers fall
/// back to `WeatherObs::neutral()` in that case.
pub fn parse_weather(full: &str) -> Option<WeatherObs> {
    let temperature = parse_temperature(full)?;
    let wind_speed = parse_wind_speed(full);
    let direction = if wind_speed == 0 {
        Some(WindDirection::Zero)
    } else {
        parse_wind_direction(full)
    };
    Some(WeatherObs {
        temperature,
        wind_speed,
        direction,
    })
}

/// Parse with the documented fallback applied.
pub fn parse_weather_or_default(full: &str) -> WeatherObs {
    parse_weather(full).unwrap_or_else(WeatherObs::neutral)
}

fn parse_temperature(full: &str) -> Option<i32> {
    let after_colon = full.split(": ").nth(1)?;
    let digits: String = after_colon
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    digits.parse::<i32>().ok()
}

fn parse_wind_speed(full: &str) -> u32 {
    let Some(after) = full.split("Wind ").nth(1) else {
        return 0;
    };
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().unwrap_or(0)
}

/// The direction decision table, applied to the text with the literal token
/// "Wind" removed (so the "in" inside "Wind" can never match).
fn parse_wind_direction(full: &str) -> Option<WindDirection> {
    let stripped = full.replace("Wind", "").to_ascii_lowercase();
    if stripped.contains("in") {
        return Some(WindDirection::In);
    }
    if stripped.contains("out") {
        return Some(WindDirection::Out);
    }
    if stripped.contains("left") || stripped.contains("right") {
        let phrase = stripped.split("from ").last()?;
        let phrase = phrase
            .split(['.', ','])
            .next()
            .unwrap_or(phrase)
            .trim()
            .to_string();
        return match phrase.as_str() {
            "left to right" => Some(WindDirection::LeftToRight),
            "right to left" => Some(WindDirection::RightToLeft),
            _ => None,
        };
    }
    None
}

/// One archived weather row: date, teams as full names, raw string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub weather: String,
}

/// In-memory weather archive covering a fixed set of seasons. Construction
/// is the fatal surface: asking for a year the backing store has no rows for
/// fails loudly, while a single game missing from a loaded year
/// degrades to `DEFAULT_WEATHER` at lookup time.
#[derive(Debug, Clone, Default)]
pub struct WeatherArchive {
    by_date: HashMap<NaiveDate, Vec<WeatherRecord>>,
    years: std::collections::HashSet<i32>,
}

impl WeatherArchive {
    pub fn from_records(records: Vec<WeatherRecord>) -> Self {
        let mut by_date: HashMap<NaiveDate, Vec<WeatherRecord>> = HashMap::new();
        let mut years = std::collections::HashSet::new();
        for rec in records {
            years.insert(rec.date.year());
            by_date.entry(rec.date).or_default().push(rec);
        }
        WeatherArchive { by_date, years }
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Whether the archive holds any readings for a season. Seasons outside
    /// this set must not be cleaned against the archive at all.
    pub fn covers_year(&self, year: i32) -> bool {
        self.years.contains(&year)
    }

    /// Raw weather string for a game, matched on date plus the home team's
    /// full name. The away team is accepted too: a handful of upstream games
    /// list both clubs on the road, and the reading still belongs to the
    /// game. First match wins on double-header duplicates.
    pub fn raw_for_game(&self, date: NaiveDate, home_abbr: &str, away_abbr: &str) -> Option<&str> {
        let rows = self.by_date.get(&date)?;
        let home_full = team_full_name(home_abbr);
        let away_full = team_full_name(away_abbr);
        rows.iter()
            .find(|r| {
                Some(r.home_team.as_str()) == home_full || Some(r.home_team.as_str()) == away_full
            })
            .map(|r| r.weather.as_str())
    }

    /// Parsed reading with the neutral fallback applied on any miss.
    pub fn observation_for_game(
        &self,
        date: NaiveDate,
        home_abbr: &str,
        away_abbr: &str,
    ) -> WeatherObs {
        match self.raw_for_game(date, home_abbr, away_abbr) {
            Some(raw) => parse_weather_or_default(raw),
            None => WeatherObs::neutral(),
        }
    }
}
