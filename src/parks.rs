use std::collections::HashMap;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Abbreviation -> full club name, used when joining plays to the weather
/// archive (which stores full names).
static TEAM_FULL_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("SF", "San Francisco Giants"),
        ("NYY", "New York Yankees"),
        ("DET", "Detroit Tigers"),
        ("TEX", "Texas Rangers"),
        ("STL", "St. Louis Cardinals"),
        ("WSH", "Washington Nationals"),
        ("MIL", "Milwaukee Brewers"),
        ("CLE", "Cleveland Guardians"),
        ("SD", "San Diego Padres"),
        ("COL", "Colorado Rockies"),
        ("BAL", "Baltimore Orioles"),
        ("HOU", "Houston Astros"),
        ("KC", "Kansas City Royals"),
        ("OAK", "Oakland Athletics"),
        ("BOS", "Boston Red Sox"),
        ("CWS", "Chicago White Sox"),
        ("AZ", "Arizona Diamondbacks"),
        ("ARI", "Arizona Diamondbacks"),
        ("ATL", "Atlanta Braves"),
        ("CIN", "Cincinnati Reds"),
        ("MIN", "Minnesota Twins"),
        ("MIA", "Miami Marlins"),
        ("LAD", "Los Angeles Dodgers"),
        ("TB", "Tampa Bay Rays"),
        ("PHI", "Philadelphia Phillies"),
        ("NYM", "New York Mets"),
        ("CHC", "Chicago Cubs"),
        ("TOR", "Toronto Blue Jays"),
        ("SEA", "Seattle Mariners"),
        ("LAA", "Los Angeles Angels"),
        ("PIT", "Pittsburgh Pirates"),
    ])
});

pub fn team_full_name(abbr: &str) -> Option<&'static str> {
    TEAM_FULL_NAMES.get(abbr).copied()
}

/// One ballpark validity interval: the club played at `stadium` from
/// `start_year` (inclusive) until `end_year` (exclusive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkSpan {
    pub stadium: String,
    pub team: String,
    pub start_year: i32,
    pub end_year: i32,
}

/// Ballpark lookup table keyed by (home team, season year). The table itself
/// is collaborator data loaded from the blob store; this type only enforces
/// the interval contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParkTable {
    spans: Vec<ParkSpan>,
}

impl ParkTable {
    pub fn new(spans: Vec<ParkSpan>) -> Self {
        ParkTable { spans }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Resolve the park a club called home in a given season. A (team, year)
    /// with no covering interval is a data-integrity error. Overlapping
    /// intervals should not occur; when they do the first match is taken,
    /// which is accepted degraded behavior rather than a silent guarantee.
    pub fn lookup(&self, team: &str, year: i32) -> Result<&str> {
        self.spans
            .iter()
            .find(|s| s.team == team && s.start_year <= year && year < s.end_year)
            .map(|s| s.stadium.as_str())
            .ok_or_else(|| anyhow!("no ballpark interval covers {team} in {year}"))
    }
}
