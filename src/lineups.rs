use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// External player identity as produced by the lineup scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: u32,
    pub name: String,
}

/// One side's lineup: nine batters in order plus the starting pitcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupCard {
    pub team: String,
    pub batters: Vec<PlayerRef>,
    pub starting_pitcher: PlayerRef,
}

/// A full scraped matchup, consumed as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCard {
    pub date: NaiveDate,
    pub stadium: String,
    pub home: LineupCard,
    pub away: LineupCard,
}

impl GameCard {
    pub fn validate(&self) -> Result<()> {
        for (label, side) in [("home", &self.home), ("away", &self.away)] {
            if side.batters.len() != 9 {
                bail!(
                    "{label} lineup for {} has {} batters, expected 9",
                    side.team,
                    side.batters.len()
                );
            }
        }
        Ok(())
    }
}
