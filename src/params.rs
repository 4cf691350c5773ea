use std::env;

/// Tunables for a dataset build. Every field has the inherited default and a
/// `DUGOUT_*` environment override so batch runs can be reconfigured without
/// a rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildParams {
    /// Trailing-window lengths, in plate appearances.
    pub rolling_windows: Vec<usize>,
    /// A window emits nothing until the player has `min(cap, window)` prior
    /// PAs on record.
    pub min_periods_cap: usize,
    /// Temperature (°F) defining "neutral weather" for the impact baseline.
    pub neutral_temperature: f64,
    /// League-average lookback = window / divisor, in days. An ad hoc
    /// constant inherited from the source; named so it can be tuned.
    pub league_average_window_divisor: f64,
    /// Games before this month are excluded from regression fitting and from
    /// the final dataset (early-season roster mixes distort shares).
    pub season_start_month: u32,
}

impl Default for BuildParams {
    fn default() -> Self {
        BuildParams {
            rolling_windows: vec![75, 504],
            min_periods_cap: 25,
            neutral_temperature: 72.0,
            league_average_window_divisor: 2.25,
            season_start_month: 5,
        }
    }
}

impl BuildParams {
    pub fn from_env() -> Self {
        let mut params = BuildParams::default();
        if let Some(windows) = env_list("DUGOUT_ROLLING_WINDOWS") {
            params.rolling_windows = windows;
        }
        if let Some(cap) = env_parse::<usize>("DUGOUT_MIN_PERIODS_CAP") {
            params.min_periods_cap = cap;
        }
        if let Some(temp) = env_parse::<f64>("DUGOUT_NEUTRAL_TEMPERATURE") {
            params.neutral_temperature = temp;
        }
        if let Some(div) = env_parse::<f64>("DUGOUT_LA_WINDOW_DIVISOR") {
            if div > 0.0 {
                params.league_average_window_divisor = div;
            }
        }
        if let Some(month) = env_parse::<u32>("DUGOUT_SEASON_START_MONTH") {
            if (1..=12).contains(&month) {
                params.season_start_month = month;
            }
        }
        params
    }

    /// Floor of prior PAs required before a window emits an estimate.
    pub fn min_periods(&self, window: usize) -> usize {
        self.min_periods_cap.min(window)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse::<T>().ok()
}

fn env_list(key: &str) -> Option<Vec<usize>> {
    let raw = env::var(key).ok()?;
    let windows: Vec<usize> = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|w| *w > 0)
        .collect();
    if windows.is_empty() { None } else { Some(windows) }
}
