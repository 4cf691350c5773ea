use chrono::NaiveDate;

use crate::cleaning::RawPitch;

/// One home/away mislabel fix: wherever `(wrong_home, wrong_away[, date])`
/// matches exactly, the team fields are overwritten with the right pair.
/// Applying a correction twice is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    pub wrong_home: &'static str,
    pub wrong_away: &'static str,
    pub right_home: &'static str,
    pub right_away: &'static str,
    pub date: Option<&'static str>,
}

const fn swap(
    wrong_home: &'static str,
    wrong_away: &'static str,
    date: Option<&'static str>,
) -> Correction {
    Correction {
        wrong_home,
        wrong_away,
        right_home: wrong_away,
        right_away: wrong_home,
        date,
    }
}

/// The versioned list of games known to carry swapped home/away labels in
/// the upstream box-score source. Mostly the 2020 season's relocated games.
pub const BUILTIN_CORRECTIONS: &[Correction] = &[
    swap("TOR", "WSH", None),
    swap("CIN", "SF", Some("2013-07-23")),
    swap("BAL", "TB", Some("2015-05-01")),
    swap("BAL", "TB", Some("2015-05-02")),
    swap("BAL", "TB", Some("2015-05-03")),
    swap("MIA", "MIL", Some("2017-09-15")),
    swap("MIA", "MIL", Some("2017-09-16")),
    swap("MIA", "MIL", Some("2017-09-17")),
    swap("NYY", "PHI", Some("2020-08-05")),
    swap("MIA", "BAL", Some("2020-08-05")),
    swap("MIA", "BAL", Some("2020-08-06")),
    swap("MIA", "BAL", Some("2020-08-07")),
    swap("STL", "CHC", Some("2020-08-17")),
    swap("STL", "CHC", Some("2020-08-18")),
    swap("STL", "CHC", Some("2020-08-19")),
    swap("MIA", "WSH", Some("2020-08-22")),
    swap("MIA", "NYM", Some("2020-08-25")),
    swap("NYY", "ATL", Some("2020-08-26")),
    swap("CIN", "MIL", Some("2020-08-27")),
    swap("SEA", "SD", Some("2020-08-27")),
    swap("LAD", "SF", Some("2020-08-27")),
    swap("PIT", "STL", Some("2020-08-27")),
    swap("NYM", "NYY", Some("2020-08-28")),
    swap("MIN", "DET", Some("2020-08-29")),
    swap("OAK", "HOU", Some("2020-08-29")),
    swap("CHC", "CIN", Some("2020-08-29")),
    swap("NYM", "NYY", Some("2020-08-30")),
    swap("WSH", "ATL", Some("2020-09-04")),
    swap("NYY", "BAL", Some("2020-09-04")),
    swap("TOR", "BOS", Some("2020-09-04")),
    swap("DET", "MIN", Some("2020-09-04")),
    swap("CIN", "PIT", Some("2020-09-04")),
    swap("HOU", "LAA", Some("2020-09-05")),
    swap("STL", "CHC", Some("2020-09-05")),
    swap("HOU", "OAK", Some("2020-09-08")),
    swap("BOS", "PHI", Some("2020-09-08")),
    swap("MIN", "STL", Some("2020-09-08")),
    swap("DET", "STL", Some("2020-09-10")),
    swap("PHI", "MIA", Some("2020-09-11")),
    swap("BAL", "NYY", Some("2020-09-11")),
    swap("OAK", "TEX", Some("2020-09-12")),
    swap("PHI", "MIA", Some("2020-09-13")),
    swap("SF", "SD", Some("2020-09-13")),
    swap("PIT", "CIN", Some("2020-09-14")),
    swap("STL", "MIL", Some("2020-09-14")),
    swap("OAK", "SEA", Some("2020-09-14")),
    swap("SEA", "SF", Some("2020-09-16")),
    swap("STL", "MIL", Some("2020-09-16")),
    swap("SEA", "SF", Some("2020-09-17")),
    swap("TB", "BAL", Some("2020-09-17")),
    swap("SEA", "SD", Some("2020-09-18")),
    swap("WSH", "MIA", Some("2020-09-18")),
    swap("TOR", "PHI", Some("2020-09-18")),
    swap("STL", "PIT", Some("2020-09-18")),
    swap("SEA", "SD", Some("2020-09-19")),
    swap("SEA", "SD", Some("2020-09-20")),
    swap("WSH", "MIA", Some("2020-09-20")),
    swap("PHI", "WSH", Some("2020-09-22")),
    swap("COL", "ARI", Some("2020-09-25")),
    swap("SD", "SF", Some("2020-09-25")),
    swap("MIL", "STL", Some("2020-09-25")),
    swap("SEA", "OAK", Some("2020-09-26")),
    swap("NYM", "WSH", Some("2020-09-26")),
    swap("WSH", "TOR", Some("2021-04-27")),
    swap("TOR", "LAA", Some("2021-08-10")),
    swap("OAK", "DET", Some("2022-05-10")),
];

/// How the one known upstream defect in the correction list is handled.
///
/// The source applied the 2020-09-04 WSH/ATL fix with a malformed date (so
/// its own selector matched nothing) and wrote its away-team value onto the
/// row set matched by the 2020-08-30 NYM/NYY fix, reusing that selector's
/// index variable. `Corrected` applies the intended swap; `LegacyCompat`
/// replays the defect byte for byte so historical artifacts can be
/// reproduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMode {
    Corrected,
    LegacyCompat,
}

const QUIRK_ENTRY: (&str, &str, &str) = ("WSH", "ATL", "2020-09-04");
const QUIRK_PARTNER: (&str, &str, &str) = ("NYM", "NYY", "2020-08-30");

fn matches_entry(corr: &Correction, key: (&str, &str, &str)) -> bool {
    corr.wrong_home == key.0 && corr.wrong_away == key.1 && corr.date == Some(key.2)
}

fn parse_corr_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

pub fn apply_corrections(pitches: &mut [RawPitch], mode: CorrectionMode) {
    apply_correction_list(pitches, BUILTIN_CORRECTIONS, mode);
}

pub fn apply_correction_list(
    pitches: &mut [RawPitch],
    corrections: &[Correction],
    mode: CorrectionMode,
) {
    let mut partner_rows: Vec<usize> = Vec::new();

    for corr in corrections {
        let want_date = corr.date.and_then(parse_corr_date);
        let matched: Vec<usize> = pitches
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.home_team == corr.wrong_home
                    && p.away_team == corr.wrong_away
                    && want_date.is_none_or(|d| p.game_date == d)
            })
            .map(|(i, _)| i)
            .collect();

        if matches_entry(corr, QUIRK_PARTNER) {
            partner_rows = matched.clone();
        }

        if mode == CorrectionMode::LegacyCompat && matches_entry(corr, QUIRK_ENTRY) {
            for &i in &partner_rows {
                pitches[i].away_team = corr.right_away.to_string();
            }
            continue;
        }

        for &i in &matched {
            pitches[i].home_team = corr.right_home.to_string();
            pitches[i].away_team = corr.right_away.to_string();
        }
    }
}
