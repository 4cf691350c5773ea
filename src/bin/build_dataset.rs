use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Datelike;

use dugout::cleaning::clean_raw_pitches;
use dugout::coefficients::build_coefficients;
use dugout::corrections::CorrectionMode;
use dugout::dataset::assemble_dataset;
use dugout::model::LeagueAverageModel;
use dugout::neutralize::neutralize_stats;
use dugout::params::BuildParams;
use dugout::parks::ParkTable;
use dugout::rolling::roll_neutralized_stats;
use dugout::storage::{BlobStore, WeatherDb, load_raw_pitches_json, load_raw_pitches_parquet};

fn main() -> Result<()> {
    let pitches_path = required_path_arg("--pitches")?;
    let weather_db_path = required_path_arg("--weather-db")?;
    let parks_path = required_path_arg("--parks")?;
    let store_root = path_arg("--store").unwrap_or_else(|| PathBuf::from("artifacts"));
    let suffix = string_arg("--suffix").unwrap_or_else(|| "latest".to_string());
    let correction_mode = if flag_arg("--legacy-corrections") {
        CorrectionMode::LegacyCompat
    } else {
        CorrectionMode::Corrected
    };

    let params = BuildParams::from_env();
    let store = BlobStore::open(&store_root)?;

    // ---- load inputs -----------------------------------------------------
    let raw = if pitches_path.extension().is_some_and(|e| e == "parquet") {
        let (rows, skipped) =
            load_raw_pitches_parquet(&pitches_path).context("stage: load raw pitches")?;
        if skipped > 0 {
            eprintln!("[WARN] skipped {skipped} undecodable parquet rows");
        }
        rows
    } else {
        load_raw_pitches_json(&pitches_path).context("stage: load raw pitches")?
    };
    eprintln!("[INFO] loaded {} raw pitch rows", raw.len());
    if raw.is_empty() {
        return Err(anyhow!("no raw pitch rows in {}", pitches_path.display()));
    }

    let seasons: BTreeSet<i32> = raw.iter().map(|p| p.game_date.year()).collect();
    let season_list: Vec<i32> = seasons.into_iter().collect();
    let weather = WeatherDb::open(&weather_db_path)
        .and_then(|db| db.load_years(&season_list))
        .context("stage: load weather archive")?;
    eprintln!("[INFO] weather archive loaded for seasons {season_list:?}");

    let parks: ParkTable = serde_json::from_str(
        &std::fs::read_to_string(&parks_path)
            .with_context(|| format!("read park table {}", parks_path.display()))?,
    )
    .context("stage: load park table")?;

    // ---- pipeline --------------------------------------------------------
    let (cleaned, clean_summary) =
        clean_raw_pitches(raw, &weather, &parks, correction_mode).context("stage: cleaning")?;
    eprintln!(
        "[INFO] cleaning: {} raw -> {} plays ({} weather-defaulted games, {} unknown-handedness rows)",
        clean_summary.raw_rows,
        clean_summary.plays,
        clean_summary.defaulted_weather_games,
        clean_summary.unknown_handedness_rows,
    );

    let coefficients =
        build_coefficients(&cleaned, &params).context("stage: coefficient fitting")?;
    store.put_json(&format!("neutralization_coefficients_{suffix}"), &coefficients)?;
    eprintln!("[INFO] coefficient artifact saved (suffix {suffix})");

    let (neutralized, neutralize_summary) =
        neutralize_stats(&cleaned, &coefficients, &params).context("stage: neutralization")?;
    eprintln!(
        "[INFO] neutralization: kept {} plays, dropped {} (park factor n/a) + {} (degenerate impact)",
        neutralize_summary.kept,
        neutralize_summary.dropped_unavailable_park_factor,
        neutralize_summary.dropped_degenerate_impact,
    );

    let rolled = roll_neutralized_stats(&neutralized, &params);
    eprintln!("[INFO] rolling: windows {:?}", params.rolling_windows);

    let (table, assemble_summary) =
        assemble_dataset(&neutralized, &rolled, &params).context("stage: assembly")?;
    eprintln!(
        "[INFO] assembly: {} candidates -> {} rows (dropped {} batter-history, {} pitcher-history, {} league-average, {} preseason)",
        assemble_summary.candidate_rows,
        assemble_summary.kept,
        assemble_summary.dropped_insufficient_batter_history,
        assemble_summary.dropped_insufficient_pitcher_history,
        assemble_summary.dropped_missing_league_average,
        assemble_summary.dropped_preseason,
    );
    store.put_json(&format!("final_dataset_{suffix}"), &table)?;

    let baseline = LeagueAverageModel::fit(&neutralized).context("stage: baseline model")?;
    store.put_json(&format!("baseline_model_{suffix}"), &baseline)?;

    eprintln!(
        "[INFO] dataset build complete: {} rows saved under {}",
        table.rows.len(),
        store_root.display()
    );
    Ok(())
}

fn string_arg(flag: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&format!("{flag}=")) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn path_arg(flag: &str) -> Option<PathBuf> {
    string_arg(flag).map(PathBuf::from)
}

fn required_path_arg(flag: &str) -> Result<PathBuf> {
    path_arg(flag).ok_or_else(|| anyhow!("missing required argument {flag} <path>"))
}

fn flag_arg(flag: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == flag)
}
