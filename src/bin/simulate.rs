use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;

use dugout::dataset::DatasetTable;
use dugout::lineups::GameCard;
use dugout::model::LeagueAverageModel;
use dugout::simulator::{GameResult, GameSimulation};
use dugout::storage::BlobStore;
use dugout::weather::parse_weather_or_default;

const DEFAULT_GAMES: usize = 1000;
const DEFAULT_INNINGS: u8 = 9;

fn main() -> Result<()> {
    let store_root = path_arg("--store").unwrap_or_else(|| PathBuf::from("artifacts"));
    let suffix = string_arg("--suffix").unwrap_or_else(|| "latest".to_string());
    let lineup_path = path_arg("--lineup")
        .ok_or_else(|| anyhow!("missing required argument --lineup <path>"))?;
    let games = string_arg("--games")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_GAMES);
    let innings = string_arg("--innings")
        .and_then(|raw| raw.parse::<u8>().ok())
        .unwrap_or(DEFAULT_INNINGS);
    let seed = string_arg("--seed").and_then(|raw| raw.parse::<u64>().ok());

    let store = BlobStore::open(&store_root)?;
    let daily: DatasetTable = store
        .get_json(&format!("final_dataset_{suffix}"))
        .context("load daily dataset")?;
    let model: LeagueAverageModel = store
        .get_json(&format!("baseline_model_{suffix}"))
        .context("load baseline model")?;

    let card: GameCard = serde_json::from_str(
        &std::fs::read_to_string(&lineup_path)
            .with_context(|| format!("read lineup card {}", lineup_path.display()))?,
    )
    .context("parse lineup card")?;

    let weather = parse_weather_or_default(
        &string_arg("--weather").unwrap_or_default(),
    );

    let sim = GameSimulation::new(card.clone(), &daily, model, weather, innings)
        .context("simulator construction")?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut home_wins = 0usize;
    let mut ties = 0usize;
    let mut total_home = 0u64;
    let mut total_away = 0u64;
    let mut first: Option<GameResult> = None;

    for _ in 0..games {
        let result = sim.simulate_game(&mut rng)?;
        if result.home_score > result.away_score {
            home_wins += 1;
        } else if result.home_score == result.away_score {
            ties += 1;
        }
        total_home += u64::from(result.home_score);
        total_away += u64::from(result.away_score);
        if first.is_none() {
            first = Some(result);
        }
    }

    println!(
        "{} @ {}: {} games over {} innings",
        card.away.team, card.home.team, games, innings
    );
    println!(
        "home wins {:.1}%  ties {:.1}%  avg score {:.2} - {:.2}",
        100.0 * home_wins as f64 / games.max(1) as f64,
        100.0 * ties as f64 / games.max(1) as f64,
        total_away as f64 / games.max(1) as f64,
        total_home as f64 / games.max(1) as f64,
    );

    if let Some(result) = first {
        println!("\nsample game: {} - {}", result.away_score, result.home_score);
        for (team, side) in [(&result.away, "away"), (&result.home, "home")] {
            println!("{} ({side})", team.team);
            for (player, line) in &team.batting {
                println!(
                    "  {:<24} PA {:>2}  AB {:>2}  H {:>2}  BB {:>2}  SO {:>2}  RBI {:>2}",
                    player.name,
                    line.plate_appearances,
                    line.at_bats,
                    line.hits(),
                    line.walks,
                    line.strikeouts,
                    line.rbi,
                );
            }
            let (pitcher, line) = &team.pitching;
            println!(
                "  P: {:<21} IP {:>4.1}  K {:>2}  H {:>2}  BB {:>2}  R {:>2}",
                pitcher.name,
                line.outs_recorded as f64 / 3.0,
                line.strikeouts,
                line.hits_allowed,
                line.walks_allowed,
                line.runs_allowed,
            );
        }
    }

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
