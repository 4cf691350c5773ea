use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Field, Row};
use rusqlite::{Connection, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cleaning::{HalfInning, RawPitch};
use crate::weather::{WeatherArchive, WeatherRecord};

/// Opaque key -> JSON blob storage under a local root directory. Keys may
/// contain `/` separators; writes are atomic (tmp file + rename) so a
/// crashed run never leaves a truncated artifact behind.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("create blob store root {}", root.display()))?;
        Ok(BlobStore { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.set_extension("json");
        path
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create blob directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string(value).with_context(|| format!("serialize blob {key}"))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).with_context(|| format!("write blob {key}"))?;
        fs::rename(&tmp, &path).with_context(|| format!("swap blob {key}"))?;
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let path = self.path_for(key);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read blob {key} at {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse blob {key}"))
    }
}

/// Load raw pitch rows from a JSON export.
pub fn load_raw_pitches_json(path: &Path) -> Result<Vec<RawPitch>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read raw pitches {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse raw pitches {}", path.display()))
}

/// Load raw pitch rows from a columnar Parquet export. Fields are resolved
/// by column name per row, so column order in the file does not matter; rows
/// missing a required column are skipped and counted by the caller via the
/// returned pair.
pub fn load_raw_pitches_parquet(path: &Path) -> Result<(Vec<RawPitch>, usize)> {
    let file =
        fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader for raw pitches")?;
    let iter = reader.get_row_iter(None).context("iterate raw pitch rows")?;

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        match decode_pitch_row(&row) {
            Some(pitch) => out.push(pitch),
            None => skipped += 1,
        }
    }
    Ok((out, skipped))
}

fn decode_pitch_row(row: &Row) -> Option<RawPitch> {
    let mut game_pk = None;
    let mut game_date = None;
    let mut game_type = None;
    let mut events = None;
    let mut batter = None;
    let mut pitcher = None;
    let mut stand = None;
    let mut p_throws = None;
    let mut home_team = None;
    let mut away_team = None;
    let mut on_1b = None;
    let mut on_2b = None;
    let mut on_3b = None;
    let mut outs_when_up = None;
    let mut inning = None;
    let mut half = None;
    let mut at_bat_number = None;
    let mut bat_score = None;
    let mut fld_score = None;

    for (name, field) in row.get_column_iter() {
        match name.as_str() {
            "game_pk" => game_pk = field_u64(field),
            "game_date" => game_date = field_date(field),
            "game_type" => game_type = field_string(field),
            "events" => events = Some(field_string(field)),
            "batter" => batter = field_u64(field).map(|v| v as u32),
            "pitcher" => pitcher = field_u64(field).map(|v| v as u32),
            "stand" => stand = field_string(field).and_then(|s| s.chars().next()),
            "p_throws" => p_throws = field_string(field).and_then(|s| s.chars().next()),
            "home_team" => home_team = field_string(field),
            "away_team" => away_team = field_string(field),
            "on_1b" => on_1b = Some(field_u64(field)),
            "on_2b" => on_2b = Some(field_u64(field)),
            "on_3b" => on_3b = Some(field_u64(field)),
            "outs_when_up" => outs_when_up = field_u64(field).map(|v| v as u8),
            "inning" => inning = field_u64(field).map(|v| v as u8),
            "inning_topbot" => {
                half = field_string(field).and_then(|s| HalfInning::from_topbot(&s));
            }
            "at_bat_number" => at_bat_number = field_u64(field).map(|v| v as u32),
            "bat_score" => bat_score = field_i64(field).map(|v| v as i32),
            "fld_score" => fld_score = field_i64(field).map(|v| v as i32),
            _ => {}
        }
    }

    Some(RawPitch {
        game_pk: game_pk?,
        game_date: game_date?,
        game_type: game_type?,
        events: events.flatten(),
        batter: batter?,
        pitcher: pitcher?,
        stand: stand?,
        p_throws: p_throws?,
        home_team: home_team?,
        away_team: away_team?,
        on_1b: on_1b.flatten(),
        on_2b: on_2b.flatten(),
        on_3b: on_3b.flatten(),
        outs_when_up: outs_when_up?,
        inning: inning?,
        half: half?,
        at_bat_number: at_bat_number?,
        bat_score: bat_score?,
        fld_score: fld_score?,
    })
}

fn field_string(field: &Field) -> Option<String> {
    match field {
        Field::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
        }
        _ => None,
    }
}

fn field_i64(field: &Field) -> Option<i64> {
    match field {
        Field::Byte(v) => Some(i64::from(*v)),
        Field::Short(v) => Some(i64::from(*v)),
        Field::Int(v) => Some(i64::from(*v)),
        Field::Long(v) => Some(*v),
        Field::UByte(v) => Some(i64::from(*v)),
        Field::UShort(v) => Some(i64::from(*v)),
        Field::UInt(v) => Some(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v).ok(),
        Field::Float(v) => Some(*v as i64),
        Field::Double(v) => Some(*v as i64),
        Field::Str(s) => s.trim().parse::<f64>().ok().map(|v| v as i64),
        _ => None,
    }
}

fn field_u64(field: &Field) -> Option<u64> {
    field_i64(field).and_then(|v| u64::try_from(v).ok())
}

fn field_date(field: &Field) -> Option<NaiveDate> {
    match field {
        // Days since the unix epoch.
        Field::Date(days) => {
            NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(
                i64::from(*days),
            ))
        }
        Field::TimestampMillis(ms) => {
            chrono::DateTime::<chrono::Utc>::from_timestamp_millis(*ms).map(|dt| dt.date_naive())
        }
        Field::Str(s) => {
            let date_part = s.split(['T', ' ']).next()?;
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
        }
        _ => None,
    }
}

/// SQLite archive of per-game weather strings, one row per (date, home
/// team), partitioned by season for the fatal missing-year check.
pub struct WeatherDb {
    conn: Connection,
}

impl WeatherDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open weather db {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS weather (
                season INTEGER NOT NULL,
                date TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                weather TEXT NOT NULL,
                PRIMARY KEY (date, home_team, away_team)
            );
            CREATE INDEX IF NOT EXISTS idx_weather_season ON weather(season);
            "#,
        )
        .context("create weather schema")?;
        Ok(WeatherDb { conn })
    }

    pub fn upsert_records(&mut self, records: &[WeatherRecord]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin weather upsert")?;
        let mut written = 0usize;
        for rec in records {
            tx.execute(
                r#"
                INSERT INTO weather (season, date, home_team, away_team, weather)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(date, home_team, away_team) DO UPDATE SET
                    season = excluded.season,
                    weather = excluded.weather
                "#,
                params![
                    rec.date.year(),
                    rec.date.format("%Y-%m-%d").to_string(),
                    rec.home_team,
                    rec.away_team,
                    rec.weather,
                ],
            )
            .context("upsert weather row")?;
            written += 1;
        }
        tx.commit().context("commit weather upsert")?;
        Ok(written)
    }

    /// Load an archive covering exactly the requested seasons. A season with
    /// no rows at all is fatal: cleaning must not run against it.
    pub fn load_years(&self, years: &[i32]) -> Result<WeatherArchive> {
        let wanted: HashSet<i32> = years.iter().copied().collect();
        let mut records = Vec::new();

        let mut stmt = self
            .conn
            .prepare("SELECT date, home_team, away_team, weather FROM weather WHERE season = ?1")
            .context("prepare weather query")?;

        for year in &wanted {
            let rows = stmt
                .query_map(params![year], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .context("query weather rows")?;

            let mut count = 0usize;
            for row in rows {
                let (date, home_team, away_team, weather) = row.context("decode weather row")?;
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|err| anyhow!("bad date {date} in weather db: {err}"))?;
                records.push(WeatherRecord {
                    date,
                    home_team,
                    away_team,
                    weather,
                });
                count += 1;
            }
            if count == 0 {
                bail!("weather db has no rows for the {year} season");
            }
        }

        Ok(WeatherArchive::from_records(records))
    }
}
