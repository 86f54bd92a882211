use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDate};

const DEFAULT_DB_PATH: &str = "hockey-stats.db";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_FETCH_RETRIES: u32 = 3;
const DEFAULT_SNAPSHOT_NAME: &str = "hockey-stats-db";

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    /// Additional attempts after the first failed fetch.
    pub fetch_retries: u32,
    pub reference_season: Option<i32>,
    pub snapshot_listing_url: Option<String>,
    pub snapshot_token: Option<String>,
    pub snapshot_name: String,
}

impl Settings {
    /// Reads settings from the environment, after loading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            db_path: env_string("HOCKEY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            data_dir: env_string("HOCKEY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            fetch_retries: env_string("HOCKEY_FETCH_RETRIES")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(DEFAULT_FETCH_RETRIES),
            reference_season: env_string("HOCKEY_REFERENCE_SEASON").and_then(|v| v.parse().ok()),
            snapshot_listing_url: env_string("HOCKEY_SNAPSHOT_LISTING_URL"),
            snapshot_token: env_string("HOCKEY_SNAPSHOT_TOKEN"),
            snapshot_name: env_string("HOCKEY_SNAPSHOT_NAME")
                .unwrap_or_else(|| DEFAULT_SNAPSHOT_NAME.to_string()),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Seasons are named for the year they start; a season is current from October.
pub fn season_for(date: NaiveDate) -> i32 {
    if date.month() < 10 {
        date.year() - 1
    } else {
        date.year()
    }
}

pub fn current_season() -> i32 {
    season_for(Local::now().date_naive())
}
