//! User configuration loaded from `config.toml`
//!
//! Lookup order for the file is `$TASKLOG_CONFIG`, then
//! `<config_dir>/tasklog/config.toml`. A missing file yields the defaults.

pub mod repository;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::ingest::orchestrator::DEFAULT_MAX_FILE_SIZE;
use crate::ingest::{
    DEFAULT_SHEET_NAME, DateParser, IngestionPolicy, policy::DEFAULT_DAILY_UPLOAD_LIMIT,
};

const APP_DIR: &str = "tasklog";
const CONFIG_ENV: &str = "TASKLOG_CONFIG";
const DATABASE_ENV: &str = "TASKLOG_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file; `$TASKLOG_DB` takes precedence
    pub database_path: Option<PathBuf>,
    /// User id acting when `--as` is not given
    pub default_user: Option<String>,
    pub daily_upload_limit: usize,
    /// Sheet read first when a workbook has several
    pub default_sheet: String,
    /// Largest workbook accepted for upload, in bytes
    pub max_file_size: u64,
    /// IANA zone used to interpret dates typed into report cells
    ///
    /// `DD.MM.YYYY` cells are stored as noon in this zone. Zones where noon
    /// lands on another UTC day (UTC+13 and beyond, including New Zealand
    /// summer time) are rejected.
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: None,
            default_user: None,
            daily_upload_limit: DEFAULT_DAILY_UPLOAD_LIMIT,
            default_sheet: DEFAULT_SHEET_NAME.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            timezone: "UTC".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => match dirs::config_dir() {
                Some(dir) => dir.join(APP_DIR).join("config.toml"),
                None => {
                    log::warn!("No config directory found, using default configuration");
                    return Ok(Config::default());
                }
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.time_zone()?;
        Ok(config)
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(DATABASE_ENV) {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data_dir.join(APP_DIR).join("tasklog.db"))
    }

    pub fn time_zone(&self) -> Result<Tz> {
        let tz = self
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))?;
        if !DateParser::new(tz).keeps_calendar_day() {
            anyhow::bail!(
                "Timezone '{}' is too far from UTC: noon there falls on a different UTC day",
                self.timezone
            );
        }
        Ok(tz)
    }

    pub fn policy(&self) -> IngestionPolicy {
        IngestionPolicy::new(self.daily_upload_limit)
    }
}
