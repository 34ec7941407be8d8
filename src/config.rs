//! Configuration Module
//! Command-line flags layered over an optional JSON settings file.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DATA_PATH: &str = "data/Motor_Vehicle_Collisions.csv";
pub const DEFAULT_ROW_LIMIT: usize = 100_000;
/// Highest injured-persons count observed in the dataset.
pub const MAX_INJURY_THRESHOLD: u32 = 19;
pub const MAX_HOUR: u32 = 23;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Row limit must be a positive integer")]
    InvalidRowLimit,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Motor Vehicle Collisions dashboard", long_about = None)]
pub struct Cli {
    /// Collision CSV export to explore
    #[arg(long, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Number of rows to read from the CSV
    #[arg(long, value_name = "N")]
    pub rows: Option<usize>,

    /// JSON settings file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Dashboard settings resolved at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub row_limit: usize,
    pub initial_threshold: u32,
    pub initial_hour: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            row_limit: DEFAULT_ROW_LIMIT,
            initial_threshold: 0,
            initial_hour: 0,
        }
    }
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File settings (if any) with CLI flags taking precedence.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(data) = &cli.data {
            config.data_path = data.clone();
        }
        if let Some(rows) = cli.rows {
            config.row_limit = rows;
        }
        config.validate()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        if self.row_limit == 0 {
            return Err(ConfigError::InvalidRowLimit);
        }
        self.initial_threshold = self.initial_threshold.min(MAX_INJURY_THRESHOLD);
        self.initial_hour = self.initial_hour.min(MAX_HOUR);
        Ok(self)
    }
}
