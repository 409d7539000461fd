use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

const DATA_DIR_KEY: &str = "LIBRARY_DATA_DIR";
const MODE_KEY: &str = "LIBRARY_STORE_MODE";

/// Whether the store answers with its own judgement of freshness, or stands in for
/// the remote library itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    #[default]
    Cache,
    /// Pass-through: every stored row is authoritative and absence is `NotFound`.
    GroundTruth,
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreMode::Cache => "cache",
            StoreMode::GroundTruth => "ground_truth",
        })
    }
}

impl FromStr for StoreMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cache" => Ok(StoreMode::Cache),
            "ground_truth" => Ok(StoreMode::GroundTruth),
            other => Err(anyhow!("unknown store mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_directory: PathBuf,
    pub mode: StoreMode,
}

impl StoreConfig {
    /// Reads the `.env` file at `path`; the mode defaults to cache.
    pub fn load_from_env(path: &Path) -> Result<StoreConfig> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut data_directory = None;
        let mut mode = StoreMode::default();

        for line in reader.lines() {
            let line = line?;
            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    DATA_DIR_KEY => data_directory = Some(PathBuf::from(value.trim())),
                    MODE_KEY => mode = value.trim().parse()?,
                    _ => {}
                }
            }
        }

        let data_directory =
            data_directory.ok_or_else(|| anyhow!("{} missing from {}", DATA_DIR_KEY, path.display()))?;
        Ok(StoreConfig { data_directory, mode })
    }

    pub fn save_to_env(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path).context("Failed to create .env file")?;
        writeln!(file, "{}={}", DATA_DIR_KEY, self.data_directory.display())?;
        writeln!(file, "{}={}", MODE_KEY, self.mode)?;
        Ok(())
    }
}
