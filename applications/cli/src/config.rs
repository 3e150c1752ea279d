/// Trove configuration
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use trove_indexer::{CacheStoreConfig, WalkerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TroveConfig {
    #[serde(default = "default_cache")]
    pub cache: CacheSettings,

    #[serde(default = "default_scan")]
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default = "default_directories_file")]
    pub directories_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanSettings {
    /// Roots scanned in addition to those in the directories file
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl TroveConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `trove.toml` in the working
    /// directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("trove.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables, e.g. TROVE_SCAN__BATCH_SIZE
        settings = settings.add_source(
            config::Environment::with_prefix("TROVE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scan.roots")
                .try_parsing(true),
        );

        Ok(settings.build()?.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scan.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "scan.batch_size must be at least 1".to_string(),
            ));
        }

        if self.cache.snapshot_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "cache.snapshot_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn store_config(&self) -> CacheStoreConfig {
        CacheStoreConfig {
            snapshot_path: self.cache.snapshot_path.clone(),
            walker: WalkerConfig {
                batch_size: self.scan.batch_size,
                progress_interval: Duration::from_millis(self.scan.progress_interval_ms),
                ..WalkerConfig::default()
            },
        }
    }
}

impl Default for TroveConfig {
    fn default() -> Self {
        Self {
            cache: default_cache(),
            scan: default_scan(),
        }
    }
}

// Default values
fn default_cache() -> CacheSettings {
    CacheSettings {
        snapshot_path: default_snapshot_path(),
        directories_file: default_directories_file(),
    }
}

fn default_scan() -> ScanSettings {
    ScanSettings {
        roots: Vec::new(),
        batch_size: default_batch_size(),
        progress_interval_ms: default_progress_interval_ms(),
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("trove-cache.json")
}

fn default_directories_file() -> PathBuf {
    PathBuf::from("trove-directories.txt")
}

fn default_batch_size() -> usize {
    trove_indexer::batch::DEFAULT_BATCH_SIZE
}

fn default_progress_interval_ms() -> u64 {
    100
}
