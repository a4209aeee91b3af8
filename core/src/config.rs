//! Configuration loaded from a TOML file:
//!
//! ```toml
//! [store]
//! path = "store"
//! chunk_size = 261120
//!
//! [geo_index]
//! resolution = 9
//! max_rings = 64
//!
//! [places]
//! file = "places.toml"
//! max_distance = 100.0
//! ```
//!
//! All keys are optional. The environment variable `PHOTOGRID_STORE`
//! overrides `store.path`.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use h3o::Resolution;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    geo_index::{GeoIndex, DEFAULT_MAX_RINGS, DEFAULT_RESOLUTION},
    storage::{rocksdb::RocksDBStore, DEFAULT_CHUNK_SIZE},
    StorageError,
};

/// Name of the configuration file that is looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "photogrid.toml";

/// Environment variable overriding the store path
pub const STORE_ENV: &str = "PHOTOGRID_STORE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read configuration file `{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("configuration malformed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory of the RocksDB store
    pub path: PathBuf,

    /// Size of chunks of newly stored payloads in bytes
    pub chunk_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("store"),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeoIndexConfig {
    /// H3 resolution of the grid cells places are bucketed into (0-15)
    pub resolution: u8,

    /// Maximum number of grid rings visited by a query before the index
    /// falls back to a linear scan
    pub max_rings: u32,
}

impl Default for GeoIndexConfig {
    fn default() -> Self {
        Self {
            resolution: u8::from(DEFAULT_RESOLUTION),
            max_rings: DEFAULT_MAX_RINGS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacesConfig {
    /// TOML file listing known places
    pub file: Option<PathBuf>,

    /// Default radius in meters when looking for the nearest place
    pub max_distance: f64,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_distance: 100.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub geo_index: GeoIndexConfig,
    pub places: PlacesConfig,
}

impl Config {
    /// Parses and validates a configuration
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Loads the configuration from the given file. Without a file,
    /// [`DEFAULT_CONFIG_FILE`] is used if it exists and the defaults
    /// otherwise. Environment variables are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        Ok(config.with_store_override(env::var_os(STORE_ENV).map(PathBuf::from)))
    }

    pub fn with_store_override(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.store.path = path;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.chunk_size == 0 || self.store.chunk_size > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "store.chunk_size must be between 1 and {}",
                u32::MAX
            )));
        }
        self.geo_index.resolution()?;
        if !self.places.max_distance.is_finite() || self.places.max_distance < 0.0 {
            return Err(ConfigError::Invalid(
                "places.max_distance must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Opens the store at the configured location
    pub fn open_store(&self) -> Result<RocksDBStore, StorageError> {
        RocksDBStore::new(&self.store.path.to_string_lossy(), self.store.chunk_size)
    }
}

impl GeoIndexConfig {
    pub fn resolution(&self) -> Result<Resolution, ConfigError> {
        Resolution::try_from(self.resolution).map_err(|_| {
            ConfigError::Invalid(format!(
                "geo_index.resolution must be between 0 and 15 but was {}",
                self.resolution
            ))
        })
    }

    /// Creates an empty index with the configured parameters
    pub fn build(&self) -> Result<GeoIndex, ConfigError> {
        Ok(GeoIndex::new(self.resolution()?, self.max_rings))
    }
}
