//! A2 — configuration loading.
//!
//! The pool itself only needs a size and a libpq keyword/value connection
//! map (spec.md §6); this module loads both from a TOML file the way the
//! teacher loads its (much larger) pooler config
//! (`examples/ozontech-pg_doorman/src/config/mod.rs`), with the same
//! `serde` + `toml` combination.

use std::collections::HashMap;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// `[pool]` section: how many server connections to open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSection {
    pub size: usize,
}

/// Top-level configuration file shape.
///
/// ```toml
/// [pool]
/// size = 10
///
/// [connection]
/// host = "localhost"
/// hostaddr = "127.0.0.1"
/// dbname = "sample"
/// user = "sample"
/// password = "123"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pool: PoolSection,
    #[serde(default)]
    pub connection: HashMap<String, String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
