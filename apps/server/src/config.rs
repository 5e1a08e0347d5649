//! Server configuration.
//!
//! Read from the TOML file named by `BIGFILE_CONFIG`, or
//! `bigfile-server.toml` in the working directory. Every key is optional.

use std::path::{Path, PathBuf};

use bigfile_protocol::constants::{DEFAULT_MAX_CHUNK_BYTES, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "BIGFILE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "bigfile-server.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Root directory for chunks and merged files.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Largest accepted chunk, in bytes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,

    /// Delete a file's chunks after it has been merged.
    #[serde(default)]
    pub remove_chunks_after_merge: bool,
}

fn default_listen_addr() -> String {
    format!("127.0.0.1:{DEFAULT_PORT}")
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("uploaded_files")
}

fn default_max_chunk_bytes() -> usize {
    DEFAULT_MAX_CHUNK_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            storage_root: default_storage_root(),
            max_chunk_bytes: default_max_chunk_bytes(),
            remove_chunks_after_merge: false,
        }
    }
}

impl ServerConfig {
    /// Loads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Config file location.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
