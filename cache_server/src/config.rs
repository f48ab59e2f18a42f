use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use common::err::CacheError;
use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded once at startup from an optional TOML
/// file (§4.12). No environment-variable overlay and no schema-spec
/// mini-language: a plain struct stands in for both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub listen: ListenConfig,

    #[serde(default = "default_refresh_period_secs")]
    pub default_refresh_period_secs: u64,

    #[serde(default)]
    pub strip_null: bool,

    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub unix_socket_path: Option<String>,
    pub tcp_host: Option<String>,
    #[serde(default)]
    pub tcp_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub id: u8,
    pub name: String,
    pub refresh_period_secs: Option<u64>,
    pub indexes: Vec<IndexConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub id: u8,
    pub column: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl TableConfig {
    pub fn refresh_period(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.refresh_period_secs.unwrap_or(default_secs))
    }
}

fn default_refresh_period_secs() -> u64 {
    5
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig { unix_socket_path: None, tcp_host: Some("127.0.0.1".to_string()), tcp_port: 7878 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            listen: ListenConfig::default(),
            default_refresh_period_secs: default_refresh_period_secs(),
            strip_null: true,
            tables: Vec::new(),
        }
    }
}

/// Reads and parses a TOML config file at `path`.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<CacheConfig, CacheError> {
    let mut file = File::open(path.as_ref())?;
    let mut s = String::new();
    file.read_to_string(&mut s)?;
    toml::from_str(&s).map_err(|e| CacheError::Config(e.to_string()))
}
