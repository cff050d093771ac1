use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::columns::ColumnSet;

// Constants
pub const DEFAULT_SOURCE_FILE: &str = "data/customers.xlsx";
pub const DEFAULT_SNAPSHOT_FILE: &str = "data/customers.bin.gz";
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PORT: u16 = 5000;

/// Where the customer cache reads from and persists to.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Spreadsheet of historical purchases.
    pub source_path: PathBuf,
    /// Serialized index used to skip the spreadsheet read on cold start.
    pub snapshot_path: PathBuf,
    /// Upper bound on one spreadsheet read. `None` waits indefinitely.
    pub load_timeout: Option<Duration>,
    pub columns: ColumnSet,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            source_path: PathBuf::from(DEFAULT_SOURCE_FILE),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
            load_timeout: Some(Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS)),
            columns: ColumnSet::default(),
        }
    }
}

impl CacheConfig {
    pub fn new(source_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        CacheConfig {
            source_path: source_path.into(),
            snapshot_path: snapshot_path.into(),
            ..CacheConfig::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from a variable lookup.
    ///
    /// - `CLAIMS_SOURCE_FILE`: spreadsheet path
    /// - `CLAIMS_SNAPSHOT_FILE`: snapshot path
    /// - `CLAIMS_LOAD_TIMEOUT_SECS`: read timeout, `0` disables it
    ///
    /// Unparseable values fall back to the defaults with a warning.
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CacheConfig::default();

        if let Some(path) = var("CLAIMS_SOURCE_FILE").filter(|v| !v.trim().is_empty()) {
            config.source_path = PathBuf::from(path);
        }
        if let Some(path) = var("CLAIMS_SNAPSHOT_FILE").filter(|v| !v.trim().is_empty()) {
            config.snapshot_path = PathBuf::from(path);
        }
        if let Some(raw) = var("CLAIMS_LOAD_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.load_timeout = None,
                Ok(secs) => config.load_timeout = Some(Duration::from_secs(secs)),
                Err(_) => log::warn!(
                    "ignoring CLAIMS_LOAD_TIMEOUT_SECS={:?}, using {}s",
                    raw,
                    DEFAULT_LOAD_TIMEOUT_SECS
                ),
            }
        }

        config
    }
}

/// Listen address of the web front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Reads `HOST` and `PORT`; either falls back to its default when unset
    /// or malformed.
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut addr = ServerConfig::default().addr;

        if let Some(host) = var("HOST") {
            match host.trim().parse::<IpAddr>() {
                Ok(ip) => addr.set_ip(ip),
                Err(_) => log::warn!("ignoring HOST={:?}", host),
            }
        }
        if let Some(port) = var("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => addr.set_port(port),
                Err(_) => log::warn!("ignoring PORT={:?}", port),
            }
        }

        ServerConfig { addr }
    }
}
