//! Server configuration from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::storage::StorageConfig;

/// Default listening port
pub const DEFAULT_PORT: u16 = 3000;

/// Default sled database path
pub const DEFAULT_STORAGE_PATH: &str = "./data/calltrack.sled";

/// Default request body limit (16 MiB); full-table posts can be large
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub storage: StorageConfig,
    /// Directory served for any path that is not an API route
    pub static_dir: Option<PathBuf>,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            storage: StorageConfig::new(DEFAULT_STORAGE_PATH),
            static_dir: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Read `PORT`, `STORAGE_PATH`, `STATIC_DIR`, `MAX_BODY_BYTES`,
    /// `SLED_CACHE_BYTES` and `SLED_FLUSH_MS`. Invalid values fall back to the
    /// defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let path = lookup("STORAGE_PATH")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string());
        let storage = StorageConfig::new(path)
            .with_cache_size(parse_or(&lookup, "SLED_CACHE_BYTES", defaults.storage.cache_size))
            .with_flush_interval(parse_or(
                &lookup,
                "SLED_FLUSH_MS",
                defaults.storage.flush_interval_ms,
            ));

        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            storage,
            static_dir: lookup("STATIC_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", defaults.max_body_bytes),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {}={:?}, using {}", name, raw, default);
            default
        }),
    }
}
