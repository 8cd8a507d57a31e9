use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// How long a connection waits on a locked database before giving up,
    /// in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_pool_size() -> u32 {
    5
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Result cap applied when the caller does not ask for one.
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    /// Hard ceiling on the result cap; larger requests are clamped.
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    /// Queries shorter than this (in normalized characters) return an empty
    /// result set without touching the store.
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,
    /// Deadline for a whole search call, in milliseconds. Absent = no deadline.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// TTL for the result cache, in seconds. 0 disables caching.
    #[serde(default)]
    pub cache_ttl_secs: u64,
}

fn default_limit() -> i64 {
    50
}
fn default_max_limit() -> i64 {
    200
}
fn default_min_query_chars() -> usize {
    2
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            min_query_chars: default_min_query_chars(),
            timeout_ms: None,
            cache_ttl_secs: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.pool_size < 1 {
        anyhow::bail!("db.pool_size must be >= 1");
    }

    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    if config.search.max_limit < config.search.default_limit {
        anyhow::bail!("search.max_limit must be >= search.default_limit");
    }

    if config.search.min_query_chars < 1 {
        anyhow::bail!("search.min_query_chars must be >= 1");
    }

    if config.search.timeout_ms == Some(0) {
        anyhow::bail!("search.timeout_ms must be > 0 when set");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dssv.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_uses_search_defaults() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/dssv.sqlite"

[server]
bind = "127.0.0.1:7400"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.db.pool_size, 5);
        assert_eq!(cfg.db.busy_timeout_ms, 5000);
        assert_eq!(cfg.search.default_limit, 50);
        assert_eq!(cfg.search.max_limit, 200);
        assert_eq!(cfg.search.min_query_chars, 2);
        assert_eq!(cfg.search.timeout_ms, None);
        assert_eq!(cfg.search.cache_ttl_secs, 0);
    }

    #[test]
    fn test_rejects_zero_pool_size() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/dssv.sqlite"
pool_size = 0

[server]
bind = "127.0.0.1:7400"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_max_limit_below_default() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/dssv.sqlite"

[search]
default_limit = 100
max_limit = 10

[server]
bind = "127.0.0.1:7400"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/dssv.sqlite"

[search]
timeout_ms = 0

[server]
bind = "127.0.0.1:7400"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
