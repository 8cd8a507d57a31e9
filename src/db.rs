use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Open the SQLite pool described by `[db]` config: WAL journal mode,
/// foreign keys on, pool size and busy timeout from config. The database
/// file and its parent directory are created on first connect.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db = &config.db;

    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db.path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(db.busy_timeout_ms))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(db.pool_size)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, SearchConfig, ServerConfig};

    #[tokio::test]
    async fn test_connect_creates_nested_path_and_serves_queries() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = Config {
            db: DbConfig {
                path: tmp.path().join("nested/dir/dssv.sqlite"),
                pool_size: 2,
                busy_timeout_ms: 100,
            },
            search: SearchConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        };

        let pool = connect(&cfg).await.unwrap();
        assert!(cfg.db.path.exists());

        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
        pool.close().await;
    }
}
