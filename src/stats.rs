//! Index statistics.
//!
//! Quick summary of what's indexed: student, link, and attachment counts,
//! recent query volume, and the last sync time. Used by `dssv stats` to give
//! confidence that syncs are landing.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::store;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let counts = store::counts(&pool).await?;

    let meta = sqlx::query("SELECT generation, last_synced_at FROM sync_meta WHERE id = 1")
        .fetch_one(&pool)
        .await?;
    let generation: i64 = meta.get("generation");
    let last_synced_at: i64 = meta.get("last_synced_at");

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("dssv — Index Stats");
    println!("==================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Students:     {}", counts.students);
    println!("  Links:        {}", counts.links);
    println!("  Attachments:  {}", counts.attachments);
    println!("  Queries seen: {}", counts.queries);
    println!();
    println!("  Sync generation: {}", generation);
    println!(
        "  Last sync:       {}",
        if last_synced_at == 0 {
            "never".to_string()
        } else {
            format_ts_iso(last_synced_at)
        }
    );
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
