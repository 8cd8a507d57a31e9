//! Sync batch ingestion.
//!
//! Applies a batch of scraped rows to the store: one `upsert_student` per
//! row, then `upsert_link` + `attach_link` per discovered link. Supports a
//! clear-first mode for full resyncs. The scraper itself lives outside this
//! crate; this is only its write contract.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::models::SyncRow;
use crate::store;

/// Counters reported after a batch write.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub rows_applied: u64,
    pub rows_skipped: u64,
    pub links_attached: u64,
    pub generation: i64,
}

/// CLI entry point: read a JSON batch file and apply it.
pub async fn run_sync(config: &Config, file: &Path, clear: bool, dry_run: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read batch file: {}", file.display()))?;
    let rows: Vec<SyncRow> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse batch file: {}", file.display()))?;

    if dry_run {
        let link_count: usize = rows.iter().map(|r| r.links.len()).sum();
        println!("sync {} (dry-run)", file.display());
        println!("  rows found: {}", rows.len());
        println!("  links found: {}", link_count);
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let summary = apply_batch(&pool, &rows, clear).await?;

    println!("sync {}", file.display());
    println!("  rows applied: {}", summary.rows_applied);
    println!("  rows skipped: {}", summary.rows_skipped);
    println!("  links attached: {}", summary.links_attached);
    println!("  generation: {}", summary.generation);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Apply a batch of rows. When `clear` is set, all existing data is wiped
/// first (full resync). Rows with an empty display name are skipped; the
/// store refuses nameless students.
pub async fn apply_batch(pool: &SqlitePool, rows: &[SyncRow], clear: bool) -> Result<BatchSummary> {
    if clear {
        store::clear_all(pool).await?;
        tracing::info!("cleared existing data before resync");
    }

    let mut summary = BatchSummary::default();

    for row in rows {
        let display_name = row.display_name.trim();
        if display_name.is_empty() {
            summary.rows_skipped += 1;
            tracing::warn!(
                sheet = %row.sheet_name,
                row = row.row_number,
                "skipping row with empty display name"
            );
            continue;
        }

        let student_id = store::upsert_student(pool, display_name, row.identifier.trim()).await?;

        for spec in &row.links {
            let link_id = store::upsert_link(pool, spec).await?;
            let inserted = store::attach_link(
                pool,
                student_id,
                link_id,
                &row.sheet_name,
                row.row_number,
                &row.cell_address,
                &row.snippet,
            )
            .await?;
            if inserted {
                summary.links_attached += 1;
            }
        }

        summary.rows_applied += 1;
    }

    summary.generation = store::bump_sync_generation(pool).await?;
    tracing::info!(
        rows = summary.rows_applied,
        skipped = summary.rows_skipped,
        links = summary.links_attached,
        generation = summary.generation,
        "sync batch applied"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkSpec;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn row(name: &str, identifier: &str, url: Option<&str>) -> SyncRow {
        SyncRow {
            display_name: name.to_string(),
            identifier: identifier.to_string(),
            sheet_name: "S1".to_string(),
            row_number: 5,
            cell_address: "A5".to_string(),
            snippet: format!("{} - {}", name, identifier),
            links: url
                .map(|u| {
                    vec![LinkSpec {
                        url: u.to_string(),
                        title: None,
                        kind: "sheet".to_string(),
                        origin_id: None,
                    }]
                })
                .unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_apply_batch_writes_rows_and_links() {
        let pool = test_pool().await;
        let rows = vec![
            row("Nguyễn Văn A", "2012345", Some("https://x")),
            row("Trần Thị B", "2054321", None),
        ];

        let summary = apply_batch(&pool, &rows, false).await.unwrap();
        assert_eq!(summary.rows_applied, 2);
        assert_eq!(summary.rows_skipped, 0);
        assert_eq!(summary.links_attached, 1);
        assert_eq!(summary.generation, 1);
    }

    #[tokio::test]
    async fn test_reapplying_batch_creates_no_duplicates() {
        let pool = test_pool().await;
        let rows = vec![row("Nguyễn Văn A", "2012345", Some("https://x"))];

        apply_batch(&pool, &rows, false).await.unwrap();
        let second = apply_batch(&pool, &rows, false).await.unwrap();

        // Same (student, link, row) triple: attach is a no-op the second time.
        assert_eq!(second.links_attached, 0);

        let students: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&pool)
            .await
            .unwrap();
        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(students, 1);
        assert_eq!(links, 1);
    }

    #[tokio::test]
    async fn test_clear_mode_replaces_previous_data() {
        let pool = test_pool().await;
        apply_batch(&pool, &[row("Nguyễn Văn A", "", None)], false)
            .await
            .unwrap();
        apply_batch(&pool, &[row("Trần Thị B", "", None)], true)
            .await
            .unwrap();

        let names: Vec<String> = sqlx::query_scalar("SELECT display_name FROM students")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(names, vec!["Trần Thị B".to_string()]);
    }

    #[tokio::test]
    async fn test_nameless_rows_are_skipped() {
        let pool = test_pool().await;
        let rows = vec![row("   ", "2012345", None), row("Nguyễn Văn A", "", None)];

        let summary = apply_batch(&pool, &rows, false).await.unwrap();
        assert_eq!(summary.rows_applied, 1);
        assert_eq!(summary.rows_skipped, 1);
    }
}
