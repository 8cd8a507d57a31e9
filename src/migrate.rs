use anyhow::Result;
use sqlx::SqlitePool;

/// Create all tables and indexes. Idempotent; safe to run on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Students table. search_name is always derived from display_name by the
    // store; it is never written independently.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            display_name TEXT NOT NULL CHECK (length(display_name) > 0),
            search_name TEXT NOT NULL,
            identifier TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Links table. url_fingerprint deduplicates by URL regardless of
    // insertion order.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            url_fingerprint TEXT NOT NULL UNIQUE,
            title TEXT,
            kind TEXT NOT NULL DEFAULT 'sheet',
            origin_id TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Join table. The same student may be attached to the same link from
    // many distinct rows, but never from the identical (student, link, row)
    // triple twice.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS link_students (
            student_id INTEGER NOT NULL,
            link_id INTEGER NOT NULL,
            sheet_name TEXT NOT NULL DEFAULT '',
            row_number INTEGER NOT NULL,
            cell_address TEXT NOT NULL DEFAULT '',
            snippet TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (student_id, link_id, row_number),
            FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY (link_id) REFERENCES links(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Best-effort search analytics log.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_queries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            normalized_query TEXT NOT NULL,
            result_count INTEGER NOT NULL,
            elapsed_ms REAL NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sync generation counter, bumped after every successful batch write.
    // The result cache keys its entries on this value.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            generation INTEGER NOT NULL,
            last_synced_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("INSERT OR IGNORE INTO sync_meta (id, generation, last_synced_at) VALUES (1, 0, 0)")
        .execute(pool)
        .await?;

    // Create FTS5 virtual table over students' normalized names.
    // FTS5 CREATE is not idempotent natively, so we check first.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='students_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE students_fts USING fts5(
                student_id UNINDEXED,
                search_name
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_students_identifier ON students(identifier)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_students_display_name ON students(display_name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_students_search_name ON students(search_name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_link_students_link ON link_students(link_id)")
        .execute(pool)
        .await?;

    Ok(())
}
