//! Entity store: durable state for students, links, and their join rows.
//!
//! All write operations are transactionally consistent within a single call:
//! a concurrent reader never observes a partial upsert. The FTS5 index over
//! normalized names is maintained in lockstep with the `students` table here,
//! never from anywhere else.

use sha2::{Digest, Sha256};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::models::{LinkRef, LinkSpec, Student};
use crate::normalize::normalize;

/// A join row flattened with its link, as returned by [`links_for`].
#[derive(Debug, Clone)]
pub struct AttachedLink {
    pub student_id: i64,
    pub link_id: i64,
    pub link: LinkRef,
}

/// Deterministic hash of a URL's raw bytes, used as the link uniqueness key.
pub fn url_fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insert or update a student, matching by `display_name`.
///
/// `search_name` is recomputed from `display_name` on every write. When more
/// than one row carries the same display name (a known fragility of the
/// name-as-key design), the most recently updated row wins and a warning is
/// logged; the duplicates are left for manual review rather than merged.
pub async fn upsert_student(
    pool: &SqlitePool,
    display_name: &str,
    identifier: &str,
) -> Result<i64, sqlx::Error> {
    let search_name = normalize(display_name);
    let now = chrono::Utc::now().timestamp();

    let matches: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM students WHERE display_name = ?1 ORDER BY updated_at DESC, id DESC",
    )
    .bind(display_name)
    .fetch_all(pool)
    .await?;

    if matches.len() > 1 {
        tracing::warn!(
            display_name,
            candidates = matches.len(),
            chosen = matches[0],
            "ambiguous upsert: multiple students share a display name, using most recent"
        );
    }

    let mut tx = pool.begin().await?;

    let student_id = match matches.first() {
        Some(&id) => {
            sqlx::query(
                "UPDATE students SET search_name = ?1, identifier = ?2, updated_at = ?3 WHERE id = ?4",
            )
            .bind(&search_name)
            .bind(identifier)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            id
        }
        None => {
            let result = sqlx::query(
                r#"
                INSERT INTO students (display_name, search_name, identifier, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                "#,
            )
            .bind(display_name)
            .bind(&search_name)
            .bind(identifier)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            result.last_insert_rowid()
        }
    };

    // Keep the FTS index in lockstep.
    sqlx::query("DELETE FROM students_fts WHERE student_id = ?1")
        .bind(student_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO students_fts (student_id, search_name) VALUES (?1, ?2)")
        .bind(student_id)
        .bind(&search_name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(student_id)
}

/// Insert a link, or resolve to the existing row when the URL fingerprint
/// already exists. Metadata of an existing row is refreshed from the incoming
/// record where it provides a value.
pub async fn upsert_link(pool: &SqlitePool, spec: &LinkSpec) -> Result<i64, sqlx::Error> {
    let fingerprint = url_fingerprint(&spec.url);
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO links (url, url_fingerprint, title, kind, origin_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(url_fingerprint) DO UPDATE SET
            title = COALESCE(excluded.title, links.title),
            kind = excluded.kind,
            origin_id = COALESCE(excluded.origin_id, links.origin_id)
        "#,
    )
    .bind(&spec.url)
    .bind(&fingerprint)
    .bind(&spec.title)
    .bind(&spec.kind)
    .bind(&spec.origin_id)
    .bind(now)
    .execute(pool)
    .await?;

    let link_id: i64 = sqlx::query_scalar("SELECT id FROM links WHERE url_fingerprint = ?1")
        .bind(&fingerprint)
        .fetch_one(pool)
        .await?;

    Ok(link_id)
}

/// Attach a link to a student at a given position. Idempotent on the
/// `(student, link, row)` triple; returns `true` when a new row was written.
#[allow(clippy::too_many_arguments)]
pub async fn attach_link(
    pool: &SqlitePool,
    student_id: i64,
    link_id: i64,
    sheet_name: &str,
    row_number: i64,
    cell_address: &str,
    snippet: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO link_students (student_id, link_id, sheet_name, row_number, cell_address, snippet)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(student_id, link_id, row_number) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(link_id)
    .bind(sheet_name)
    .bind(row_number)
    .bind(cell_address)
    .bind(snippet)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Exact/prefix match against the identifier column. Ordered by identifier
/// ascending, ties broken by id ascending.
pub async fn find_by_identifier_prefix(
    pool: &SqlitePool,
    prefix: &str,
    limit: i64,
) -> Result<Vec<Student>, sqlx::Error> {
    // The classifier guarantees `prefix` is pure digits, so the LIKE pattern
    // cannot contain wildcards.
    let rows = sqlx::query(
        r#"
        SELECT id, display_name, search_name, identifier
        FROM students
        WHERE identifier <> '' AND identifier LIKE ?1 || '%'
        ORDER BY identifier ASC, id ASC
        LIMIT ?2
        "#,
    )
    .bind(prefix)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

/// Build an FTS5 MATCH expression from a normalized query: each token quoted
/// so user input can never inject FTS syntax. Tokens are ANDed.
pub fn fts_match_expr(normalized_query: &str) -> String {
    normalized_query
        .split_whitespace()
        .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tier-1 full-text search over normalized names. Returns `(student, score)`
/// pairs ordered by relevance descending, id ascending on ties. Whole-token
/// matching: fragments shorter than an indexed token yield no rows here;
/// that is accepted index behavior, covered by the substring fallback.
pub async fn full_text_search(
    pool: &SqlitePool,
    normalized_query: &str,
    limit: i64,
) -> Result<Vec<(Student, f64)>, sqlx::Error> {
    let match_expr = fts_match_expr(normalized_query);
    if match_expr.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT s.id, s.display_name, s.search_name, s.identifier, m.score
        FROM (
            SELECT student_id, -rank AS score
            FROM students_fts
            WHERE students_fts MATCH ?1
        ) m
        JOIN students s ON s.id = m.student_id
        ORDER BY m.score DESC, s.id ASC
        LIMIT ?2
        "#,
    )
    .bind(&match_expr)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (student_from_row(row), row.get::<f64, _>("score")))
        .collect())
}

/// Tier-2 substring fallback over normalized names. Unscored; ordered by id
/// ascending for determinism.
pub async fn substring_search(
    pool: &SqlitePool,
    normalized_query: &str,
    limit: i64,
) -> Result<Vec<Student>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, display_name, search_name, identifier
        FROM students
        WHERE instr(search_name, ?1) > 0
        ORDER BY id ASC
        LIMIT ?2
        "#,
    )
    .bind(normalized_query)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

/// Fetch every join row (with its link) for a set of students in a single
/// round trip. Returned unordered; the engine owns grouping and sorting.
pub async fn links_for(
    pool: &SqlitePool,
    student_ids: &[i64],
) -> Result<Vec<AttachedLink>, sqlx::Error> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT ls.student_id, l.id AS link_id, l.url, l.title, l.kind, l.origin_id,
               ls.sheet_name, ls.row_number, ls.cell_address, ls.snippet
        FROM link_students ls
        JOIN links l ON l.id = ls.link_id
        WHERE ls.student_id IN (
        "#,
    );
    let mut sep = qb.separated(", ");
    for id in student_ids {
        sep.push_bind(*id);
    }
    qb.push(")");

    let rows = qb.build().fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| AttachedLink {
            student_id: row.get("student_id"),
            link_id: row.get("link_id"),
            link: LinkRef {
                url: row.get("url"),
                title: row.get("title"),
                kind: row.get("kind"),
                origin_id: row.get("origin_id"),
                sheet_name: row.get("sheet_name"),
                row_number: row.get("row_number"),
                cell_address: row.get("cell_address"),
                snippet: row.get("snippet"),
            },
        })
        .collect())
}

/// Wipe all indexed data (admin clear / full resync). One transaction.
pub async fn clear_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM link_students")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM links").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM students").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM students_fts")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Row counts across the index, reported by stats surfaces.
#[derive(Debug, Clone, Copy)]
pub struct Counts {
    pub students: i64,
    pub links: i64,
    pub attachments: i64,
    pub queries: i64,
}

pub async fn counts(pool: &SqlitePool) -> Result<Counts, sqlx::Error> {
    let students: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
        .fetch_one(pool)
        .await?;
    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
        .fetch_one(pool)
        .await?;
    let attachments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM link_students")
        .fetch_one(pool)
        .await?;
    let queries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_queries")
        .fetch_one(pool)
        .await?;
    Ok(Counts {
        students,
        links,
        attachments,
        queries,
    })
}

/// Current sync generation. Bumped after every successful batch write; the
/// result cache refuses entries from older generations.
pub async fn sync_generation(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT generation FROM sync_meta WHERE id = 1")
        .fetch_one(pool)
        .await
}

pub async fn bump_sync_generation(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE sync_meta SET generation = generation + 1, last_synced_at = ?1 WHERE id = 1")
        .bind(now)
        .execute(pool)
        .await?;
    sync_generation(pool).await
}

/// Record a query for analytics. Callers treat failures as non-fatal.
pub async fn log_query(
    pool: &SqlitePool,
    query: &str,
    normalized_query: &str,
    result_count: i64,
    elapsed_ms: f64,
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO search_queries (query, normalized_query, result_count, elapsed_ms, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(query)
    .bind(normalized_query)
    .bind(result_count)
    .bind(elapsed_ms)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

fn student_from_row(row: &sqlx::sqlite::SqliteRow) -> Student {
    Student {
        id: row.get("id"),
        display_name: row.get("display_name"),
        search_name: row.get("search_name"),
        identifier: row.get("identifier"),
    }
}
