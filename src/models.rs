//! Core data models.
//!
//! These types represent the student, link, and join rows held in SQLite,
//! plus the sync batch records the ingest adapter feeds in.

use serde::{Deserialize, Serialize};

/// A student (entity) row as stored.
#[derive(Debug, Clone)]
pub struct Student {
    pub id: i64,
    /// Original-case, accented name. Never empty.
    pub display_name: String,
    /// Normalized form of `display_name`, used only for matching.
    pub search_name: String,
    /// External code (student ID). Empty string when unknown.
    pub identifier: String,
}

/// A link attached to a student, flattened with its positional metadata
/// from the join table. This is the shape search results carry.
#[derive(Debug, Clone, Serialize)]
pub struct LinkRef {
    pub url: String,
    pub title: Option<String>,
    pub kind: String,
    pub origin_id: Option<String>,
    pub sheet_name: String,
    pub row_number: i64,
    pub cell_address: String,
    pub snippet: String,
}

/// One row record in a sync batch, as produced by the spreadsheet scraper.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRow {
    pub display_name: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub sheet_name: String,
    #[serde(default)]
    pub row_number: i64,
    #[serde(default)]
    pub cell_address: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

/// A link discovered near a row during scraping.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkSpec {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_link_kind")]
    pub kind: String,
    #[serde(default)]
    pub origin_id: Option<String>,
}

fn default_link_kind() -> String {
    "sheet".to_string()
}
