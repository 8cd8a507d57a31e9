//! # dssv
//!
//! Diacritic-aware student and link search over spreadsheet-sourced rows.
//!
//! Rows scraped from spreadsheet-like sources are indexed into SQLite and
//! served as keyword/full-text search over names, student identifiers, and
//! associated links. Vietnamese names are folded to a diacritic-free
//! comparison form so that searching `"nguyen"` matches `"Nguyễn Văn A"`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Scraper   │──▶│ Sync batches │──▶│  SQLite    │
//! │ (external) │   │  (ingest)    │   │ FTS5+joins │
//! └────────────┘   └──────────────┘   └─────┬─────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │  (dssv)  │       │ (axum)   │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! A search runs through a fixed pipeline: normalize → classify → tiered
//! retrieval (identifier prefix, or FTS5 then substring fallback) → batched
//! link aggregation → ranked, grouped results with timing metadata.
//!
//! ## Quick Start
//!
//! ```bash
//! dssv init                         # create database
//! dssv sync rows.json --clear       # full resync from a scraped batch
//! dssv search "nguyen van"          # name search
//! dssv search 2012345               # identifier search
//! dssv serve                        # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Vietnamese diacritic folding |
//! | [`query`] | Identifier-vs-name query classification |
//! | [`store`] | Entity store (students, links, join rows, FTS index) |
//! | [`search`] | Tiered search engine and result aggregation |
//! | [`ingest`] | Sync batch write contract |
//! | [`server`] | HTTP search API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod query;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
