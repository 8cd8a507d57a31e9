//! # dssv CLI
//!
//! The `dssv` binary is the primary interface for the student/link search
//! index. It provides commands for database initialization, batch ingestion,
//! search, index statistics, and the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! dssv --config ./dssv.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dssv init` | Create the SQLite database and run schema migrations |
//! | `dssv sync <file.json>` | Apply a scraped row batch to the index |
//! | `dssv search "<query>"` | Search students by name or identifier |
//! | `dssv stats` | Show index counts and last sync time |
//! | `dssv serve` | Start the HTTP search API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dssv::search::{SearchEngine, SearchOptions, SearchResponse};
use dssv::{config, db, ingest, migrate, server, stats};

/// CLI argument shape. All commands accept a `--config` flag pointing to a
/// TOML configuration file; see `dssv.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dssv",
    about = "dssv — diacritic-aware student and link search over spreadsheet-sourced rows",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./dssv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (students,
    /// links, link_students, students_fts, search_queries). Idempotent;
    /// running it multiple times is safe.
    Init,

    /// Apply a scraped row batch (JSON) to the index.
    ///
    /// Each row upserts a student by display name, deduplicates its links by
    /// URL fingerprint, and attaches them at their sheet/row positions.
    Sync {
        /// Path to the JSON batch file produced by the scraper.
        file: PathBuf,

        /// Wipe all existing data first (full resync).
        #[arg(long)]
        clear: bool,

        /// Show row and link counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search students by name or identifier.
    ///
    /// Pure-digit queries take the identifier prefix path; everything else
    /// is matched against diacritic-folded names (full-text first, substring
    /// fallback).
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,

        /// Emit the full JSON response instead of a human-readable listing.
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats,

    /// Start the HTTP search API.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Sync {
            file,
            clear,
            dry_run,
        } => {
            ingest::run_sync(&cfg, &file, clear, dry_run).await?;
        }
        Commands::Search { query, limit, json } => {
            run_search(&cfg, &query, limit, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_search(
    cfg: &config::Config,
    query: &str,
    limit: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    let engine = SearchEngine::new(pool, SearchOptions::from_config(&cfg.search));

    let outcome = engine.search(query, limit).await?;

    if json {
        let response: SearchResponse = outcome.into();
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if outcome.results.is_empty() {
        println!("No results. ({:.1} ms)", outcome.elapsed_ms);
        return Ok(());
    }

    for (i, hit) in outcome.results.iter().enumerate() {
        let identifier = if hit.identifier.is_empty() {
            "-".to_string()
        } else {
            hit.identifier.clone()
        };
        println!(
            "{}. [{:.2}] {} ({})",
            i + 1,
            hit.score,
            hit.display_name,
            identifier
        );
        for link in &hit.links {
            let origin = link
                .origin_id
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(&link.sheet_name);
            println!(
                "    {} / row {}: {}",
                origin, link.row_number, link.url
            );
            if !link.snippet.is_empty() {
                println!("      \"{}\"", link.snippet.replace('\n', " ").trim());
            }
        }
        println!();
    }
    println!(
        "{} result{} in {:.1} ms",
        outcome.results.len(),
        if outcome.results.len() == 1 { "" } else { "s" },
        outcome.elapsed_ms
    );

    Ok(())
}
