//! Tiered search engine.
//!
//! Executes the classified query against the store using an explicit tier
//! plan: identifier queries take the indexed prefix lookup; name queries try
//! the FTS5 index first and fall back to a substring scan only when the index
//! returns nothing. Tiers never merge: the first non-empty tier is final.
//!
//! The engine owns no durable state. Its only memory is an optional
//! seconds-scale result cache keyed on `(normalized_query, limit)` and
//! guarded by the store's sync generation, so a cache entry can never
//! outlive the last successful sync.

use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::models::LinkRef;
use crate::normalize::normalize;
use crate::query::{classify, QueryKind};
use crate::store::{self, AttachedLink};

/// Search strategy tiers, tried in plan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    IdentifierPrefix,
    FullText,
    Substring,
}

/// Engine tuning knobs, normally derived from `[search]` config.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub default_limit: i64,
    pub max_limit: i64,
    pub min_query_chars: usize,
    pub timeout: Option<Duration>,
    pub cache_ttl: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 200,
            min_query_chars: 2,
            timeout: None,
            cache_ttl: None,
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
            min_query_chars: config.min_query_chars,
            timeout: config.timeout_ms.map(Duration::from_millis),
            cache_ttl: match config.cache_ttl_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// One matched student with its aggregated, deterministically ordered links.
#[derive(Debug, Clone, Serialize)]
pub struct StudentHit {
    pub id: i64,
    pub display_name: String,
    pub identifier: String,
    pub score: f64,
    pub links: Vec<LinkRef>,
}

/// The result of one `search()` call.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    /// The tier that produced the results; `None` when nothing matched or
    /// the query was short-circuited before touching the store.
    pub tier: Option<Tier>,
    pub results: Vec<StudentHit>,
    pub elapsed_ms: f64,
}

/// The wire-shape response consumed by HTTP callers and `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub ok: bool,
    pub query: String,
    pub results: Vec<StudentHit>,
    pub count: usize,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            ok: true,
            query: outcome.query,
            count: outcome.results.len(),
            results: outcome.results,
            elapsed_ms: outcome.elapsed_ms,
            tier: outcome.tier,
        }
    }
}

struct CacheEntry {
    stored_at: Instant,
    generation: i64,
    outcome: SearchOutcome,
}

pub struct SearchEngine {
    pool: SqlitePool,
    opts: SearchOptions,
    cache: Mutex<HashMap<(String, i64), CacheEntry>>,
}

impl SearchEngine {
    pub fn new(pool: SqlitePool, opts: SearchOptions) -> Self {
        Self {
            pool,
            opts,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Drop all cached results, e.g. after an in-process sync.
    pub fn invalidate_cache(&self) {
        self.cache.lock().expect("cache lock poisoned").clear();
    }

    /// Execute a search. `limit` falls back to the configured default and is
    /// clamped to `[0, max_limit]`; `limit == 0` and sub-minimum queries
    /// return an empty ok outcome without touching the store.
    pub async fn search(
        &self,
        raw_query: &str,
        limit: Option<i64>,
    ) -> Result<SearchOutcome, SearchError> {
        let started = Instant::now();
        let limit = clamp_limit(limit, &self.opts);
        let normalized = normalize(raw_query);

        if limit == 0 || normalized.chars().count() < self.opts.min_query_chars {
            return Ok(SearchOutcome {
                query: raw_query.to_string(),
                tier: None,
                results: Vec::new(),
                elapsed_ms: elapsed_ms(started),
            });
        }

        // The cache is only consulted when the store's sync generation is
        // readable; a failed read just bypasses it.
        let generation = match self.opts.cache_ttl {
            Some(_) => store::sync_generation(&self.pool).await.ok(),
            None => None,
        };
        if let Some(generation) = generation {
            if let Some(outcome) = self.cache_get(&normalized, limit, generation) {
                return Ok(outcome);
            }
        }

        let exec = self.execute(&normalized, limit);
        let (tier, results) = match self.opts.timeout {
            Some(deadline) => match tokio::time::timeout(deadline, exec).await {
                Ok(result) => result.map_err(|source| SearchError::StoreUnavailable {
                    query: raw_query.to_string(),
                    source,
                })?,
                Err(_) => {
                    return Err(SearchError::Timeout {
                        query: raw_query.to_string(),
                        timeout_ms: deadline.as_millis() as u64,
                    })
                }
            },
            None => exec.await.map_err(|source| SearchError::StoreUnavailable {
                query: raw_query.to_string(),
                source,
            })?,
        };

        let outcome = SearchOutcome {
            query: raw_query.to_string(),
            tier,
            results,
            elapsed_ms: elapsed_ms(started),
        };

        // Analytics are best-effort: a logging failure never fails the search.
        if let Err(e) = store::log_query(
            &self.pool,
            raw_query,
            &normalized,
            outcome.results.len() as i64,
            outcome.elapsed_ms,
        )
        .await
        {
            tracing::warn!(error = %e, "failed to record search query");
        }
        tracing::debug!(
            query = raw_query,
            tier = ?outcome.tier,
            count = outcome.results.len(),
            elapsed_ms = outcome.elapsed_ms,
            "search complete"
        );

        if let Some(generation) = generation {
            self.cache_put(&normalized, limit, generation, &outcome);
        }

        Ok(outcome)
    }

    /// Run the tier plan and aggregate links for whichever tier hit.
    async fn execute(
        &self,
        normalized: &str,
        limit: i64,
    ) -> Result<(Option<Tier>, Vec<StudentHit>), sqlx::Error> {
        let plan: &[Tier] = match classify(normalized) {
            QueryKind::Identifier => &[Tier::IdentifierPrefix],
            QueryKind::Name => &[Tier::FullText, Tier::Substring],
        };

        let mut tier_used = None;
        let mut candidates = Vec::new();
        for tier in plan {
            let found = match tier {
                Tier::IdentifierPrefix => {
                    store::find_by_identifier_prefix(&self.pool, normalized, limit)
                        .await?
                        .into_iter()
                        .map(|s| (s, 0.0))
                        .collect()
                }
                Tier::FullText => store::full_text_search(&self.pool, normalized, limit).await?,
                Tier::Substring => store::substring_search(&self.pool, normalized, limit)
                    .await?
                    .into_iter()
                    .map(|s| (s, 0.0))
                    .collect::<Vec<_>>(),
            };
            if !found.is_empty() {
                tier_used = Some(*tier);
                candidates = found;
                break;
            }
        }

        // Deduplicate by entity, preserving tier order, then cap.
        let mut seen = std::collections::HashSet::new();
        candidates.retain(|(s, _)| seen.insert(s.id));
        candidates.truncate(limit as usize);

        let ids: Vec<i64> = candidates.iter().map(|(s, _)| s.id).collect();
        let attached = store::links_for(&self.pool, &ids).await?;
        let mut grouped = group_links(attached);

        let results = candidates
            .into_iter()
            .map(|(s, score)| StudentHit {
                links: grouped.remove(&s.id).unwrap_or_default(),
                id: s.id,
                display_name: s.display_name,
                identifier: s.identifier,
                score,
            })
            .collect();

        Ok((tier_used, results))
    }

    fn cache_get(&self, normalized: &str, limit: i64, generation: i64) -> Option<SearchOutcome> {
        let ttl = self.opts.cache_ttl?;
        let cache = self.cache.lock().expect("cache lock poisoned");
        let entry = cache.get(&(normalized.to_string(), limit))?;
        if entry.stored_at.elapsed() <= ttl && entry.generation == generation {
            Some(entry.outcome.clone())
        } else {
            None
        }
    }

    fn cache_put(&self, normalized: &str, limit: i64, generation: i64, outcome: &SearchOutcome) {
        if self.opts.cache_ttl.is_none() {
            return;
        }
        let mut cache = self.cache.lock().expect("cache lock poisoned");
        cache.insert(
            (normalized.to_string(), limit),
            CacheEntry {
                stored_at: Instant::now(),
                generation,
                outcome: outcome.clone(),
            },
        );
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn clamp_limit(requested: Option<i64>, opts: &SearchOptions) -> i64 {
    requested.unwrap_or(opts.default_limit).clamp(0, opts.max_limit)
}

/// Group each student's links by origin document (falling back to sheet name),
/// case-insensitive ascending, then by row number within each group. Link id
/// is the final tiebreak so identical positions stay stable.
fn group_links(attached: Vec<AttachedLink>) -> HashMap<i64, Vec<LinkRef>> {
    let mut by_student: HashMap<i64, Vec<AttachedLink>> = HashMap::new();
    for a in attached {
        by_student.entry(a.student_id).or_default().push(a);
    }

    by_student
        .into_iter()
        .map(|(student_id, mut links)| {
            links.sort_by(|a, b| {
                group_key(&a.link)
                    .cmp(&group_key(&b.link))
                    .then(a.link.row_number.cmp(&b.link.row_number))
                    .then(a.link_id.cmp(&b.link_id))
            });
            (student_id, links.into_iter().map(|a| a.link).collect())
        })
        .collect()
}

fn group_key(link: &LinkRef) -> String {
    link.origin_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(&link.sheet_name)
        .to_lowercase()
}
