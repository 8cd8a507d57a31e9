//! HTTP search API.
//!
//! Thin JSON layer over the search engine for browser UIs and other callers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/search?q=<query>&limit=<n>` | Tiered search with aggregated links |
//! | `GET`  | `/stats` | Index counts and sync generation |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "ok": false, "error_kind": "store_unavailable", "message": "..." }
//! ```
//!
//! A valid query with zero matches is *not* an error; it returns
//! `{"ok": true, "results": [], "count": 0}`. Sub-minimum-length queries
//! short-circuit to the same empty shape without touching the store. A
//! request missing the `q` parameter gets the same JSON error body with
//! `error_kind` `invalid_request` and status 400.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::error::SearchError;
use crate::search::{SearchEngine, SearchOptions, SearchResponse};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<SearchEngine>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let engine = Arc::new(SearchEngine::new(
        pool,
        SearchOptions::from_config(&config.search),
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/search", get(handle_search))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { engine });

    println!("search API listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into the JSON error contract.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        let status = match err {
            SearchError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
        };
        ApiError {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "ok": false,
            "error_kind": self.kind,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

// ============ Handlers ============

#[derive(Deserialize)]
struct SearchParams {
    // Optional at the extractor level so a missing parameter flows through
    // the JSON error contract instead of axum's plain-text rejection.
    q: Option<String>,
    limit: Option<i64>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let q = params.q.ok_or_else(|| ApiError {
        status: StatusCode::BAD_REQUEST,
        kind: "invalid_request",
        message: "missing required query parameter: q".to_string(),
    })?;
    let outcome = state.engine.search(&q, params.limit).await?;
    Ok(Json(outcome.into()))
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.engine.pool();

    let wrap = |source: sqlx::Error| ApiError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        kind: "store_unavailable",
        message: source.to_string(),
    };

    let counts = crate::store::counts(pool).await.map_err(wrap)?;
    let generation: i64 = crate::store::sync_generation(pool).await.map_err(wrap)?;

    Ok(Json(json!({
        "ok": true,
        "students": counts.students,
        "links": counts.links,
        "attachments": counts.attachments,
        "generation": generation,
    })))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        AppState {
            engine: Arc::new(SearchEngine::new(pool, SearchOptions::default())),
        }
    }

    #[tokio::test]
    async fn test_missing_query_param_uses_json_error_contract() {
        let state = test_state().await;

        let err = handle_search(
            State(state),
            Query(SearchParams {
                q: None,
                limit: None,
            }),
        )
        .await
        .err()
        .expect("missing q must be rejected");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, "invalid_request");
        assert_eq!(
            err.into_response().status(),
            StatusCode::BAD_REQUEST,
            "response body must carry the contract status"
        );
    }

    #[tokio::test]
    async fn test_present_query_returns_ok_shape() {
        let state = test_state().await;
        crate::store::upsert_student(state.engine.pool(), "Nguyễn Văn A", "2012345")
            .await
            .unwrap();

        let Json(response) = handle_search(
            State(state),
            Query(SearchParams {
                q: Some("nguyen".to_string()),
                limit: None,
            }),
        )
        .await
        .unwrap();

        assert!(response.ok);
        assert_eq!(response.count, 1);
        assert_eq!(response.results[0].display_name, "Nguyễn Văn A");
    }
}
