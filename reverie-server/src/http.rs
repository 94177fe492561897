//! Reverie HTTP REST API
//!
//! Axum-based HTTP server exposing entry processing and period summaries.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions take "today" explicitly so date validation is testable.
//!
//! Endpoints:
//! - GET    /health                   - health check with store status
//! - GET    /version                  - server version info
//! - POST   /api/process-entry        - analyse and store a new entry
//! - PATCH  /api/entry/:id            - re-analyse an entry with new text
//! - DELETE /api/entry/:id            - soft delete
//! - PATCH  /api/entry/:id/bookmark   - set bookmark flag
//! - GET    /api/entries              - live entries in a date range
//! - GET    /api/daily-summary        - narrative for one day
//! - GET    /api/weekly-summary       - cached narrative for an ISO week
//! - GET    /api/monthly-summary      - cached narrative for a calendar month

use std::fmt::Display;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{Duration, Local, NaiveDate, Utc};
use reverie_core::config::HttpConfig;
use reverie_core::models::JournalEntry;
use reverie_core::period::{parse_day, MonthId, PeriodError, WeekId};
use reverie_core::store::{Store, StoreError};
use reverie_core::vocab::{EntryFormat, EntryType, Vocabulary};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::agents::AgentContext;
use crate::subsystems::pipeline::{self, Overrides, ProcessError, ProcessRequest};
use crate::subsystems::summaries::{self, SummaryError};

/// Days covered by `/api/entries` when no start date is given.
pub const DEFAULT_RANGE_DAYS: i64 = 30;
const GENERIC_ERROR: &str = "Internal server error";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub agents: AgentContext,
    /// Include error detail in 500 bodies.
    pub expose_errors: bool,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/process-entry", post(process_entry_handler))
        .route(
            "/api/entry/:id",
            patch(update_entry_handler).delete(delete_entry_handler),
        )
        .route("/api/entry/:id/bookmark", patch(bookmark_handler))
        .route("/api/entries", get(entries_handler))
        .route("/api/daily-summary", get(daily_summary_handler))
        .route("/api/weekly-summary", get(weekly_summary_handler))
        .route("/api/monthly-summary", get(monthly_summary_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    config: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Reverie HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntryRequest {
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub format: Option<String>,
    pub auto_decompose: Option<bool>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateEntryRequest {
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DailyQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct WeeklyQuery {
    pub week: Option<String>,
    pub regenerate: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MonthlyQuery {
    pub month: Option<String>,
    pub regenerate: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check - asks the store and returns (status_code, json_body).
pub async fn health_inner(store: &dyn Store) -> (StatusCode, serde_json::Value) {
    match store.health().await {
        Ok(desc) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": desc,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unhealthy",
                "store": store.name(),
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "reverie/1",
    })
}

pub async fn process_entry_inner(
    state: &AppState,
    body: serde_json::Value,
    today: NaiveDate,
) -> (StatusCode, serde_json::Value) {
    let req: ProcessEntryRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => return bad_request(format!("Invalid request body: {}", e)),
    };
    let text = match required_text(req.text.as_deref()) {
        Some(t) => t,
        None => return bad_request("Text is required"),
    };
    let date = match req.date.as_deref() {
        Some(raw) => match parse_day(Some(raw), today) {
            Ok(d) => d,
            Err(PeriodError::FutureDate) => return bad_request("Entry date cannot be in the future"),
            Err(e) => return bad_request(e.to_string()),
        },
        None => today,
    };

    let request = ProcessRequest {
        text,
        overrides: overrides(req.entry_type.as_deref(), req.format.as_deref()),
        auto_decompose: req.auto_decompose.unwrap_or(true),
        date: Some(date),
        now: Utc::now(),
    };

    match pipeline::process_entry(&state.agents, state.store.as_ref(), request).await {
        Ok(outcome) => {
            let decomposed = outcome.decomposed();
            let mut processing = json!({
                "intent": outcome.run.intent,
                "emotion": outcome.run.emotion,
                "themes": outcome.run.themes,
                "insights": outcome.run.insights,
                "tokensUsed": outcome.tokens_used,
            });
            if let Some(d) = &outcome.decomposition {
                processing["decomposition"] = json!(d);
            }

            let mut body = json!({
                "success": true,
                "entry": entry_body(&outcome.entry),
                "processing": processing,
                "decomposed": decomposed,
            });
            if !outcome.children.is_empty() {
                let children: Vec<serde_json::Value> = outcome
                    .children
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "parentId": c.lineage.parent_id,
                            "sequenceOrder": c.lineage.sequence_order,
                            "fields": c,
                        })
                    })
                    .collect();
                body["childEntries"] = json!(children);
            }
            (StatusCode::OK, body)
        }
        Err(e) => process_failure(state, "process entry", e),
    }
}

pub async fn update_entry_inner(
    state: &AppState,
    raw_id: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let id = match parse_id(raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req: UpdateEntryRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => return bad_request(format!("Invalid request body: {}", e)),
    };
    let text = match required_text(req.text.as_deref()) {
        Some(t) => t,
        None => return bad_request("Text is required"),
    };

    let overrides = overrides(req.entry_type.as_deref(), req.format.as_deref());
    match pipeline::edit_entry(&state.agents, state.store.as_ref(), id, &text, overrides).await {
        Ok((entry, _)) => (
            StatusCode::OK,
            json!({ "success": true, "entry": entry_body(&entry) }),
        ),
        Err(e) => process_failure(state, "update entry", e),
    }
}

pub async fn delete_entry_inner(state: &AppState, raw_id: &str) -> (StatusCode, serde_json::Value) {
    let id = match parse_id(raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.set_deleted(id).await {
        Ok(entry) => {
            tracing::info!(entry_id = %id, "Entry soft deleted");
            (
                StatusCode::OK,
                json!({ "success": true, "entry": entry_body(&entry) }),
            )
        }
        Err(e) => store_failure(state, "delete entry", e),
    }
}

pub async fn bookmark_inner(
    state: &AppState,
    raw_id: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let id = match parse_id(raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let bookmarked = match body.get("bookmarked").and_then(|v| v.as_bool()) {
        Some(b) => b,
        None => return bad_request("bookmarked (boolean) is required"),
    };
    match state.store.set_bookmarked(id, bookmarked).await {
        Ok(entry) => {
            tracing::info!(entry_id = %id, bookmarked, "Bookmark updated");
            (
                StatusCode::OK,
                json!({ "success": true, "entry": entry_body(&entry) }),
            )
        }
        Err(e) => store_failure(state, "bookmark entry", e),
    }
}

pub async fn entries_inner(
    state: &AppState,
    query: RangeQuery,
    today: NaiveDate,
) -> (StatusCode, serde_json::Value) {
    let end = match query.end.as_deref() {
        Some(raw) => match parse_date(raw) {
            Some(d) => d,
            None => return bad_request(PeriodError::InvalidDate.to_string()),
        },
        None => today,
    };
    let start = match query.start.as_deref() {
        Some(raw) => match parse_date(raw) {
            Some(d) => d,
            None => return bad_request(PeriodError::InvalidDate.to_string()),
        },
        None => end - Duration::days(DEFAULT_RANGE_DAYS),
    };
    if start > end {
        return bad_request("start must not be after end");
    }

    match state.store.list_by_date_range(start, end).await {
        Ok(entries) => (
            StatusCode::OK,
            json!({
                "success": true,
                "start": start,
                "end": end,
                "count": entries.len(),
                "entries": entries,
            }),
        ),
        Err(e) => store_failure(state, "list entries", e),
    }
}

pub async fn daily_summary_inner(
    state: &AppState,
    query: DailyQuery,
    today: NaiveDate,
) -> (StatusCode, serde_json::Value) {
    let date = match parse_day(query.date.as_deref(), today) {
        Ok(d) => d,
        Err(e) => return bad_request(e.to_string()),
    };
    match summaries::daily_summary(&state.agents, state.store.as_ref(), date).await {
        Ok(view) => (StatusCode::OK, json!({ "success": true, "summary": view })),
        Err(e) => summary_failure(state, "daily summary", e),
    }
}

pub async fn weekly_summary_inner(
    state: &AppState,
    query: WeeklyQuery,
    today: NaiveDate,
) -> (StatusCode, serde_json::Value) {
    let week = match WeekId::resolve(query.week.as_deref(), today) {
        Ok(w) => w,
        Err(e) => return bad_request(e.to_string()),
    };
    let regenerate = query.regenerate.as_deref() == Some("true");
    match summaries::weekly_summary(&state.agents, state.store.as_ref(), week, regenerate).await {
        Ok(view) => (StatusCode::OK, json!({ "success": true, "summary": view })),
        Err(e) => summary_failure(state, "weekly summary", e),
    }
}

pub async fn monthly_summary_inner(
    state: &AppState,
    query: MonthlyQuery,
    today: NaiveDate,
) -> (StatusCode, serde_json::Value) {
    let month = match MonthId::resolve(query.month.as_deref(), today) {
        Ok(m) => m,
        Err(e) => return bad_request(e.to_string()),
    };
    let regenerate = query.regenerate.as_deref() == Some("true");
    match summaries::monthly_summary(&state.agents, state.store.as_ref(), month, regenerate).await {
        Ok(view) => (StatusCode::OK, json!({ "success": true, "summary": view })),
        Err(e) => summary_failure(state, "monthly summary", e),
    }
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn process_entry_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let (status, body) = process_entry_inner(&state, body, today()).await;
    (status, Json(body))
}

pub async fn update_entry_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let (status, body) = update_entry_inner(&state, &id, body).await;
    (status, Json(body))
}

pub async fn delete_entry_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_entry_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn bookmark_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let (status, body) = bookmark_inner(&state, &id, body).await;
    (status, Json(body))
}

pub async fn entries_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let (status, body) = entries_inner(&state, query, today()).await;
    (status, Json(body))
}

pub async fn daily_summary_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyQuery>,
) -> impl IntoResponse {
    let (status, body) = daily_summary_inner(&state, query, today()).await;
    (status, Json(body))
}

pub async fn weekly_summary_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeeklyQuery>,
) -> impl IntoResponse {
    let (status, body) = weekly_summary_inner(&state, query, today()).await;
    (status, Json(body))
}

pub async fn monthly_summary_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthlyQuery>,
) -> impl IntoResponse {
    let (status, body) = monthly_summary_inner(&state, query, today()).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Trimmed text, or `None` when missing or blank.
fn required_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

/// Caller classification; labels outside the vocabularies are ignored.
fn overrides(entry_type: Option<&str>, format: Option<&str>) -> Overrides {
    Overrides {
        entry_type: entry_type.and_then(EntryType::from_label),
        format: format.and_then(EntryFormat::from_label),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_id(raw: &str) -> std::result::Result<Uuid, (StatusCode, serde_json::Value)> {
    Uuid::parse_str(raw).map_err(|_| bad_request("Invalid entry id"))
}

fn entry_body(entry: &JournalEntry) -> serde_json::Value {
    json!({ "id": entry.id, "fields": entry })
}

fn failure(status: StatusCode, msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    (status, json!({ "success": false, "error": msg.into() }))
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    failure(StatusCode::BAD_REQUEST, msg)
}

/// 500 with the error detail, or a generic message when detail is hidden.
fn internal_error(state: &AppState, op: &str, err: &dyn Display) -> (StatusCode, serde_json::Value) {
    tracing::error!(op, error = %err, "Request failed");
    let msg = if state.expose_errors {
        err.to_string()
    } else {
        GENERIC_ERROR.to_string()
    };
    failure(StatusCode::INTERNAL_SERVER_ERROR, msg)
}

fn store_failure(state: &AppState, op: &str, err: StoreError) -> (StatusCode, serde_json::Value) {
    match err {
        StoreError::NotFound(_) => failure(StatusCode::NOT_FOUND, "Entry not found"),
        other => internal_error(state, op, &other),
    }
}

fn process_failure(state: &AppState, op: &str, err: ProcessError) -> (StatusCode, serde_json::Value) {
    match err {
        ProcessError::Store(e) => store_failure(state, op, e),
        ProcessError::Pipeline(e) => internal_error(state, op, &e),
    }
}

fn summary_failure(state: &AppState, op: &str, err: SummaryError) -> (StatusCode, serde_json::Value) {
    internal_error(state, op, &err)
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================
