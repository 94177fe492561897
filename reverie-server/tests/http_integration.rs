//! HTTP integration tests for the Reverie REST API
//!
//! Full end-to-end handler dispatch through the Axum router with `oneshot`,
//! backed by the in-memory store and a wiremock chat-completion endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use reverie_core::{LlmClientConfig, MemoryStore, OpenRouterClient};
use reverie_server::agents::{AgentContext, ModelSet};
use reverie_server::http::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INTENT: &str = "expert journal entry classifier";
const EMOTION: &str = "analyzing emotional and psychological states";
const THEME: &str = "identifying themes and patterns";
const INSIGHT: &str = "thoughtful advisor";
const DAILY: &str = "daily journal analyst";
const WEEKLY: &str = "weekly journal analyst";

const LUNCH_TEXT: &str = "Had a rough morning but felt better after lunch with a friend.";

fn completion(data: Value, tokens: i32) -> Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": data.to_string() } }],
        "usage": { "prompt_tokens": tokens, "completion_tokens": 5 }
    })
}

async fn mount(server: &MockServer, marker: &str, data: Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(marker))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(data, 20)))
        .mount(server)
        .await;
}

/// Replies for the four analysis stages.
async fn mount_pipeline(server: &MockServer) {
    mount(
        server,
        INTENT,
        json!({
            "type": "Social",
            "format": "Quick Log",
            "isConsolidated": false,
            "name": "Lunch Turned It Around",
            "snapshot": "A rough morning eased after lunch with a friend."
        }),
    )
    .await;
    mount(
        server,
        EMOTION,
        json!({
            "inferredMode": "Hopeful",
            "inferredEnergy": "Balanced",
            "energyShape": "Rising",
            "sentimentAI": "Positive"
        }),
    )
    .await;
    mount(
        server,
        THEME,
        json!({ "themeTagsAI": ["friendship", "recovery"], "contradiction": null, "loops": null }),
    )
    .await;
    mount(
        server,
        INSIGHT,
        json!({
            "summaryAI": "A hard start that eased with company.",
            "actionableInsightsAI": "Company helps you reset.",
            "nextAction": "Plan another lunch."
        }),
    )
    .await;
}

fn make_app(server: &MockServer) -> Router {
    let client = OpenRouterClient::new(LlmClientConfig {
        api_key: "test-key".to_string(),
        base_url: server.uri(),
        timeout_seconds: 5,
        referer: "https://reverie.test".to_string(),
        title: "Reverie Test".to_string(),
    })
    .expect("client");
    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        agents: AgentContext::new(Arc::new(client), ModelSet::default()),
        expose_errors: true,
    };
    build_router(Arc::new(state))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn post_entry(app: &Router, body: Value) -> Value {
    let (status, json) = call(app, "POST", "/api/process-entry", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "process-entry failed: {}", json);
    json
}

// ===========================================================================
// TEST 1: GET /version and /health
// ===========================================================================
#[tokio::test]
async fn test_version_and_health() {
    let server = MockServer::start().await;
    let app = make_app(&server);

    let (status, json) = call(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["version"].is_string());
    assert_eq!(json["protocol"], "reverie/1");

    let (status, json) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store"], "memory (0 entries)");
}

// ===========================================================================
// TEST 2: POST /api/process-entry stores a fully analysed entry
// ===========================================================================
#[tokio::test]
async fn test_process_entry_end_to_end() {
    let server = MockServer::start().await;
    mount_pipeline(&server).await;
    mount(
        &server,
        DAILY,
        json!({ "narrative": "You recovered well today.", "keyTakeaway": "People help." }),
    )
    .await;
    let app = make_app(&server);

    let json = post_entry(&app, json!({ "text": format!("  {}  ", LUNCH_TEXT) })).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["decomposed"], false);
    assert!(json.get("childEntries").is_none());

    let fields = &json["entry"]["fields"];
    assert_eq!(fields["text"], LUNCH_TEXT);
    assert_eq!(fields["type"], "Social");
    assert_eq!(fields["name"], "Lunch Turned It Around");
    assert_eq!(fields["inferredMode"], "Hopeful");
    assert_eq!(fields["sentiment"], "Positive");
    assert_eq!(fields["themeTags"], json!(["friendship", "recovery"]));
    assert_eq!(fields["wordCount"], 12);
    assert_eq!(fields["metaFlag"], "Web App");
    assert_eq!(json["processing"]["tokensUsed"], 100);
    assert_eq!(json["processing"]["intent"]["name"], "Lunch Turned It Around");

    let date = fields["date"].as_str().unwrap().to_string();

    let (status, listed) = call(&app, "GET", &format!("/api/entries?start={0}&end={0}", date), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["entries"][0]["id"], json["entry"]["id"]);

    let (status, daily) = call(&app, "GET", &format!("/api/daily-summary?date={}", date), None).await;
    assert_eq!(status, StatusCode::OK);
    let summary = &daily["summary"];
    assert_eq!(summary["entryCount"], 1);
    assert_eq!(summary["narrative"], "You recovered well today.");
    assert_eq!(summary["dominantMode"], "Hopeful");
    assert_eq!(summary["dominantSentiment"], "Positive");
    assert_eq!(summary["themes"], json!(["friendship", "recovery"]));
}

// ===========================================================================
// TEST 3: client input errors never reach the model
// ===========================================================================
#[tokio::test]
async fn test_input_validation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let app = make_app(&server);

    let (status, json) = call(&app, "POST", "/api/process-entry", Some(json!({ "text": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({ "success": false, "error": "Text is required" }));

    let (status, json) = call(&app, "GET", "/api/daily-summary?date=2099-01-01", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Cannot generate summary for future dates");

    let (status, json) = call(&app, "GET", "/api/weekly-summary?week=2026-15", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid week format. Use YYYY-Wnn (e.g., 2026-W01)");

    let (status, json) = call(&app, "GET", "/api/monthly-summary?month=2026-13", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid month format. Use YYYY-MM (e.g., 2026-01)");

    let (status, json) = call(&app, "DELETE", "/api/entry/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid entry id");
}

// ===========================================================================
// TEST 4: weekly summary cache round trip and regeneration
// ===========================================================================
#[tokio::test]
async fn test_weekly_summary_cache() {
    let server = MockServer::start().await;
    mount_pipeline(&server).await;
    Mock::given(method("POST"))
        .and(body_string_contains(WEEKLY))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            json!({
                "narrative": "You leaned on friends this week.",
                "moodTrend": "improving",
                "weeklyInsight": "Connection lifts you.",
                "recommendations": ["Schedule lunches", "Sleep earlier"],
                "nextWeekFocus": "Stay connected"
            }),
            300,
        )))
        .expect(2)
        .mount(&server)
        .await;
    let app = make_app(&server);

    post_entry(&app, json!({ "text": LUNCH_TEXT, "date": "2024-03-05" })).await;
    post_entry(&app, json!({ "text": LUNCH_TEXT, "date": "2024-03-07" })).await;

    let (status, first) = call(&app, "GET", "/api/weekly-summary?week=2024-W10", None).await;
    assert_eq!(status, StatusCode::OK);
    let first = &first["summary"];
    assert_eq!(first["cached"], false);
    assert_eq!(first["weekStart"], "2024-03-04");
    assert_eq!(first["weekEnd"], "2024-03-10");
    assert_eq!(first["entryCount"], 2);
    assert_eq!(first["avgEntriesPerDay"], 1.0);
    assert_eq!(first["positiveRatio"], 100.0);
    assert_eq!(first["moodTrend"], "improving");
    assert!(first["summaryId"].is_string());

    let (_, second) = call(&app, "GET", "/api/weekly-summary?week=2024-W10", None).await;
    let second = &second["summary"];
    assert_eq!(second["cached"], true);
    assert_eq!(second["tokensUsed"], 0);
    assert_eq!(second["narrative"], first["narrative"]);
    assert_eq!(second["recommendations"], first["recommendations"]);
    assert_eq!(second["summaryId"], first["summaryId"]);

    let (_, third) = call(&app, "GET", "/api/weekly-summary?week=2024-W10&regenerate=true", None).await;
    let third = &third["summary"];
    assert_eq!(third["cached"], false);
    assert_eq!(third["summaryId"], first["summaryId"]);
}

// ===========================================================================
// TEST 5: an empty week returns the empty shape without calling the model
// ===========================================================================
#[tokio::test]
async fn test_empty_week() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let app = make_app(&server);

    let (status, json) = call(&app, "GET", "/api/weekly-summary?week=2024-W02", None).await;
    assert_eq!(status, StatusCode::OK);
    let summary = &json["summary"];
    assert_eq!(summary["entryCount"], 0);
    assert!(summary["narrative"].is_null());
    assert_eq!(summary["recommendations"], json!([]));
    assert_eq!(summary["cached"], false);
    assert!(summary["summaryId"].is_null());
}

// ===========================================================================
// TEST 6: bookmark, edit and soft delete
// ===========================================================================
#[tokio::test]
async fn test_entry_lifecycle() {
    let server = MockServer::start().await;
    mount_pipeline(&server).await;
    let app = make_app(&server);

    let created = post_entry(&app, json!({ "text": LUNCH_TEXT, "date": "2024-03-05" })).await;
    let id = created["entry"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/entry/{}", id);

    let (status, json) = call(&app, "PATCH", &format!("{}/bookmark", uri), Some(json!({ "bookmarked": "true" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bookmarked (boolean) is required");

    let (status, json) = call(&app, "PATCH", &format!("{}/bookmark", uri), Some(json!({ "bookmarked": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["entry"]["fields"]["bookmarked"], true);

    let (status, json) = call(&app, "PATCH", &uri, Some(json!({ "text": "Lunch was fine." }))).await;
    assert_eq!(status, StatusCode::OK);
    let fields = &json["entry"]["fields"];
    assert_eq!(json["entry"]["id"], id.as_str());
    assert_eq!(fields["text"], "Lunch was fine.");
    assert_eq!(fields["wordCount"], 3);
    assert_eq!(fields["date"], "2024-03-05");
    assert_eq!(fields["timestamp"], created["entry"]["fields"]["timestamp"]);
    assert_eq!(fields["bookmarked"], true);

    let (status, json) = call(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["entry"]["fields"]["deleted"], true);

    let (status, _) = call(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK, "soft delete is idempotent");

    let (_, listed) = call(&app, "GET", "/api/entries?start=2024-03-01&end=2024-03-31", None).await;
    assert_eq!(listed["count"], 0);

    let (status, json) = call(&app, "PATCH", &format!("{}/bookmark", uri), Some(json!({ "bookmarked": false }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Entry not found");
}

// ===========================================================================
// TEST 7: a failing stage returns 500 and stores nothing
// ===========================================================================
#[tokio::test]
async fn test_stage_failure_returns_500() {
    let server = MockServer::start().await;
    mount(&server, INTENT, json!({ "type": "Work" })).await;
    Mock::given(method("POST"))
        .and(body_string_contains(EMOTION))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    let app = make_app(&server);

    let (status, json) = call(&app, "POST", "/api/process-entry", Some(json!({ "text": "Busy day", "date": "2024-03-05" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("emotion"));

    let (_, listed) = call(&app, "GET", "/api/entries?start=2024-03-05&end=2024-03-05", None).await;
    assert_eq!(listed["count"], 0);
}
