//! Entry analysis pipeline.
//!
//! A run walks `Intent -> Emotion -> Theme -> Insight` strictly in order and
//! ends in `Done` or `Failed(stage, error)`. Nothing is persisted unless the
//! whole run reaches `Done`, and no stage is retried.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use reverie_core::llm::LlmError;
use reverie_core::models::entry::{META_FLAG_DECOMPOSED, META_FLAG_WEB};
use reverie_core::models::{word_count, EntryAnalysis, JournalEntry, Lineage, NewEntry};
use reverie_core::store::{Store, StoreError};
use reverie_core::vocab::{EntryFormat, EntryType};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::agents::decomposition::{analyze_for_decomposition, DecompositionOutput};
use crate::agents::emotion::{analyze_emotion, EmotionOutput};
use crate::agents::insight::{generate_insights, InsightOutput, StageContext};
use crate::agents::intent::{classify_intent, IntentOutput};
use crate::agents::theme::{extract_themes, ThemeOutput};
use crate::agents::AgentContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intent,
    Emotion,
    Theme,
    Insight,
    Decomposition,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Intent => "intent",
            Stage::Emotion => "emotion",
            Stage::Theme => "theme",
            Stage::Insight => "insight",
            Stage::Decomposition => "decomposition",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: LlmError,
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Caller-supplied classification that wins over the model's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub entry_type: Option<EntryType>,
    pub format: Option<EntryFormat>,
}

/// All four stage outputs of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    pub intent: IntentOutput,
    pub emotion: EmotionOutput,
    pub themes: ThemeOutput,
    pub insights: InsightOutput,
    pub tokens_used: i32,
}

impl AnalysisRun {
    pub fn to_analysis(&self, text: &str) -> EntryAnalysis {
        EntryAnalysis {
            entry_type: self.intent.entry_type,
            format: self.intent.format,
            name: self.intent.name.clone(),
            snapshot: self.intent.snapshot.clone(),
            inferred_mode: self.emotion.inferred_mode,
            inferred_energy: self.emotion.inferred_energy,
            energy_shape: self.emotion.energy_shape,
            sentiment: self.emotion.sentiment,
            theme_tags: self.themes.theme_tags.clone(),
            contradiction: self.themes.contradiction,
            loops: self.themes.loops.clone(),
            summary: self.insights.summary.clone(),
            actionable_insights: self.insights.actionable_insights.clone(),
            next_action: self.insights.next_action.clone(),
            word_count: word_count(text),
            tokens_used: self.tokens_used,
        }
    }
}

enum PipelineState {
    Intent,
    Emotion {
        intent: IntentOutput,
    },
    Theme {
        intent: IntentOutput,
        emotion: EmotionOutput,
    },
    Insight {
        intent: IntentOutput,
        emotion: EmotionOutput,
        themes: ThemeOutput,
    },
    Done(AnalysisRun),
    Failed(PipelineError),
}

fn failed(stage: Stage, source: LlmError) -> PipelineState {
    tracing::error!(%stage, error = %source, "Pipeline stage failed");
    PipelineState::Failed(PipelineError { stage, source })
}

/// Run the four analysis stages over `text`.
pub async fn run_analysis(
    ctx: &AgentContext,
    text: &str,
    overrides: Overrides,
) -> Result<AnalysisRun, PipelineError> {
    let mut tokens: i32 = 0;
    let mut state = PipelineState::Intent;

    loop {
        state = match state {
            PipelineState::Intent => match classify_intent(ctx, text).await {
                Ok((mut intent, used)) => {
                    tokens = tokens.saturating_add(used);
                    if let Some(t) = overrides.entry_type {
                        intent.entry_type = t;
                    }
                    if let Some(f) = overrides.format {
                        intent.format = f;
                    }
                    tracing::info!(entry_type = %intent.entry_type, format = %intent.format, "Intent stage complete");
                    PipelineState::Emotion { intent }
                }
                Err(e) => failed(Stage::Intent, e),
            },
            PipelineState::Emotion { intent } => {
                match analyze_emotion(ctx, text, intent.entry_type).await {
                    Ok((emotion, used)) => {
                        tokens = tokens.saturating_add(used);
                        tracing::info!(mode = %emotion.inferred_mode, sentiment = %emotion.sentiment, "Emotion stage complete");
                        PipelineState::Theme { intent, emotion }
                    }
                    Err(e) => failed(Stage::Emotion, e),
                }
            }
            PipelineState::Theme { intent, emotion } => {
                match extract_themes(ctx, text, intent.entry_type, emotion.inferred_mode).await {
                    Ok((themes, used)) => {
                        tokens = tokens.saturating_add(used);
                        tracing::info!(tags = themes.theme_tags.len(), "Theme stage complete");
                        PipelineState::Insight {
                            intent,
                            emotion,
                            themes,
                        }
                    }
                    Err(e) => failed(Stage::Theme, e),
                }
            }
            PipelineState::Insight {
                intent,
                emotion,
                themes,
            } => {
                let stages = StageContext {
                    intent: &intent,
                    emotion: &emotion,
                    themes: &themes,
                };
                match generate_insights(ctx, text, stages).await {
                    Ok((insights, used)) => {
                        tokens = tokens.saturating_add(used);
                        tracing::info!(tokens_used = tokens, "Insight stage complete");
                        PipelineState::Done(AnalysisRun {
                            intent,
                            emotion,
                            themes,
                            insights,
                            tokens_used: tokens,
                        })
                    }
                    Err(e) => failed(Stage::Insight, e),
                }
            }
            PipelineState::Done(run) => return Ok(run),
            PipelineState::Failed(e) => return Err(e),
        };
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub text: String,
    pub overrides: Overrides,
    pub auto_decompose: bool,
    pub date: Option<NaiveDate>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub entry: JournalEntry,
    pub run: AnalysisRun,
    pub decomposition: Option<DecompositionOutput>,
    pub children: Vec<JournalEntry>,
    /// Parent stages plus decomposition; children account for their own.
    pub tokens_used: i32,
}

impl ProcessOutcome {
    pub fn decomposed(&self) -> bool {
        self.entry.lineage.is_decomposed
    }
}

fn wants_decomposition(run: &AnalysisRun) -> bool {
    run.intent.is_consolidated
        || matches!(run.intent.format, EntryFormat::Consolidated | EntryFormat::EndOfDay)
}

/// Analyse and store a new entry, splitting it into child entries when it
/// bundles several distinct events.
pub async fn process_entry(
    ctx: &AgentContext,
    store: &dyn Store,
    req: ProcessRequest,
) -> Result<ProcessOutcome, ProcessError> {
    let run = run_analysis(ctx, &req.text, req.overrides).await?;
    let mut tokens_used = run.tokens_used;

    let decomposition = if req.auto_decompose && wants_decomposition(&run) {
        let (output, used) = analyze_for_decomposition(ctx, &req.text)
            .await
            .map_err(|source| {
                tracing::error!(error = %source, "Decomposition failed");
                PipelineError {
                    stage: Stage::Decomposition,
                    source,
                }
            })?;
        tokens_used = tokens_used.saturating_add(used);
        tracing::info!(
            should_decompose = output.should_decompose,
            events = output.events.len(),
            "Decomposition analysed"
        );
        Some(output)
    } else {
        None
    };

    let mut lineage = Lineage::default();
    if let Some(d) = decomposition.as_ref().filter(|d| d.should_decompose) {
        lineage.is_decomposed = true;
        lineage.decomposition_count = i32::try_from(d.events.len()).unwrap_or(i32::MAX);
        lineage.overarching_theme = d.overarching_theme.clone();
    }

    let date = req.date.unwrap_or_else(|| req.now.date_naive());
    let mut analysis = run.to_analysis(&req.text);
    analysis.tokens_used = tokens_used;

    let entry = store
        .create(NewEntry {
            text: req.text.clone(),
            date,
            timestamp: req.now,
            analysis,
            lineage,
            meta_flag: META_FLAG_WEB.to_string(),
        })
        .await?;
    tracing::info!(entry_id = %entry.id, tokens_used, "Entry stored");

    let mut children = Vec::new();
    if let Some(d) = decomposition.as_ref().filter(|d| d.should_decompose) {
        for event in &d.events {
            let overrides = Overrides {
                entry_type: event.suggested_type,
                format: Some(EntryFormat::DailyLog),
            };
            let child_run = match run_analysis(ctx, &event.text, overrides).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(parent_id = %entry.id, sequence = event.sequence_order, error = %e, "Skipping child entry");
                    continue;
                }
            };
            let child = store
                .create(NewEntry {
                    text: event.text.clone(),
                    date,
                    timestamp: req.now,
                    analysis: child_run.to_analysis(&event.text),
                    lineage: Lineage {
                        parent_id: Some(entry.id),
                        sequence_order: Some(event.sequence_order),
                        approximate_time: event.approximate_time.clone(),
                        ..Lineage::default()
                    },
                    meta_flag: META_FLAG_DECOMPOSED.to_string(),
                })
                .await;
            match child {
                Ok(c) => children.push(c),
                Err(e) => {
                    tracing::warn!(parent_id = %entry.id, sequence = event.sequence_order, error = %e, "Failed to store child entry")
                }
            }
        }
        tracing::info!(parent_id = %entry.id, children = children.len(), "Decomposition complete");
    }

    Ok(ProcessOutcome {
        entry,
        run,
        decomposition,
        children,
        tokens_used,
    })
}

/// Re-run the full analysis over new text for an existing entry. The entry
/// keeps its id, date, timestamp, lineage and flags. Edits never decompose.
pub async fn edit_entry(
    ctx: &AgentContext,
    store: &dyn Store,
    id: Uuid,
    text: &str,
    overrides: Overrides,
) -> Result<(JournalEntry, AnalysisRun), ProcessError> {
    if store.get(id).await?.is_none() {
        return Err(StoreError::NotFound(id).into());
    }

    let run = run_analysis(ctx, text, overrides).await?;
    let entry = store.update_analysis(id, text, run.to_analysis(text)).await?;
    tracing::info!(entry_id = %id, tokens_used = run.tokens_used, "Entry re-analysed");
    Ok((entry, run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{completion, context_for};
    use chrono::TimeZone;
    use reverie_core::store::{EntryStore, MemoryStore};
    use reverie_core::vocab::{InferredMode, Sentiment};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Route each stage by a phrase unique to its system prompt.
    async fn mount_stage(server: &MockServer, marker: &str, data: serde_json::Value, tokens: i32) {
        Mock::given(method("POST"))
            .and(body_string_contains(marker))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(data, tokens)))
            .mount(server)
            .await;
    }

    const INTENT: &str = "expert journal entry classifier";
    const EMOTION: &str = "analyzing emotional and psychological states";
    const THEME: &str = "identifying themes and patterns";
    const INSIGHT: &str = "thoughtful advisor";
    const DECOMPOSE: &str = "separating distinct events";

    async fn mount_happy_path(server: &MockServer, intent: serde_json::Value) {
        mount_stage(server, INTENT, intent, 10).await;
        mount_stage(
            server,
            EMOTION,
            json!({
                "inferredMode": "Hopeful",
                "inferredEnergy": "Balanced",
                "energyShape": "Rising",
                "sentimentAI": "Mixed"
            }),
            10,
        )
        .await;
        mount_stage(
            server,
            THEME,
            json!({ "themeTagsAI": ["friendship", "recovery"], "contradiction": null, "loops": null }),
            10,
        )
        .await;
        mount_stage(
            server,
            INSIGHT,
            json!({
                "summaryAI": "A hard start that eased.",
                "actionableInsightsAI": "Notice what helped.",
                "nextAction": "Message your friend."
            }),
            10,
        )
        .await;
    }

    fn request(text: &str) -> ProcessRequest {
        ProcessRequest {
            text: text.to_string(),
            overrides: Overrides::default(),
            auto_decompose: true,
            date: None,
            now: Utc.with_ymd_and_hms(2026, 3, 9, 14, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_process_entry_stores_validated_fields() {
        let server = MockServer::start().await;
        mount_happy_path(
            &server,
            json!({
                "type": "Social",
                "format": "Quick Log",
                "isConsolidated": false,
                "name": "Lunch Turned It Around",
                "snapshot": "A rough morning eased after lunch with a friend."
            }),
        )
        .await;
        let ctx = context_for(&server);
        let store = MemoryStore::new();

        let text = "Had a rough morning but felt better after lunch with a friend.";
        let outcome = process_entry(&ctx, &store, request(text)).await.unwrap();

        let a = &outcome.entry.analysis;
        assert_eq!(a.entry_type, EntryType::Social);
        assert_eq!(a.name, "Lunch Turned It Around");
        assert_eq!(a.sentiment, Sentiment::Neutral);
        assert_eq!(a.inferred_mode, InferredMode::Hopeful);
        assert_eq!(a.word_count, 12);
        assert_eq!(a.tokens_used, 40);
        assert_eq!(outcome.tokens_used, 40);
        assert_eq!(outcome.entry.meta_flag, META_FLAG_WEB);
        assert_eq!(outcome.entry.date, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        assert!(outcome.decomposition.is_none());
        assert!(!outcome.decomposed());
        assert!(store.get(outcome.entry.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_valid_override_wins_and_invalid_is_ignored_upstream() {
        let server = MockServer::start().await;
        mount_happy_path(&server, json!({ "type": "Work", "format": "Quick Log" })).await;
        let ctx = context_for(&server);

        let run = run_analysis(
            &ctx,
            "text",
            Overrides {
                entry_type: Some(EntryType::Health),
                format: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(run.intent.entry_type, EntryType::Health);
        assert_eq!(run.intent.format, EntryFormat::QuickLog);
    }

    #[tokio::test]
    async fn test_token_total_saturates() {
        let server = MockServer::start().await;
        mount_stage(&server, INTENT, json!({ "type": "Work" }), i32::MAX).await;
        mount_stage(&server, EMOTION, json!({ "sentimentAI": "Positive" }), i32::MAX).await;
        mount_stage(&server, THEME, json!({ "themeTagsAI": ["work"] }), i32::MAX).await;
        mount_stage(&server, INSIGHT, json!({ "summaryAI": "ok" }), i32::MAX).await;
        let ctx = context_for(&server);

        let run = run_analysis(&ctx, "text", Overrides::default()).await.unwrap();
        assert_eq!(run.tokens_used, i32::MAX);
    }

    #[tokio::test]
    async fn test_stage_failure_persists_nothing() {
        let server = MockServer::start().await;
        mount_stage(&server, INTENT, json!({ "type": "Work" }), 5).await;
        Mock::given(method("POST"))
            .and(body_string_contains(EMOTION))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;
        let ctx = context_for(&server);
        let store = MemoryStore::new();

        let err = process_entry(&ctx, &store, request("text")).await.unwrap_err();
        match err {
            ProcessError::Pipeline(PipelineError { stage, .. }) => assert_eq!(stage, Stage::Emotion),
            other => panic!("expected pipeline error, got {:?}", other),
        }

        let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert!(store.list_by_date_range(day, day).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consolidated_entry_creates_children() {
        let server = MockServer::start().await;
        mount_stage(
            &server,
            DECOMPOSE,
            json!({
                "shouldDecompose": true,
                "eventCount": 2,
                "events": [
                    { "text": "Morning standup ran long.", "sequenceOrder": 1, "approximateTime": "morning", "suggestedType": "Work" },
                    { "text": "Dinner with my sister.", "sequenceOrder": 2, "approximateTime": "evening" }
                ],
                "overarchingTheme": "A busy day"
            }),
            7,
        )
        .await;
        mount_happy_path(
            &server,
            json!({ "type": "Reflection", "format": "End of Day", "isConsolidated": true }),
        )
        .await;
        let ctx = context_for(&server);
        let store = MemoryStore::new();

        let outcome = process_entry(&ctx, &store, request("Morning standup ran long. Dinner with my sister."))
            .await
            .unwrap();

        assert!(outcome.decomposed());
        assert_eq!(outcome.tokens_used, 47);
        assert_eq!(outcome.entry.lineage.decomposition_count, 2);
        assert_eq!(outcome.entry.lineage.overarching_theme.as_deref(), Some("A busy day"));
        assert_eq!(outcome.children.len(), 2);

        let first = &outcome.children[0];
        assert_eq!(first.lineage.parent_id, Some(outcome.entry.id));
        assert_eq!(first.lineage.sequence_order, Some(1));
        assert_eq!(first.lineage.approximate_time.as_deref(), Some("morning"));
        assert_eq!(first.analysis.entry_type, EntryType::Work);
        assert_eq!(first.analysis.format, EntryFormat::DailyLog);
        assert_eq!(first.meta_flag, META_FLAG_DECOMPOSED);
        // no suggested type: the classifier's answer stands
        assert_eq!(outcome.children[1].analysis.entry_type, EntryType::Reflection);
    }

    #[tokio::test]
    async fn test_auto_decompose_off_skips_decomposition() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains(DECOMPOSE))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        mount_happy_path(&server, json!({ "format": "Consolidated", "isConsolidated": true })).await;
        let ctx = context_for(&server);
        let store = MemoryStore::new();

        let mut req = request("several things happened");
        req.auto_decompose = false;
        let outcome = process_entry(&ctx, &store, req).await.unwrap();
        assert!(outcome.decomposition.is_none());
        assert!(outcome.children.is_empty());
    }

    #[tokio::test]
    async fn test_decomposition_failure_fails_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains(DECOMPOSE))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        mount_happy_path(&server, json!({ "format": "End of Day" })).await;
        let ctx = context_for(&server);
        let store = MemoryStore::new();

        let err = process_entry(&ctx, &store, request("a long day")).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Pipeline(PipelineError {
                stage: Stage::Decomposition,
                ..
            })
        ));
        let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert!(store.list_by_date_range(day, day).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_preserves_identity_and_unknown_id_is_not_found() {
        let server = MockServer::start().await;
        mount_happy_path(&server, json!({ "type": "Work", "name": "Edited" })).await;
        let ctx = context_for(&server);
        let store = MemoryStore::new();

        let created = process_entry(&ctx, &store, request("first draft")).await.unwrap().entry;
        let (edited, _) = edit_entry(&ctx, &store, created.id, "second draft here", Overrides::default())
            .await
            .unwrap();

        assert_eq!(edited.id, created.id);
        assert_eq!(edited.timestamp, created.timestamp);
        assert_eq!(edited.text, "second draft here");
        assert_eq!(edited.analysis.word_count, 3);

        let missing = edit_entry(&ctx, &store, Uuid::new_v4(), "x", Overrides::default()).await;
        assert!(matches!(missing, Err(ProcessError::Store(StoreError::NotFound(_)))));
    }
}
