//! Period summaries with a per-period cache.
//!
//! Weekly and monthly summaries are cached by `(kind, period_id)`:
//!
//! - no row: compute stats, call the model once, upsert a row
//! - row, `regenerate == false`: return the row, no model call
//! - row, `regenerate == true`: recompute and overwrite the same row
//!
//! A period with no entries returns an empty shape and writes nothing. A model
//! failure writes nothing. A failed cache write is logged and the fresh
//! summary is still returned with `summaryId: null`. Daily summaries are
//! regenerated on every request and never cached.

use chrono::{DateTime, NaiveDate, Utc};
use reverie_core::llm::LlmError;
use reverie_core::models::{PeriodKind, PeriodSummary, SentimentBreakdown, SummaryDraft};
use reverie_core::period::{display_day, MonthId, WeekId};
use reverie_core::store::{Store, StoreError};
use reverie_core::vocab::{MoodTrend, Sentiment};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::agents::daily::generate_daily_summary;
use crate::agents::monthly::generate_monthly_summary;
use crate::agents::stats::{
    avg_per_day, avg_per_week, dominant, dominant_sentiment, top_n, PeriodStats, TOP_THEMES,
};
use crate::agents::weekly::generate_weekly_summary;
use crate::agents::AgentContext;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummaryView {
    pub date: NaiveDate,
    pub display_date: String,
    pub entry_count: usize,
    pub narrative: Option<String>,
    pub mood_summary: Option<String>,
    pub energy_pattern: Option<String>,
    pub key_takeaway: Option<String>,
    pub evening_reflection: Option<String>,
    pub dominant_mode: Option<String>,
    pub dominant_sentiment: Option<Sentiment>,
    pub themes: Vec<String>,
    pub tokens_used: i32,
    pub model: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl DailySummaryView {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            display_date: display_day(date),
            entry_count: 0,
            narrative: None,
            mood_summary: None,
            energy_pattern: None,
            key_takeaway: None,
            evening_reflection: None,
            dominant_mode: None,
            dominant_sentiment: None,
            themes: Vec::new(),
            tokens_used: 0,
            model: None,
            generated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummaryView {
    pub week_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub week_range: String,
    pub entry_count: i32,
    pub narrative: Option<String>,
    pub mood_trend: Option<MoodTrend>,
    pub dominant_mode: Option<String>,
    pub dominant_energy: Option<String>,
    pub dominant_sentiment: Option<Sentiment>,
    pub top_themes: Vec<String>,
    pub top_contradiction: Option<String>,
    pub weekly_insight: Option<String>,
    pub recommendations: Vec<String>,
    pub next_week_focus: Option<String>,
    pub positive_ratio: f64,
    pub avg_entries_per_day: f64,
    pub sentiment_breakdown: SentimentBreakdown,
    pub tokens_used: i32,
    pub model: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub cached: bool,
    pub summary_id: Option<Uuid>,
}

impl WeeklySummaryView {
    fn empty(week: WeekId) -> Self {
        let (start, end) = week.range();
        Self {
            week_id: week.to_string(),
            week_start: start,
            week_end: end,
            week_range: week.display_range(),
            entry_count: 0,
            narrative: None,
            mood_trend: None,
            dominant_mode: None,
            dominant_energy: None,
            dominant_sentiment: None,
            top_themes: Vec::new(),
            top_contradiction: None,
            weekly_insight: None,
            recommendations: Vec::new(),
            next_week_focus: None,
            positive_ratio: 0.0,
            avg_entries_per_day: 0.0,
            sentiment_breakdown: SentimentBreakdown::default(),
            tokens_used: 0,
            model: None,
            generated_at: None,
            cached: false,
            summary_id: None,
        }
    }

    fn from_summary(week: WeekId, s: PeriodSummary, cached: bool, summary_id: Option<Uuid>) -> Self {
        Self {
            week_id: week.to_string(),
            week_start: s.period_start,
            week_end: s.period_end,
            week_range: week.display_range(),
            entry_count: s.entry_count,
            narrative: Some(s.narrative),
            mood_trend: s.mood_trend,
            dominant_mode: s.dominant_mode,
            dominant_energy: s.dominant_energy,
            dominant_sentiment: s.dominant_sentiment,
            top_themes: s.top_themes,
            top_contradiction: s.top_contradiction,
            weekly_insight: s.insight,
            recommendations: s.recommendations,
            next_week_focus: s.next_focus,
            positive_ratio: s.positive_ratio,
            avg_entries_per_day: s.avg_entries,
            sentiment_breakdown: s.sentiment_breakdown,
            tokens_used: if cached { 0 } else { s.tokens_used },
            model: s.model,
            generated_at: Some(s.generated_at),
            cached,
            summary_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummaryView {
    pub month_id: String,
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
    pub month_range: String,
    pub entry_count: i32,
    pub active_days: i32,
    pub active_weeks: i32,
    pub narrative: Option<String>,
    pub mood_trend: Option<MoodTrend>,
    pub dominant_mode: Option<String>,
    pub dominant_energy: Option<String>,
    pub dominant_sentiment: Option<Sentiment>,
    pub top_themes: Vec<String>,
    pub top_contradiction: Option<String>,
    pub monthly_insight: Option<String>,
    pub month_highlight: Option<String>,
    pub recommendations: Vec<String>,
    pub next_month_focus: Option<String>,
    pub positive_ratio: f64,
    pub avg_entries_per_week: f64,
    pub sentiment_breakdown: SentimentBreakdown,
    pub tokens_used: i32,
    pub model: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub cached: bool,
    pub summary_id: Option<Uuid>,
}

impl MonthlySummaryView {
    fn empty(month: MonthId) -> Self {
        let (start, end) = month.range();
        Self {
            month_id: month.to_string(),
            month_start: start,
            month_end: end,
            month_range: month.display_range(),
            entry_count: 0,
            active_days: 0,
            active_weeks: 0,
            narrative: None,
            mood_trend: None,
            dominant_mode: None,
            dominant_energy: None,
            dominant_sentiment: None,
            top_themes: Vec::new(),
            top_contradiction: None,
            monthly_insight: None,
            month_highlight: None,
            recommendations: Vec::new(),
            next_month_focus: None,
            positive_ratio: 0.0,
            avg_entries_per_week: 0.0,
            sentiment_breakdown: SentimentBreakdown::default(),
            tokens_used: 0,
            model: None,
            generated_at: None,
            cached: false,
            summary_id: None,
        }
    }

    fn from_summary(month: MonthId, s: PeriodSummary, cached: bool, summary_id: Option<Uuid>) -> Self {
        Self {
            month_id: month.to_string(),
            month_start: s.period_start,
            month_end: s.period_end,
            month_range: month.display_range(),
            entry_count: s.entry_count,
            active_days: s.active_days,
            active_weeks: s.active_weeks,
            narrative: Some(s.narrative),
            mood_trend: s.mood_trend,
            dominant_mode: s.dominant_mode,
            dominant_energy: s.dominant_energy,
            dominant_sentiment: s.dominant_sentiment,
            top_themes: s.top_themes,
            top_contradiction: s.top_contradiction,
            monthly_insight: s.insight,
            month_highlight: s.highlight,
            recommendations: s.recommendations,
            next_month_focus: s.next_focus,
            positive_ratio: s.positive_ratio,
            avg_entries_per_week: s.avg_entries,
            sentiment_breakdown: s.sentiment_breakdown,
            tokens_used: if cached { 0 } else { s.tokens_used },
            model: s.model,
            generated_at: Some(s.generated_at),
            cached,
            summary_id,
        }
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Statistics-derived part of a cache row. Callers fill in the model output.
/// Narrow a count to the stored column type, clamping at `i32::MAX`.
fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn base_draft(
    kind: PeriodKind,
    period_id: String,
    (start, end): (NaiveDate, NaiveDate),
    stats: &PeriodStats,
    tokens_used: i32,
    model: String,
) -> SummaryDraft {
    SummaryDraft {
        kind,
        period_id,
        period_start: start,
        period_end: end,
        entry_count: count(stats.entry_count),
        narrative: String::new(),
        mood_trend: None,
        insight: None,
        highlight: None,
        recommendations: Vec::new(),
        next_focus: None,
        dominant_mode: dominant(&stats.mode_distribution),
        dominant_energy: dominant(&stats.energy_shapes),
        dominant_sentiment: Some(dominant_sentiment(&stats.sentiment)),
        top_themes: top_n(&stats.theme_frequency, TOP_THEMES),
        top_contradiction: dominant(&stats.contradictions),
        positive_ratio: stats.positive_ratio,
        avg_entries: 0.0,
        active_days: count(stats.active_days),
        active_weeks: 0,
        sentiment_breakdown: stats.sentiment,
        tokens_used,
        model: Some(model),
    }
}

/// Write `draft` to the cache. On failure the summary is still returned,
/// without an id.
async fn persist(store: &dyn Store, draft: SummaryDraft) -> (PeriodSummary, Option<Uuid>) {
    let kind = draft.kind;
    let period_id = draft.period_id.clone();
    match store.upsert(draft.clone()).await {
        Ok(saved) => {
            tracing::info!(kind = kind.as_str(), %period_id, summary_id = %saved.id, "Cached period summary");
            let id = saved.id;
            (saved, Some(id))
        }
        Err(e) => {
            tracing::error!(kind = kind.as_str(), %period_id, error = %e, "Failed to cache period summary");
            (draft.into_summary(Uuid::new_v4(), Utc::now()), None)
        }
    }
}

/// Summary for one day, always freshly generated.
pub async fn daily_summary(
    ctx: &AgentContext,
    store: &dyn Store,
    date: NaiveDate,
) -> Result<DailySummaryView, SummaryError> {
    let entries = store.list_by_date_range(date, date).await?;
    if entries.is_empty() {
        return Ok(DailySummaryView::empty(date));
    }

    tracing::info!(%date, entries = entries.len(), "Generating daily summary");
    let g = generate_daily_summary(ctx, &entries, date).await?;
    let stats = &g.stats;

    Ok(DailySummaryView {
        date,
        display_date: display_day(date),
        entry_count: stats.entry_count,
        narrative: Some(g.output.narrative),
        mood_summary: Some(g.output.mood_summary),
        energy_pattern: Some(g.output.energy_pattern),
        key_takeaway: Some(g.output.key_takeaway),
        evening_reflection: Some(g.output.evening_reflection),
        dominant_mode: dominant(&stats.mode_distribution),
        dominant_sentiment: Some(dominant_sentiment(&stats.sentiment)),
        themes: top_n(&stats.theme_frequency, TOP_THEMES),
        tokens_used: g.tokens_used,
        model: Some(g.model),
        generated_at: Some(Utc::now()),
    })
}

pub async fn weekly_summary(
    ctx: &AgentContext,
    store: &dyn Store,
    week: WeekId,
    regenerate: bool,
) -> Result<WeeklySummaryView, SummaryError> {
    let period_id = week.to_string();

    if !regenerate {
        if let Some(cached) = store.find(PeriodKind::Weekly, &period_id).await? {
            tracing::info!(week = %period_id, "Serving cached weekly summary");
            let id = cached.id;
            return Ok(WeeklySummaryView::from_summary(week, cached, true, Some(id)));
        }
    }

    let (start, end) = week.range();
    let entries = store.list_by_date_range(start, end).await?;
    if entries.is_empty() {
        return Ok(WeeklySummaryView::empty(week));
    }

    tracing::info!(week = %period_id, entries = entries.len(), regenerate, "Generating weekly summary");
    let g = generate_weekly_summary(ctx, &entries, week).await?;

    let mut draft = base_draft(
        PeriodKind::Weekly,
        period_id,
        (start, end),
        &g.stats,
        g.tokens_used,
        g.model,
    );
    draft.narrative = g.output.narrative;
    draft.mood_trend = Some(g.output.mood_trend);
    draft.insight = Some(g.output.weekly_insight);
    draft.recommendations = g.output.recommendations;
    draft.next_focus = Some(g.output.next_week_focus);
    draft.avg_entries = avg_per_day(&g.stats);
    draft.active_weeks = 1;

    let (summary, summary_id) = persist(store, draft).await;
    Ok(WeeklySummaryView::from_summary(week, summary, false, summary_id))
}

pub async fn monthly_summary(
    ctx: &AgentContext,
    store: &dyn Store,
    month: MonthId,
    regenerate: bool,
) -> Result<MonthlySummaryView, SummaryError> {
    let period_id = month.to_string();

    if !regenerate {
        if let Some(cached) = store.find(PeriodKind::Monthly, &period_id).await? {
            tracing::info!(month = %period_id, "Serving cached monthly summary");
            let id = cached.id;
            return Ok(MonthlySummaryView::from_summary(month, cached, true, Some(id)));
        }
    }

    let (start, end) = month.range();
    let entries = store.list_by_date_range(start, end).await?;
    if entries.is_empty() {
        return Ok(MonthlySummaryView::empty(month));
    }

    tracing::info!(month = %period_id, entries = entries.len(), regenerate, "Generating monthly summary");
    let m = generate_monthly_summary(ctx, &entries, month).await?;
    let g = m.generated;

    let mut draft = base_draft(
        PeriodKind::Monthly,
        period_id,
        (start, end),
        &g.stats,
        g.tokens_used,
        g.model,
    );
    draft.narrative = g.output.narrative;
    draft.mood_trend = Some(g.output.mood_trend);
    draft.insight = Some(g.output.monthly_insight);
    draft.highlight = Some(g.output.month_highlight);
    draft.recommendations = g.output.recommendations;
    draft.next_focus = Some(g.output.next_month_focus);
    draft.avg_entries = avg_per_week(&g.stats);
    draft.active_weeks = count(m.active_weeks);

    let (summary, summary_id) = persist(store, draft).await;
    Ok(MonthlySummaryView::from_summary(month, summary, false, summary_id))
}
