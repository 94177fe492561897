use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vocab::{MoodTrend, Sentiment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Daily => "daily",
            PeriodKind::Weekly => "weekly",
            PeriodKind::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(PeriodKind::Daily),
            "weekly" => Some(PeriodKind::Weekly),
            "monthly" => Some(PeriodKind::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: u32,
    pub negative: u32,
    pub neutral: u32,
}

impl SentimentBreakdown {
    pub fn total(&self) -> u32 {
        self.positive + self.negative + self.neutral
    }
}

/// A generated period summary as persisted in the cache.
///
/// `insight`, `next_focus` and `avg_entries` are the weekly/monthly flavours of
/// the same field (`weeklyInsight`/`monthlyInsight`, entries per day/week).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub id: Uuid,
    pub kind: PeriodKind,
    pub period_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub entry_count: i32,
    pub narrative: String,
    pub mood_trend: Option<MoodTrend>,
    pub insight: Option<String>,
    pub highlight: Option<String>,
    pub recommendations: Vec<String>,
    pub next_focus: Option<String>,
    pub dominant_mode: Option<String>,
    pub dominant_energy: Option<String>,
    pub dominant_sentiment: Option<Sentiment>,
    pub top_themes: Vec<String>,
    pub top_contradiction: Option<String>,
    pub positive_ratio: f64,
    pub avg_entries: f64,
    pub active_days: i32,
    pub active_weeks: i32,
    pub sentiment_breakdown: SentimentBreakdown,
    pub tokens_used: i32,
    pub model: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Everything in a [`PeriodSummary`] except its storage identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDraft {
    pub kind: PeriodKind,
    pub period_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub entry_count: i32,
    pub narrative: String,
    pub mood_trend: Option<MoodTrend>,
    pub insight: Option<String>,
    pub highlight: Option<String>,
    pub recommendations: Vec<String>,
    pub next_focus: Option<String>,
    pub dominant_mode: Option<String>,
    pub dominant_energy: Option<String>,
    pub dominant_sentiment: Option<Sentiment>,
    pub top_themes: Vec<String>,
    pub top_contradiction: Option<String>,
    pub positive_ratio: f64,
    pub avg_entries: f64,
    pub active_days: i32,
    pub active_weeks: i32,
    pub sentiment_breakdown: SentimentBreakdown,
    pub tokens_used: i32,
    pub model: Option<String>,
}

impl SummaryDraft {
    pub fn into_summary(self, id: Uuid, generated_at: DateTime<Utc>) -> PeriodSummary {
        PeriodSummary {
            id,
            kind: self.kind,
            period_id: self.period_id,
            period_start: self.period_start,
            period_end: self.period_end,
            entry_count: self.entry_count,
            narrative: self.narrative,
            mood_trend: self.mood_trend,
            insight: self.insight,
            highlight: self.highlight,
            recommendations: self.recommendations,
            next_focus: self.next_focus,
            dominant_mode: self.dominant_mode,
            dominant_energy: self.dominant_energy,
            dominant_sentiment: self.dominant_sentiment,
            top_themes: self.top_themes,
            top_contradiction: self.top_contradiction,
            positive_ratio: self.positive_ratio,
            avg_entries: self.avg_entries,
            active_days: self.active_days,
            active_weeks: self.active_weeks,
            sentiment_breakdown: self.sentiment_breakdown,
            tokens_used: self.tokens_used,
            model: self.model,
            generated_at,
        }
    }
}
