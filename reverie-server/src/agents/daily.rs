use chrono::NaiveDate;
use reverie_core::llm::{CallOptions, LlmError};
use reverie_core::models::JournalEntry;
use reverie_core::period::display_day;
use reverie_core::vocab::string_or;
use serde::Serialize;

use super::stats::{calculate_stats, dominant, dominant_sentiment, top_n, TOP_THEMES, UNKNOWN};
use super::{AgentContext, Generated};

/// Most recent entries included in the prompt.
pub const MAX_PROMPT_ENTRIES: usize = 10;
pub const MAX_TOKENS: u32 = 500;

pub const DEFAULT_NARRATIVE: &str = "No summary generated.";
pub const DEFAULT_MOOD_SUMMARY: &str = "Mixed feelings throughout the day.";
pub const DEFAULT_ENERGY_PATTERN: &str = "Energy varied throughout the day.";
pub const DEFAULT_KEY_TAKEAWAY: &str = "Every day brings new insights.";
pub const DEFAULT_EVENING_REFLECTION: &str = "What made today meaningful?";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyOutput {
    pub narrative: String,
    pub mood_summary: String,
    pub energy_pattern: String,
    pub key_takeaway: String,
    pub evening_reflection: String,
}

const SYSTEM_PROMPT: &str = r#"You are an insightful daily journal analyst who synthesizes patterns from a day's journal entries to provide meaningful insights.

You MUST respond with valid JSON only. No other text.

Guidelines:
- "narrative": A 1-2 paragraph summary capturing the day's emotional journey. Write in second person ("You...") addressing the journal writer directly. Be warm but insightful.
- "moodSummary": Brief description of the overall emotional tone (1 sentence)
- "energyPattern": How energy flowed through the day (1 sentence)
- "keyTakeaway": The single most important insight from today (1 sentence)
- "eveningReflection": A thoughtful question or prompt for evening reflection"#;

fn entry_lines(entries: &[JournalEntry]) -> String {
    let mut recent: Vec<&JournalEntry> = entries.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent
        .into_iter()
        .take(MAX_PROMPT_ENTRIES)
        .map(|e| {
            let a = &e.analysis;
            let themes = if a.theme_tags.is_empty() {
                "None".to_string()
            } else {
                a.theme_tags.join(", ")
            };
            format!(
                "- [{}] \"{}\"\n  Mode: {} | Energy: {} | Sentiment: {}\n  Snapshot: {}\n  Themes: {}",
                e.timestamp.format("%-I:%M %p"),
                a.name,
                a.inferred_mode,
                a.energy_shape,
                a.sentiment,
                a.snapshot,
                themes
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Narrative for one day's entries. `entries` must be non-empty.
pub async fn generate_daily_summary(
    ctx: &AgentContext,
    entries: &[JournalEntry],
    date: NaiveDate,
) -> Result<Generated<DailyOutput>, LlmError> {
    let stats = calculate_stats(entries);
    let dominant_mode = dominant(&stats.mode_distribution).unwrap_or_else(|| UNKNOWN.to_string());
    let themes = top_n(&stats.theme_frequency, TOP_THEMES);
    let b = &stats.sentiment;

    let prompt = format!(
        r#"Analyze today's journal entries and generate a daily summary.

## Date: {date}
## Total Entries: {count}

## Entries (most recent first):
{lines}

## Quick Stats:
- Dominant Mode: {dominant_mode}
- Overall Sentiment: {sentiment} ({pos} positive, {neg} negative, {neu} neutral)
- Themes: {themes}

## Task:
Generate a thoughtful daily summary with:
1. narrative: 1-2 paragraph summary of the day's emotional journey (write in second person)
2. moodSummary: Brief description of overall emotional tone (1 sentence)
3. energyPattern: How energy flowed through the day (1 sentence)
4. keyTakeaway: Single most important insight from today
5. eveningReflection: A thoughtful question or prompt for reflection

Respond with JSON only."#,
        date = display_day(date),
        count = stats.entry_count,
        lines = entry_lines(entries),
        sentiment = dominant_sentiment(b),
        pos = b.positive,
        neg = b.negative,
        neu = b.neutral,
        themes = if themes.is_empty() {
            "None identified".to_string()
        } else {
            themes.join(", ")
        },
    );

    let response = ctx
        .llm
        .complete_json(
            &prompt,
            &ctx.models.cheap,
            Some(SYSTEM_PROMPT),
            CallOptions::max_tokens(MAX_TOKENS),
        )
        .await?;
    let data = &response.data;

    let output = DailyOutput {
        narrative: string_or(&data["narrative"], DEFAULT_NARRATIVE),
        mood_summary: string_or(&data["moodSummary"], DEFAULT_MOOD_SUMMARY),
        energy_pattern: string_or(&data["energyPattern"], DEFAULT_ENERGY_PATTERN),
        key_takeaway: string_or(&data["keyTakeaway"], DEFAULT_KEY_TAKEAWAY),
        evening_reflection: string_or(&data["eveningReflection"], DEFAULT_EVENING_REFLECTION),
    };

    Ok(Generated {
        output,
        stats,
        tokens_used: response.tokens_used,
        model: response.model,
    })
}
