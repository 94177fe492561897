use reverie_core::llm::{CallOptions, LlmError};
use reverie_core::models::JournalEntry;
use reverie_core::period::WeekId;
use reverie_core::vocab::{coerce_string_list, string_or, validate_or_default, MoodTrend, Vocabulary};
use serde::Serialize;

use super::stats::{avg_per_day, calculate_stats, format_distribution, ranked, top_n, TOP_THEMES, UNKNOWN};
use super::{AgentContext, Generated};

pub const MAX_TOKENS: u32 = 1500;
pub const MAX_RECOMMENDATIONS: usize = 3;

pub const DEFAULT_NARRATIVE: &str = "No summary generated.";
pub const DEFAULT_INSIGHT: &str = "Continue journaling to build patterns.";
pub const DEFAULT_NEXT_FOCUS: &str = "Maintain your journaling practice.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyOutput {
    pub narrative: String,
    pub mood_trend: MoodTrend,
    pub weekly_insight: String,
    pub recommendations: Vec<String>,
    pub next_week_focus: String,
}

fn system_prompt() -> String {
    format!(
        r#"You are an insightful weekly journal analyst who synthesizes patterns across multiple journal entries to provide meaningful insights.

You MUST respond with valid JSON only. No other text.

Guidelines:
- "narrative": A 2-3 paragraph summary capturing the week's emotional journey, key themes, and patterns. Write in second person ("You...") addressing the journal writer directly. Be warm but insightful.
- "moodTrend": One of: {trends}
  - "improving": Overall positive trajectory across the week
  - "declining": Overall negative trajectory
  - "stable": Consistent mood throughout
  - "volatile": Frequent ups and downs
- "weeklyInsight": One key observation about patterns this week (1-2 sentences)
- "recommendations": 3 specific, actionable suggestions based on the week's patterns
- "nextWeekFocus": The single most important priority for next week (1 sentence)"#,
        trends = MoodTrend::joined()
    )
}

fn entry_lines(entries: &[JournalEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let a = &e.analysis;
            let themes = if a.theme_tags.is_empty() {
                "None".to_string()
            } else {
                a.theme_tags.join(", ")
            };
            let mut line = format!(
                "- [{}] \"{}\"\n  Mode: {} | Energy: {} | Sentiment: {}\n  Snapshot: {}\n  Themes: {}",
                e.date, a.name, a.inferred_mode, a.energy_shape, a.sentiment, a.snapshot, themes
            );
            if let Some(c) = a.contradiction {
                line.push_str(&format!("\n  Tension: {}", c));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Narrative for one ISO week. `entries` must be non-empty.
pub async fn generate_weekly_summary(
    ctx: &AgentContext,
    entries: &[JournalEntry],
    week: WeekId,
) -> Result<Generated<WeeklyOutput>, LlmError> {
    let stats = calculate_stats(entries);
    let modes = ranked(&stats.mode_distribution);
    let (top_mode, top_mode_count) = modes.first().copied().unwrap_or((UNKNOWN, 0));
    let themes = top_n(&stats.theme_frequency, TOP_THEMES);
    let top_contradiction = ranked(&stats.contradictions).first().map(|(k, _)| *k);
    let b = &stats.sentiment;

    let prompt = format!(
        r#"Analyze this week's journal entries and generate a weekly summary.

## Week: {range} ({week})
## Total Entries: {count}

## Entry Summaries:
{lines}

## Aggregated Statistics:
- Dominant Mode: {top_mode} ({top_mode_count} entries)
- Mode Distribution: {modes}
- Top Themes: {themes}
- Sentiment Breakdown: {pos} positive, {neg} negative, {neu} neutral
- Positive Ratio: {ratio:.1}%
- Top Contradiction: {contradiction}
- Avg Entries/Day: {avg:.1}

## Task:
Generate a comprehensive weekly summary with:
1. narrative: 2-3 paragraph summary of the week's emotional journey (write in second person)
2. moodTrend: "improving" | "declining" | "stable" | "volatile"
3. weeklyInsight: One key observation about patterns this week
4. recommendations: Array of 3 specific, actionable suggestions
5. nextWeekFocus: Single most important priority for next week

Respond with JSON only."#,
        range = week.display_range(),
        count = stats.entry_count,
        lines = entry_lines(entries),
        modes = format_distribution(&modes),
        themes = if themes.is_empty() {
            "None identified".to_string()
        } else {
            themes.join(", ")
        },
        pos = b.positive,
        neg = b.negative,
        neu = b.neutral,
        ratio = stats.positive_ratio,
        contradiction = top_contradiction.unwrap_or("None recurring"),
        avg = avg_per_day(&stats),
    );

    let response = ctx
        .llm
        .complete_json(
            &prompt,
            &ctx.models.balanced,
            Some(&system_prompt()),
            CallOptions::max_tokens(MAX_TOKENS),
        )
        .await?;
    let data = &response.data;

    let output = WeeklyOutput {
        narrative: string_or(&data["narrative"], DEFAULT_NARRATIVE),
        mood_trend: validate_or_default(&data["moodTrend"]),
        weekly_insight: string_or(&data["weeklyInsight"], DEFAULT_INSIGHT),
        recommendations: coerce_string_list(&data["recommendations"], MAX_RECOMMENDATIONS),
        next_week_focus: string_or(&data["nextWeekFocus"], DEFAULT_NEXT_FOCUS),
    };

    Ok(Generated {
        output,
        stats,
        tokens_used: response.tokens_used,
        model: response.model,
    })
}
