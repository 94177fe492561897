use reverie_core::llm::{CallOptions, LlmError};
use reverie_core::models::JournalEntry;
use reverie_core::period::MonthId;
use reverie_core::vocab::{coerce_string_list, string_or, validate_or_default, MoodTrend, Vocabulary};
use serde::Serialize;

use super::stats::{
    avg_per_week, calculate_stats, format_distribution, ranked, top_n, week_buckets, WeekBucket,
    UNKNOWN,
};
use super::{truncate_chars, AgentContext, Generated};

pub const MAX_TOKENS: u32 = 2000;
pub const MAX_RECOMMENDATIONS: usize = 3;
/// Most recent entries shown as snapshots in the prompt.
pub const MAX_PROMPT_ENTRIES: usize = 30;
pub const SNAPSHOT_CHARS: usize = 100;
pub const PROMPT_THEMES: usize = 7;

pub const DEFAULT_NARRATIVE: &str = "No summary generated.";
pub const DEFAULT_INSIGHT: &str = "Continue journaling to build monthly patterns.";
pub const DEFAULT_HIGHLIGHT: &str = "Keep reflecting on your growth.";
pub const DEFAULT_NEXT_FOCUS: &str = "Maintain your journaling practice.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyOutput {
    pub narrative: String,
    pub mood_trend: MoodTrend,
    pub monthly_insight: String,
    pub month_highlight: String,
    pub recommendations: Vec<String>,
    pub next_month_focus: String,
}

/// Monthly generation also reports how many ISO weeks had entries.
#[derive(Debug, Clone)]
pub struct MonthlyGenerated {
    pub generated: Generated<MonthlyOutput>,
    pub active_weeks: usize,
}

fn system_prompt() -> String {
    format!(
        r#"You are an insightful monthly journal analyst who synthesizes patterns across an entire month of journal entries to provide meaningful insights.

You MUST respond with valid JSON only. No other text.

Guidelines:
- "narrative": A 3-4 paragraph summary capturing the month's emotional arc, key themes, breakthroughs, and challenges. Write in second person ("You...") addressing the journal writer directly. Be warm and insightful, celebrate growth while gently noting areas for attention.
- "moodTrend": One of: {trends}
  - "improving": Overall positive trajectory across the month
  - "declining": Overall negative trajectory
  - "stable": Consistent mood throughout
  - "volatile": Frequent ups and downs
- "monthlyInsight": One key observation about patterns this month (2-3 sentences)
- "monthHighlight": The most notable moment, achievement, or theme of the month (1 sentence)
- "recommendations": 3 specific, actionable suggestions based on the month's patterns
- "nextMonthFocus": The single most important priority for next month (1 sentence)"#,
        trends = MoodTrend::joined()
    )
}

fn week_overview(buckets: &[WeekBucket]) -> String {
    buckets
        .iter()
        .map(|b| {
            format!(
                "Week {} ({} entries): Dominant mode: {}, Sentiment: {}+ / {}-",
                b.week.week, b.count, b.dominant_mode, b.positive, b.negative
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn snapshot_lines(entries: &[JournalEntry]) -> String {
    let mut recent: Vec<&JournalEntry> = entries.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent
        .into_iter()
        .take(MAX_PROMPT_ENTRIES)
        .map(|e| {
            format!(
                "- [{}] {}: {}...",
                e.date,
                e.analysis.name,
                truncate_chars(&e.analysis.snapshot, SNAPSHOT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Narrative for one calendar month. `entries` must be non-empty.
pub async fn generate_monthly_summary(
    ctx: &AgentContext,
    entries: &[JournalEntry],
    month: MonthId,
) -> Result<MonthlyGenerated, LlmError> {
    let stats = calculate_stats(entries);
    let buckets = week_buckets(entries);
    let modes = ranked(&stats.mode_distribution);
    let (top_mode, top_mode_count) = modes.first().copied().unwrap_or((UNKNOWN, 0));
    let theme_counts = ranked(&stats.theme_frequency);
    let themes = top_n(&stats.theme_frequency, PROMPT_THEMES);
    let contradiction = match ranked(&stats.contradictions).first() {
        Some((name, count)) => format!("{} ({} times)", name, count),
        None => "None recurring".to_string(),
    };
    let b = &stats.sentiment;

    let prompt = format!(
        r#"Analyze this month's journal entries and generate a comprehensive monthly summary.

## Month: {range} ({month})
## Total Entries: {count}
## Active Days: {days}
## Active Weeks: {weeks}

## Weekly Overview:
{overview}

## Entry Snapshots (most recent first):
{snapshots}

## Aggregated Statistics:
- Dominant Mode: {top_mode} ({top_mode_count} entries)
- Mode Distribution: {modes}
- Top Themes: {themes}
- Theme Counts: {theme_counts}
- Sentiment Breakdown: {pos} positive, {neg} negative, {neu} neutral
- Positive Ratio: {ratio:.1}%
- Top Contradiction: {contradiction}
- Avg Entries/Week: {avg:.1}

## Task:
Generate a comprehensive monthly summary with:
1. narrative: 3-4 paragraph summary of the month's emotional arc (write in second person, be warm and insightful)
2. moodTrend: "improving" | "declining" | "stable" | "volatile"
3. monthlyInsight: One key observation about patterns this month (2-3 sentences)
4. monthHighlight: The most notable moment or theme of the month (1 sentence)
5. recommendations: Array of 3 specific, actionable suggestions
6. nextMonthFocus: Single most important priority for next month

Respond with JSON only."#,
        range = month.display_range(),
        count = stats.entry_count,
        days = stats.active_days,
        weeks = buckets.len(),
        overview = week_overview(&buckets),
        snapshots = snapshot_lines(entries),
        modes = format_distribution(&modes[..modes.len().min(5)]),
        themes = if themes.is_empty() {
            "None identified".to_string()
        } else {
            themes.join(", ")
        },
        theme_counts = format_distribution(&theme_counts[..theme_counts.len().min(5)]),
        pos = b.positive,
        neg = b.negative,
        neu = b.neutral,
        ratio = stats.positive_ratio,
        avg = avg_per_week(&stats),
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

    let output = MonthlyOutput {
        narrative: string_or(&data["narrative"], DEFAULT_NARRATIVE),
        mood_trend: validate_or_default(&data["moodTrend"]),
        monthly_insight: string_or(&data["monthlyInsight"], DEFAULT_INSIGHT),
        month_highlight: string_or(&data["monthHighlight"], DEFAULT_HIGHLIGHT),
        recommendations: coerce_string_list(&data["recommendations"], MAX_RECOMMENDATIONS),
        next_month_focus: string_or(&data["nextMonthFocus"], DEFAULT_NEXT_FOCUS),
    };

    Ok(MonthlyGenerated {
        active_weeks: buckets.len(),
        generated: Generated {
            output,
            stats,
            tokens_used: response.tokens_used,
            model: response.model,
        },
    })
}
