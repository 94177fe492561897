use reverie_core::llm::{CallOptions, LlmError};
use reverie_core::vocab::{string_or, Vocabulary};
use serde::Serialize;

use super::emotion::EmotionOutput;
use super::intent::IntentOutput;
use super::theme::ThemeOutput;
use super::AgentContext;

pub const DEFAULT_INSIGHTS: &str = "Reflect on this entry and notice any patterns.";
pub const DEFAULT_NEXT_ACTION: &str = "Take a moment to pause and breathe.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightOutput {
    #[serde(rename = "summaryAI")]
    pub summary: String,
    #[serde(rename = "actionableInsightsAI")]
    pub actionable_insights: String,
    pub next_action: String,
}

const SYSTEM_PROMPT: &str = r#"You are a thoughtful advisor who provides meaningful insights and actionable recommendations based on journal entries.

You MUST respond with valid JSON only. No other text.

Guidelines:
- "summaryAI": A brief, insightful summary that captures key themes and emotional undertones
- "actionableInsightsAI": Specific, practical recommendations based on the entry
- "nextAction": One concrete, achievable next step the writer could take"#;

/// Earlier stage outputs, fed into the insight prompt.
pub struct StageContext<'a> {
    pub intent: &'a IntentOutput,
    pub emotion: &'a EmotionOutput,
    pub themes: &'a ThemeOutput,
}

pub async fn generate_insights(
    ctx: &AgentContext,
    text: &str,
    stages: StageContext<'_>,
) -> Result<(InsightOutput, i32), LlmError> {
    let tension = stages
        .themes
        .contradiction
        .map(|c| c.label())
        .unwrap_or("None identified");
    let loops = stages.themes.loops.as_deref().unwrap_or("None identified");

    let prompt = format!(
        r#"Based on this journal entry and analysis, generate thoughtful insights.

Entry:
"""
{text}
"""

Analysis Context:
- Type: {entry_type}
- Title: {name}
- Snapshot: {snapshot}
- Psychological Mode: {mode}
- Energy Level: {energy}
- Energy Shape: {shape}
- Sentiment: {sentiment}
- Themes: {themes}
- Internal Tension: {tension}
- Thought Patterns: {loops}

Respond with JSON:
{{
  "summaryAI": "<brief summary with emotional context>",
  "actionableInsightsAI": "<specific practical recommendations>",
  "nextAction": "<one concrete next step>"
}}"#,
        entry_type = stages.intent.entry_type,
        name = stages.intent.name,
        snapshot = stages.intent.snapshot,
        mode = stages.emotion.inferred_mode,
        energy = stages.emotion.inferred_energy,
        shape = stages.emotion.energy_shape,
        sentiment = stages.emotion.sentiment,
        themes = stages.themes.theme_tags.join(", "),
    );

    let response = ctx
        .llm
        .complete_json(&prompt, &ctx.models.balanced, Some(SYSTEM_PROMPT), CallOptions::default())
        .await?;
    let data = &response.data;

    let output = InsightOutput {
        summary: string_or(&data["summaryAI"], &stages.intent.snapshot),
        actionable_insights: string_or(&data["actionableInsightsAI"], DEFAULT_INSIGHTS),
        next_action: string_or(&data["nextAction"], DEFAULT_NEXT_ACTION),
    };

    Ok((output, response.tokens_used))
}
