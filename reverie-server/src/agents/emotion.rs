use reverie_core::llm::{CallOptions, LlmError};
use reverie_core::vocab::{
    validate_or_default, validate_sentiment, EnergyLevel, EnergyShape, EntryType, InferredMode,
    Sentiment, Vocabulary,
};
use serde::Serialize;

use super::AgentContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionOutput {
    pub inferred_mode: InferredMode,
    pub inferred_energy: EnergyLevel,
    pub energy_shape: EnergyShape,
    #[serde(rename = "sentimentAI")]
    pub sentiment: Sentiment,
}

fn system_prompt() -> String {
    format!(
        r#"You are an expert at analyzing emotional and psychological states in journal entries.

You MUST respond with valid JSON only. No other text.

Available inferred modes (psychological states):
{modes}

Available energy levels:
{levels}

Available energy shapes (how energy feels/moves):
{shapes}

Available sentiments:
{sentiments}

Guidelines:
- "inferredMode": The dominant psychological state evident in the writing
- "inferredEnergy": The overall energy level conveyed
- "energyShape": How the energy feels, its quality and movement pattern
- "sentimentAI": Overall emotional valence of the entry"#,
        modes = InferredMode::joined(),
        levels = EnergyLevel::joined(),
        shapes = EnergyShape::joined(),
        sentiments = Sentiment::joined(),
    )
}

pub async fn analyze_emotion(
    ctx: &AgentContext,
    text: &str,
    entry_type: EntryType,
) -> Result<(EmotionOutput, i32), LlmError> {
    let prompt = format!(
        r#"Analyze the emotional and psychological state in this {entry_type} journal entry.

Entry:
"""
{text}
"""

Respond with JSON:
{{
  "inferredMode": "<psychological state>",
  "inferredEnergy": "<energy level>",
  "energyShape": "<energy shape/pattern>",
  "sentimentAI": "<overall sentiment>"
}}"#
    );

    let response = ctx
        .llm
        .complete_json(&prompt, &ctx.models.cheap, Some(&system_prompt()), CallOptions::default())
        .await?;
    let data = &response.data;

    let output = EmotionOutput {
        inferred_mode: validate_or_default(&data["inferredMode"]),
        inferred_energy: validate_or_default(&data["inferredEnergy"]),
        energy_shape: validate_or_default(&data["energyShape"]),
        sentiment: validate_sentiment(&data["sentimentAI"]),
    };

    if data["sentimentAI"].as_str() != Some(output.sentiment.label()) {
        tracing::debug!(raw = %data["sentimentAI"], "Sentiment normalised to {}", output.sentiment);
    }

    Ok((output, response.tokens_used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::mock_reply;
    use serde_json::json;

    #[tokio::test]
    async fn test_valid_reply_passes_through() {
        let (_server, ctx) = mock_reply(json!({
            "inferredMode": "Self-critical",
            "inferredEnergy": "Very Low",
            "energyShape": "Collapsing",
            "sentimentAI": "Negative"
        }))
        .await;

        let (out, _) = analyze_emotion(&ctx, "text", EntryType::Work).await.unwrap();
        assert_eq!(out.inferred_mode, InferredMode::SelfCritical);
        assert_eq!(out.inferred_energy, EnergyLevel::VeryLow);
        assert_eq!(out.energy_shape, EnergyShape::Collapsing);
        assert_eq!(out.sentiment, Sentiment::Negative);
    }

    #[tokio::test]
    async fn test_mixed_sentiment_becomes_neutral() {
        let (_server, ctx) = mock_reply(json!({
            "inferredMode": "Calm",
            "inferredEnergy": "Balanced",
            "energyShape": "Centered",
            "sentimentAI": "Mixed"
        }))
        .await;

        let (out, _) = analyze_emotion(&ctx, "text", EntryType::Work).await.unwrap();
        assert_eq!(out.sentiment, Sentiment::Neutral);
        assert_eq!(out.inferred_mode, InferredMode::Calm);
    }

    #[tokio::test]
    async fn test_each_field_falls_back_independently() {
        let (_server, ctx) = mock_reply(json!({
            "inferredMode": "Ecstatic",
            "inferredEnergy": "High",
            "energyShape": 42,
            "sentimentAI": "Angry"
        }))
        .await;

        let (out, _) = analyze_emotion(&ctx, "text", EntryType::Work).await.unwrap();
        assert_eq!(out.inferred_mode, InferredMode::Reflective);
        assert_eq!(out.inferred_energy, EnergyLevel::High);
        assert_eq!(out.energy_shape, EnergyShape::Centered);
        assert_eq!(out.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_output_serializes_with_wire_names() {
        let out = EmotionOutput {
            inferred_mode: InferredMode::Hopeful,
            inferred_energy: EnergyLevel::Elevated,
            energy_shape: EnergyShape::Rising,
            sentiment: Sentiment::Positive,
        };
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["sentimentAI"], "Positive");
        assert_eq!(v["inferredEnergy"], "Elevated");
    }
}
