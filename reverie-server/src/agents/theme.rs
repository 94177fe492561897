use reverie_core::llm::{CallOptions, LlmError};
use reverie_core::vocab::{
    optional_string, string_array, validate_optional, Contradiction, EntryType, InferredMode,
    Vocabulary,
};
use serde::Serialize;

use super::AgentContext;

pub const MAX_THEME_TAGS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeOutput {
    #[serde(rename = "themeTagsAI")]
    pub theme_tags: Vec<String>,
    pub contradiction: Option<Contradiction>,
    pub loops: Option<String>,
}

fn system_prompt() -> String {
    format!(
        r#"You are an expert at identifying themes and patterns in journal entries.

You MUST respond with valid JSON only. No other text.

Available contradictions (internal tensions):
{contradictions}

Guidelines:
- "themeTagsAI": Extract 3-5 relevant theme tags that capture key topics
- "contradiction": Identify any internal tension present, or null if none is evident
- "loops": Describe any repetitive thought patterns or recurring themes, or null if none"#,
        contradictions = Contradiction::joined()
    )
}

pub async fn extract_themes(
    ctx: &AgentContext,
    text: &str,
    entry_type: EntryType,
    mode: InferredMode,
) -> Result<(ThemeOutput, i32), LlmError> {
    let prompt = format!(
        r#"Extract themes and patterns from this {entry_type} journal entry. The writer appears to be in a {mode} state.

Entry:
"""
{text}
"""

Respond with JSON:
{{
  "themeTagsAI": ["tag1", "tag2", "tag3"],
  "contradiction": "<internal tension or null>",
  "loops": "<repetitive patterns or null>"
}}"#
    );

    let response = ctx
        .llm
        .complete_json(&prompt, &ctx.models.cheap, Some(&system_prompt()), CallOptions::default())
        .await?;
    let data = &response.data;

    let output = ThemeOutput {
        theme_tags: string_array(&data["themeTagsAI"], MAX_THEME_TAGS),
        contradiction: validate_optional(&data["contradiction"]),
        loops: optional_string(&data["loops"]),
    };

    Ok((output, response.tokens_used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::mock_reply;
    use serde_json::json;

    #[tokio::test]
    async fn test_tags_capped_and_contradiction_validated() {
        let (_server, ctx) = mock_reply(json!({
            "themeTagsAI": ["work", "friendship", "food", "rest", "weather", "mood", "extra"],
            "contradiction": "Hope vs. Hopelessness",
            "loops": "Keeps returning to the meeting"
        }))
        .await;

        let (out, _) = extract_themes(&ctx, "t", EntryType::Work, InferredMode::Calm)
            .await
            .unwrap();
        assert_eq!(out.theme_tags.len(), 5);
        assert_eq!(out.theme_tags[0], "work");
        assert_eq!(out.contradiction, Some(Contradiction::HopeVsHopelessness));
        assert_eq!(out.loops.as_deref(), Some("Keeps returning to the meeting"));
    }

    #[tokio::test]
    async fn test_unknown_contradiction_is_null_and_non_array_tags_empty() {
        let (_server, ctx) = mock_reply(json!({
            "themeTagsAI": "work, rest",
            "contradiction": "Love vs. Hate",
            "loops": null
        }))
        .await;

        let (out, _) = extract_themes(&ctx, "t", EntryType::Work, InferredMode::Calm)
            .await
            .unwrap();
        assert!(out.theme_tags.is_empty());
        assert_eq!(out.contradiction, None);
        assert_eq!(out.loops, None);
    }
}
