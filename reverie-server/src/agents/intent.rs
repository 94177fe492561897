use reverie_core::llm::{CallOptions, LlmError};
use reverie_core::vocab::{validate_or_default, string_or, EntryFormat, EntryType, Vocabulary};
use serde::Serialize;

use super::{truncate_chars, AgentContext};

pub const DEFAULT_NAME: &str = "Untitled Entry";
pub const SNAPSHOT_FALLBACK_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentOutput {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub format: EntryFormat,
    pub is_consolidated: bool,
    pub name: String,
    pub snapshot: String,
}

fn system_prompt() -> String {
    format!(
        r#"You are an expert journal entry classifier. Your job is to analyze journal entries and classify them accurately.

You MUST respond with valid JSON only. No other text.

Available entry types (content classification):
{types}

Available entry formats (structure classification):
- "Quick Log": Brief, single moment capture (1-2 sentences about one thing)
- "Daily Log": Individual event during the day (one distinct experience/moment)
- "End of Day": Comprehensive day reflection (may reference multiple moments but as a unified reflection)
- "Consolidated": Multiple distinct events/moments bundled together (clearly separate experiences in one entry)

Guidelines:
- "type": Choose the most fitting category based on the entry's PRIMARY focus
- "format": Identify the structural format of the entry
- "isConsolidated": true ONLY if the entry contains 2+ clearly distinct events/moments that could each be their own entry
- "name": A concise, descriptive title (3-6 words) that captures the essence
- "snapshot": A 1-2 sentence summary of the key point or insight

Signs of a consolidated entry: multiple time markers ("this morning... later... tonight..."), switches of place, people or activity, emotional shifts between sections, list-like structure."#,
        types = EntryType::joined()
    )
}

/// Classify type and format, and title the entry.
pub async fn classify_intent(ctx: &AgentContext, text: &str) -> Result<(IntentOutput, i32), LlmError> {
    let prompt = format!(
        r#"Analyze this journal entry and classify it.

Entry:
"""
{text}
"""

Respond with JSON:
{{
  "type": "<one of the available types>",
  "format": "<Quick Log | Daily Log | End of Day | Consolidated>",
  "isConsolidated": <true if it contains 2+ distinct events that could be separate entries, false otherwise>,
  "name": "<3-6 word title>",
  "snapshot": "<1-2 sentence summary>"
}}"#
    );

    let response = ctx
        .llm
        .complete_json(&prompt, &ctx.models.cheap, Some(&system_prompt()), CallOptions::default())
        .await?;
    let data = &response.data;

    let output = IntentOutput {
        entry_type: validate_or_default(&data["type"]),
        format: validate_or_default(&data["format"]),
        is_consolidated: data["isConsolidated"].as_bool() == Some(true),
        name: string_or(&data["name"], DEFAULT_NAME),
        snapshot: string_or(&data["snapshot"], &truncate_chars(text, SNAPSHOT_FALLBACK_CHARS)),
    };

    tracing::debug!(
        entry_type = %output.entry_type,
        format = %output.format,
        is_consolidated = output.is_consolidated,
        "Intent classified"
    );

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
            "type": "Health",
            "format": "End of Day",
            "isConsolidated": true,
            "name": "Rough Morning, Better Lunch",
            "snapshot": "A hard start softened by company."
        }))
        .await;

        let (out, tokens) = classify_intent(&ctx, "Had a rough morning.").await.unwrap();
        assert_eq!(out.entry_type, EntryType::Health);
        assert_eq!(out.format, EntryFormat::EndOfDay);
        assert!(out.is_consolidated);
        assert_eq!(out.name, "Rough Morning, Better Lunch");
        assert_eq!(tokens, 25);
    }

    #[tokio::test]
    async fn test_out_of_list_values_fall_back() {
        let (_server, ctx) = mock_reply(json!({
            "type": "Banana",
            "format": "Haiku",
            "isConsolidated": "yes",
            "name": ""
        }))
        .await;

        let text = "x".repeat(150);
        let (out, _) = classify_intent(&ctx, &text).await.unwrap();
        assert_eq!(out.entry_type, EntryType::Reflection);
        assert_eq!(out.format, EntryFormat::QuickLog);
        assert!(!out.is_consolidated, "only a literal true counts");
        assert_eq!(out.name, DEFAULT_NAME);
        assert_eq!(out.snapshot.chars().count(), 100);
    }

    #[test]
    fn test_system_prompt_lists_every_type() {
        let prompt = system_prompt();
        for t in EntryType::ALL {
            assert!(prompt.contains(t.label()), "missing {}", t);
        }
    }
}
