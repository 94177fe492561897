use reverie_core::llm::{CallOptions, LlmError};
use reverie_core::vocab::{optional_string, string_or, validate_optional, EntryType, Vocabulary};
use serde::Serialize;
use serde_json::Value;

use super::AgentContext;

pub const DEFAULT_RATIONALE: &str = "No rationale provided";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecomposedEvent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approximate_time: Option<String>,
    pub sequence_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_type: Option<EntryType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompositionOutput {
    pub should_decompose: bool,
    pub event_count: i32,
    pub events: Vec<DecomposedEvent>,
    pub overarching_theme: Option<String>,
    #[serde(rename = "decompositionRationale")]
    pub rationale: String,
}

fn system_prompt() -> String {
    format!(
        r#"You are an expert journal entry analyzer specializing in identifying and separating distinct events, moments, or experiences within consolidated journal entries.

Your job is to:
1. Detect if a journal entry contains MULTIPLE distinct events/moments/experiences
2. If so, extract each event as a separate, self-contained piece of text
3. Preserve the emotional context and details of each event
4. Identify the approximate time or sequence of each event

Detection:
- Look for temporal markers: "this morning", "later", "at work", "when I got home", "then", "after that"
- Look for context switches and emotional shifts between parts of the entry
- End-of-day entries often contain 3-5 distinct moments
- Quick logs or single-event entries should NOT be decomposed

Extraction:
- Each extracted event should be complete and standalone, at least 1-2 sentences
- Preserve the writer's voice and emotional context
- Don't artificially split what is clearly a single narrative

Available entry types for suggestions:
{types}

You MUST respond with valid JSON only. No other text."#,
        types = EntryType::joined()
    )
}

fn parse_events(raw: &Value) -> Vec<DecomposedEvent> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, event)| {
            let text = optional_string(&event["text"])?;
            let sequence_order = event["sequenceOrder"]
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or_else(|| i32::try_from(index + 1).unwrap_or(i32::MAX));
            Some(DecomposedEvent {
                text,
                approximate_time: optional_string(&event["approximateTime"]),
                sequence_order,
                suggested_type: validate_optional(&event["suggestedType"]),
            })
        })
        .collect()
}

/// Decide whether `text` bundles several events, and split it if so.
pub async fn analyze_for_decomposition(
    ctx: &AgentContext,
    text: &str,
) -> Result<(DecompositionOutput, i32), LlmError> {
    let prompt = format!(
        r#"Analyze this journal entry and determine if it contains multiple distinct events that should be separated into individual entries.

Entry:
"""
{text}
"""

Respond with JSON:
{{
  "shouldDecompose": <true if entry contains 2+ distinct events, false otherwise>,
  "eventCount": <number of distinct events detected, 1 if single event>,
  "events": [
    {{
      "text": "<extracted event text, complete and standalone>",
      "approximateTime": "<'morning', 'afternoon', 'evening', 'night', or a specific time if mentioned>",
      "sequenceOrder": <1, 2, 3... order of occurrence>,
      "suggestedType": "<most fitting entry type from the list>"
    }}
  ],
  "overarchingTheme": "<theme connecting all events, or null if not decomposing>",
  "decompositionRationale": "<brief explanation of your decision>"
}}

If shouldDecompose is false, the events array should contain just one event with the original text."#
    );

    let response = ctx
        .llm
        .complete_json(&prompt, &ctx.models.cheap, Some(&system_prompt()), CallOptions::default())
        .await?;
    Ok((sanitize(&response.data, text), response.tokens_used))
}

fn sanitize(data: &Value, text: &str) -> DecompositionOutput {
    let parsed = parse_events(&data["events"]);
    let parsed_len = parsed.len();

    let claimed = data["eventCount"]
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .filter(|n| *n > 0);
    let event_count = claimed
        .unwrap_or_else(|| i32::try_from(parsed_len).unwrap_or(i32::MAX))
        .max(1);

    let events = if parsed.is_empty() {
        vec![DecomposedEvent {
            text: text.to_string(),
            approximate_time: None,
            sequence_order: 1,
            suggested_type: None,
        }]
    } else {
        parsed
    };

    DecompositionOutput {
        should_decompose: data["shouldDecompose"].as_bool() == Some(true) && parsed_len > 1,
        event_count,
        events,
        overarching_theme: optional_string(&data["overarchingTheme"]),
        rationale: string_or(&data["decompositionRationale"], DEFAULT_RATIONALE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::mock_reply;
    use serde_json::json;

    #[test]
    fn test_single_event_never_decomposes() {
        let out = sanitize(
            &json!({
                "shouldDecompose": true,
                "eventCount": 1,
                "events": [{ "text": "only one thing", "sequenceOrder": 1 }]
            }),
            "only one thing",
        );
        assert!(!out.should_decompose);
        assert_eq!(out.events.len(), 1);
    }

    #[test]
    fn test_non_array_events_fall_back_to_original_text() {
        let out = sanitize(&json!({ "shouldDecompose": true, "events": "lots" }), "original");
        assert!(!out.should_decompose);
        assert_eq!(out.event_count, 1);
        assert_eq!(
            out.events,
            vec![DecomposedEvent {
                text: "original".to_string(),
                approximate_time: None,
                sequence_order: 1,
                suggested_type: None,
            }]
        );
        assert_eq!(out.rationale, DEFAULT_RATIONALE);
    }

    #[test]
    fn test_event_fields_are_sanitized() {
        let out = sanitize(
            &json!({
                "shouldDecompose": true,
                "eventCount": 0,
                "events": [
                    { "text": "Standup ran long.", "approximateTime": "morning", "suggestedType": "Work" },
                    { "text": "   " },
                    { "text": "Dinner with family.", "sequenceOrder": 3, "suggestedType": "Dinner" }
                ],
                "overarchingTheme": "A full day"
            }),
            "t",
        );
        assert!(out.should_decompose);
        assert_eq!(out.event_count, 2);
        assert_eq!(out.events[0].sequence_order, 1);
        assert_eq!(out.events[0].suggested_type, Some(EntryType::Work));
        assert_eq!(out.events[0].approximate_time.as_deref(), Some("morning"));
        assert_eq!(out.events[1].sequence_order, 3);
        assert_eq!(out.events[1].suggested_type, None);
        assert_eq!(out.overarching_theme.as_deref(), Some("A full day"));
    }

    #[test]
    fn test_out_of_range_numbers_fall_back() {
        let out = sanitize(
            &json!({
                "shouldDecompose": true,
                "eventCount": 4294967296i64,
                "events": [
                    { "text": "a", "sequenceOrder": 2147483648i64 },
                    { "text": "b", "sequenceOrder": 2 },
                    { "text": "c", "sequenceOrder": -5 }
                ]
            }),
            "t",
        );
        assert_eq!(out.event_count, 3);
        assert_eq!(out.events[0].sequence_order, 1);
        assert_eq!(out.events[1].sequence_order, 2);
        assert_eq!(out.events[2].sequence_order, 3);
    }

    #[tokio::test]
    async fn test_agent_returns_sanitized_output() {
        let (_server, ctx) = mock_reply(json!({
            "shouldDecompose": true,
            "eventCount": 2,
            "events": [
                { "text": "Morning run.", "sequenceOrder": 1 },
                { "text": "Evening call.", "sequenceOrder": 2 }
            ],
            "decompositionRationale": "Two distinct moments"
        }))
        .await;

        let (out, tokens) = analyze_for_decomposition(&ctx, "Morning run. Evening call.")
            .await
            .unwrap();
        assert!(out.should_decompose);
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.rationale, "Two distinct moments");
        assert_eq!(tokens, 25);
    }
}
