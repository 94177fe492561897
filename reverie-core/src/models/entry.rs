use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vocab::{
    Contradiction, EnergyLevel, EnergyShape, EntryFormat, EntryType, InferredMode, Sentiment,
};

pub const META_FLAG_WEB: &str = "Web App";
pub const META_FLAG_DECOMPOSED: &str = "Decomposed Entry";

/// Every field the analysis pipeline derives from an entry's text.
///
/// Written as one unit: a stored entry either has all of these from a single
/// pipeline run or none of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryAnalysis {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub format: EntryFormat,
    pub name: String,
    pub snapshot: String,
    pub inferred_mode: InferredMode,
    pub inferred_energy: EnergyLevel,
    pub energy_shape: EnergyShape,
    pub sentiment: Sentiment,
    pub theme_tags: Vec<String>,
    pub contradiction: Option<Contradiction>,
    pub loops: Option<String>,
    pub summary: String,
    pub actionable_insights: String,
    pub next_action: String,
    pub word_count: i32,
    pub tokens_used: i32,
}

/// Links a child entry to the consolidated entry it was split from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Lineage {
    pub parent_id: Option<Uuid>,
    pub is_decomposed: bool,
    pub decomposition_count: i32,
    pub sequence_order: Option<i32>,
    pub approximate_time: Option<String>,
    pub overarching_theme: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,
    pub text: String,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub analysis: EntryAnalysis,
    #[serde(flatten)]
    pub lineage: Lineage,
    pub meta_flag: String,
    pub bookmarked: bool,
    pub deleted: bool,
}

/// Input for [`crate::store::EntryStore::create`].
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub text: String,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub analysis: EntryAnalysis,
    pub lineage: Lineage,
    pub meta_flag: String,
}

/// Whitespace-delimited token count; runs of whitespace never produce empty words.
pub fn word_count(text: &str) -> i32 {
    i32::try_from(text.split_whitespace().count()).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_ignores_repeated_whitespace() {
        assert_eq!(
            word_count("Had a rough morning but felt better after lunch with a friend."),
            12
        );
        assert_eq!(word_count("  spaced \n\n out\t words  "), 3);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
    }
}
