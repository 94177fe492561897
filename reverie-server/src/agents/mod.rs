//! LLM-backed agents.
//!
//! Stage agents (`intent`, `emotion`, `theme`, `insight`, `decomposition`)
//! each analyse one aspect of a single entry. Period agents (`daily`,
//! `weekly`, `monthly`) turn a set of entries plus `stats` into a narrative.
//!
//! Every agent makes exactly one completion call and validates each field of
//! the reply independently against its vocabulary; an out-of-list value is
//! replaced by the field default, never reported as an error.

pub mod daily;
pub mod decomposition;
pub mod emotion;
pub mod insight;
pub mod intent;
pub mod monthly;
pub mod stats;
pub mod theme;
pub mod weekly;

use std::sync::Arc;

use reverie_core::config::LlmConfig;
use reverie_core::CompletionBackend;

/// Model identifiers for the two cost tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSet {
    pub cheap: String,
    pub balanced: String,
}

impl From<&LlmConfig> for ModelSet {
    fn from(config: &LlmConfig) -> Self {
        Self {
            cheap: config.cheap_model.clone(),
            balanced: config.balanced_model.clone(),
        }
    }
}

impl Default for ModelSet {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

/// What every agent needs to make its call.
#[derive(Clone)]
pub struct AgentContext {
    pub llm: Arc<dyn CompletionBackend>,
    pub models: ModelSet,
}

impl AgentContext {
    pub fn new(llm: Arc<dyn CompletionBackend>, models: ModelSet) -> Self {
        Self { llm, models }
    }
}

/// A period agent's validated reply together with the statistics it was
/// prompted with.
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub output: T,
    pub stats: stats::PeriodStats,
    pub tokens_used: i32,
    pub model: String,
}

/// First `max` characters of `text` (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
