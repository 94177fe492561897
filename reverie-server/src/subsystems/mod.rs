//! Request-level workflows built on the agents: the entry analysis pipeline
//! and cached period summaries.

pub mod pipeline;
pub mod summaries;
