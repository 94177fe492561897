pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod period;
pub mod store;
pub mod vocab;

pub use config::ReverieConfig;
pub use error::ReverieError;
pub use llm::{CallOptions, CompletionBackend, LlmClientConfig, LlmError, LlmResponse, OpenRouterClient};
pub use period::{MonthId, PeriodError, WeekId};
pub use store::{EntryStore, MemoryStore, PgStore, Store, StoreError, SummaryStore};
