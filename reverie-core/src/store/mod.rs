//! Record stores for journal entries and cached period summaries.
//!
//! Two implementations: `PgStore` (sqlx/Postgres) and `MemoryStore`
//! (in-process, used by tests and `storage.backend = "memory"`).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EntryAnalysis, JournalEntry, NewEntry, PeriodKind, PeriodSummary, SummaryDraft};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entry not found: {0}")]
    NotFound(Uuid),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn create(&self, entry: NewEntry) -> Result<JournalEntry, StoreError>;

    /// A live (non-deleted) entry by id.
    async fn get(&self, id: Uuid) -> Result<Option<JournalEntry>, StoreError>;

    /// Replace text and every analysed field; date, timestamp, lineage and
    /// flags are preserved.
    async fn update_analysis(
        &self,
        id: Uuid,
        text: &str,
        analysis: EntryAnalysis,
    ) -> Result<JournalEntry, StoreError>;

    /// Soft delete. Idempotent: deleting an already-deleted entry succeeds.
    async fn set_deleted(&self, id: Uuid) -> Result<JournalEntry, StoreError>;

    async fn set_bookmarked(&self, id: Uuid, bookmarked: bool) -> Result<JournalEntry, StoreError>;

    /// Live entries with `start <= date <= end`, oldest first.
    async fn list_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<JournalEntry>, StoreError>;
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn find(&self, kind: PeriodKind, period_id: &str) -> Result<Option<PeriodSummary>, StoreError>;

    /// Insert, or overwrite every field of the existing row for
    /// `(kind, period_id)` while keeping its id.
    async fn upsert(&self, draft: SummaryDraft) -> Result<PeriodSummary, StoreError>;
}

/// Everything the HTTP layer needs from a backend.
#[async_trait]
pub trait Store: EntryStore + SummaryStore {
    /// Backend description for `/health`; errors when the backend is unreachable.
    async fn health(&self) -> Result<String, StoreError>;

    fn name(&self) -> &str;
}
