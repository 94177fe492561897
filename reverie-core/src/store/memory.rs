use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntryStore, Store, StoreError, SummaryStore};
use crate::models::{EntryAnalysis, JournalEntry, NewEntry, PeriodKind, PeriodSummary, SummaryDraft};

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Uuid, JournalEntry>>,
    summaries: RwLock<HashMap<(PeriodKind, String), PeriodSummary>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached summary rows across all kinds.
    pub async fn summary_count(&self) -> usize {
        self.summaries.read().await.len()
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn create(&self, entry: NewEntry) -> Result<JournalEntry, StoreError> {
        let record = JournalEntry {
            id: Uuid::new_v4(),
            text: entry.text,
            date: entry.date,
            timestamp: entry.timestamp,
            analysis: entry.analysis,
            lineage: entry.lineage,
            meta_flag: entry.meta_flag,
            bookmarked: false,
            deleted: false,
        };
        self.entries.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<JournalEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&id)
            .filter(|e| !e.deleted)
            .cloned())
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        text: &str,
        analysis: EntryAnalysis,
    ) -> Result<JournalEntry, StoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .filter(|e| !e.deleted)
            .ok_or(StoreError::NotFound(id))?;
        entry.text = text.to_string();
        entry.analysis = analysis;
        Ok(entry.clone())
    }

    async fn set_deleted(&self, id: Uuid) -> Result<JournalEntry, StoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.deleted = true;
        Ok(entry.clone())
    }

    async fn set_bookmarked(&self, id: Uuid, bookmarked: bool) -> Result<JournalEntry, StoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .filter(|e| !e.deleted)
            .ok_or(StoreError::NotFound(id))?;
        entry.bookmarked = bookmarked;
        Ok(entry.clone())
    }

    async fn list_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<JournalEntry>, StoreError> {
        let mut found: Vec<JournalEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| !e.deleted && e.date >= start && e.date <= end)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn find(&self, kind: PeriodKind, period_id: &str) -> Result<Option<PeriodSummary>, StoreError> {
        Ok(self
            .summaries
            .read()
            .await
            .get(&(kind, period_id.to_string()))
            .cloned())
    }

    async fn upsert(&self, draft: SummaryDraft) -> Result<PeriodSummary, StoreError> {
        let mut summaries = self.summaries.write().await;
        let key = (draft.kind, draft.period_id.clone());
        let id = summaries.get(&key).map(|s| s.id).unwrap_or_else(Uuid::new_v4);
        let summary = draft.into_summary(id, Utc::now());
        summaries.insert(key, summary.clone());
        Ok(summary)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health(&self) -> Result<String, StoreError> {
        let count = self.entries.read().await.len();
        Ok(format!("memory ({} entries)", count))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
