pub mod entry;
pub mod summary;

pub use entry::{word_count, EntryAnalysis, JournalEntry, Lineage, NewEntry};
pub use summary::{PeriodKind, PeriodSummary, SentimentBreakdown, SummaryDraft};
