use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{EntryStore, Store, StoreError, SummaryStore};
use crate::db;
use crate::models::{
    EntryAnalysis, JournalEntry, Lineage, NewEntry, PeriodKind, PeriodSummary, SentimentBreakdown,
    SummaryDraft,
};
use crate::vocab::Vocabulary;

const ENTRY_COLUMNS: &str = r#"
    id, text, entry_date, timestamp, entry_type, format, name, snapshot,
    inferred_mode, inferred_energy, energy_shape, sentiment, theme_tags,
    contradiction, loops, summary, actionable_insights, next_action,
    word_count, tokens_used, parent_id, is_decomposed, decomposition_count,
    sequence_order, approximate_time, overarching_theme, meta_flag,
    is_bookmarked, is_deleted
"#;

const SUMMARY_COLUMNS: &str = r#"
    id, kind, period_id, period_start, period_end, entry_count, narrative,
    mood_trend, insight, highlight, recommendations, next_focus,
    dominant_mode, dominant_energy, dominant_sentiment, top_themes,
    top_contradiction, positive_ratio, avg_entries, active_days,
    active_weeks, sentiment_breakdown, tokens_used, model, generated_at
"#;

/// Postgres-backed store. Call [`db::ensure_schema`] before first use.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn vocab<V: Vocabulary>(row: &PgRow, column: &str) -> Result<V, StoreError> {
    let raw: String = row.try_get(column)?;
    V::from_label(&raw).ok_or_else(|| StoreError::Corrupt(format!("{} = '{}'", column, raw)))
}

fn optional_vocab<V: Vocabulary>(row: &PgRow, column: &str) -> Result<Option<V>, StoreError> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        None => Ok(None),
        Some(s) => V::from_label(&s)
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("{} = '{}'", column, s))),
    }
}

fn entry_from_row(row: &PgRow) -> Result<JournalEntry, StoreError> {
    Ok(JournalEntry {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        date: row.try_get("entry_date")?,
        timestamp: row.try_get("timestamp")?,
        analysis: EntryAnalysis {
            entry_type: vocab(row, "entry_type")?,
            format: vocab(row, "format")?,
            name: row.try_get("name")?,
            snapshot: row.try_get("snapshot")?,
            inferred_mode: vocab(row, "inferred_mode")?,
            inferred_energy: vocab(row, "inferred_energy")?,
            energy_shape: vocab(row, "energy_shape")?,
            sentiment: vocab(row, "sentiment")?,
            theme_tags: row.try_get("theme_tags")?,
            contradiction: optional_vocab(row, "contradiction")?,
            loops: row.try_get("loops")?,
            summary: row.try_get("summary")?,
            actionable_insights: row.try_get("actionable_insights")?,
            next_action: row.try_get("next_action")?,
            word_count: row.try_get("word_count")?,
            tokens_used: row.try_get("tokens_used")?,
        },
        lineage: Lineage {
            parent_id: row.try_get("parent_id")?,
            is_decomposed: row.try_get("is_decomposed")?,
            decomposition_count: row.try_get("decomposition_count")?,
            sequence_order: row.try_get("sequence_order")?,
            approximate_time: row.try_get("approximate_time")?,
            overarching_theme: row.try_get("overarching_theme")?,
        },
        meta_flag: row.try_get("meta_flag")?,
        bookmarked: row.try_get("is_bookmarked")?,
        deleted: row.try_get("is_deleted")?,
    })
}

fn summary_from_row(row: &PgRow) -> Result<PeriodSummary, StoreError> {
    let kind: String = row.try_get("kind")?;
    let kind = PeriodKind::parse(&kind)
        .ok_or_else(|| StoreError::Corrupt(format!("kind = '{}'", kind)))?;
    let Json(recommendations): Json<Vec<String>> = row.try_get("recommendations")?;
    let Json(top_themes): Json<Vec<String>> = row.try_get("top_themes")?;
    let Json(sentiment_breakdown): Json<SentimentBreakdown> = row.try_get("sentiment_breakdown")?;

    Ok(PeriodSummary {
        id: row.try_get("id")?,
        kind,
        period_id: row.try_get("period_id")?,
        period_start: row.try_get("period_start")?,
        period_end: row.try_get("period_end")?,
        entry_count: row.try_get("entry_count")?,
        narrative: row.try_get("narrative")?,
        mood_trend: optional_vocab(row, "mood_trend")?,
        insight: row.try_get("insight")?,
        highlight: row.try_get("highlight")?,
        recommendations,
        next_focus: row.try_get("next_focus")?,
        dominant_mode: row.try_get("dominant_mode")?,
        dominant_energy: row.try_get("dominant_energy")?,
        dominant_sentiment: optional_vocab(row, "dominant_sentiment")?,
        top_themes,
        top_contradiction: row.try_get("top_contradiction")?,
        positive_ratio: row.try_get("positive_ratio")?,
        avg_entries: row.try_get("avg_entries")?,
        active_days: row.try_get("active_days")?,
        active_weeks: row.try_get("active_weeks")?,
        sentiment_breakdown,
        tokens_used: row.try_get("tokens_used")?,
        model: row.try_get("model")?,
        generated_at: row.try_get("generated_at")?,
    })
}

#[async_trait]
impl EntryStore for PgStore {
    async fn create(&self, entry: NewEntry) -> Result<JournalEntry, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO journal_entries (
                id, text, entry_date, timestamp, entry_type, format, name, snapshot,
                inferred_mode, inferred_energy, energy_shape, sentiment, theme_tags,
                contradiction, loops, summary, actionable_insights, next_action,
                word_count, tokens_used, parent_id, is_decomposed, decomposition_count,
                sequence_order, approximate_time, overarching_theme, meta_flag
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );
        let a = &entry.analysis;
        let l = &entry.lineage;

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&entry.text)
            .bind(entry.date)
            .bind(entry.timestamp)
            .bind(a.entry_type.label())
            .bind(a.format.label())
            .bind(&a.name)
            .bind(&a.snapshot)
            .bind(a.inferred_mode.label())
            .bind(a.inferred_energy.label())
            .bind(a.energy_shape.label())
            .bind(a.sentiment.label())
            .bind(&a.theme_tags)
            .bind(a.contradiction.map(|c| c.label()))
            .bind(&a.loops)
            .bind(&a.summary)
            .bind(&a.actionable_insights)
            .bind(&a.next_action)
            .bind(a.word_count)
            .bind(a.tokens_used)
            .bind(l.parent_id)
            .bind(l.is_decomposed)
            .bind(l.decomposition_count)
            .bind(l.sequence_order)
            .bind(&l.approximate_time)
            .bind(&l.overarching_theme)
            .bind(&entry.meta_flag)
            .fetch_one(&self.pool)
            .await?;

        entry_from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<JournalEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM journal_entries WHERE id = $1 AND is_deleted = false",
            ENTRY_COLUMNS
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        text: &str,
        analysis: EntryAnalysis,
    ) -> Result<JournalEntry, StoreError> {
        let sql = format!(
            r#"
            UPDATE journal_entries SET
                text = $2, entry_type = $3, format = $4, name = $5, snapshot = $6,
                inferred_mode = $7, inferred_energy = $8, energy_shape = $9,
                sentiment = $10, theme_tags = $11, contradiction = $12, loops = $13,
                summary = $14, actionable_insights = $15, next_action = $16,
                word_count = $17, tokens_used = $18
            WHERE id = $1 AND is_deleted = false
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(text)
            .bind(analysis.entry_type.label())
            .bind(analysis.format.label())
            .bind(&analysis.name)
            .bind(&analysis.snapshot)
            .bind(analysis.inferred_mode.label())
            .bind(analysis.inferred_energy.label())
            .bind(analysis.energy_shape.label())
            .bind(analysis.sentiment.label())
            .bind(&analysis.theme_tags)
            .bind(analysis.contradiction.map(|c| c.label()))
            .bind(&analysis.loops)
            .bind(&analysis.summary)
            .bind(&analysis.actionable_insights)
            .bind(&analysis.next_action)
            .bind(analysis.word_count)
            .bind(analysis.tokens_used)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => entry_from_row(&row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn set_deleted(&self, id: Uuid) -> Result<JournalEntry, StoreError> {
        let sql = format!(
            "UPDATE journal_entries SET is_deleted = true WHERE id = $1 RETURNING {}",
            ENTRY_COLUMNS
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => entry_from_row(&row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn set_bookmarked(&self, id: Uuid, bookmarked: bool) -> Result<JournalEntry, StoreError> {
        let sql = format!(
            "UPDATE journal_entries SET is_bookmarked = $2 WHERE id = $1 AND is_deleted = false RETURNING {}",
            ENTRY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(bookmarked)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => entry_from_row(&row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn list_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<JournalEntry>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM journal_entries
            WHERE is_deleted = false AND entry_date >= $1 AND entry_date <= $2
            ORDER BY timestamp ASC, id ASC
            "#,
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

#[async_trait]
impl SummaryStore for PgStore {
    async fn find(&self, kind: PeriodKind, period_id: &str) -> Result<Option<PeriodSummary>, StoreError> {
        let sql = format!(
            "SELECT {} FROM period_summaries WHERE kind = $1 AND period_id = $2",
            SUMMARY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(period_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(summary_from_row).transpose()
    }

    async fn upsert(&self, draft: SummaryDraft) -> Result<PeriodSummary, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO period_summaries (
                id, kind, period_id, period_start, period_end, entry_count, narrative,
                mood_trend, insight, highlight, recommendations, next_focus,
                dominant_mode, dominant_energy, dominant_sentiment, top_themes,
                top_contradiction, positive_ratio, avg_entries, active_days,
                active_weeks, sentiment_breakdown, tokens_used, model, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
            ON CONFLICT (kind, period_id) DO UPDATE SET
                period_start = EXCLUDED.period_start,
                period_end = EXCLUDED.period_end,
                entry_count = EXCLUDED.entry_count,
                narrative = EXCLUDED.narrative,
                mood_trend = EXCLUDED.mood_trend,
                insight = EXCLUDED.insight,
                highlight = EXCLUDED.highlight,
                recommendations = EXCLUDED.recommendations,
                next_focus = EXCLUDED.next_focus,
                dominant_mode = EXCLUDED.dominant_mode,
                dominant_energy = EXCLUDED.dominant_energy,
                dominant_sentiment = EXCLUDED.dominant_sentiment,
                top_themes = EXCLUDED.top_themes,
                top_contradiction = EXCLUDED.top_contradiction,
                positive_ratio = EXCLUDED.positive_ratio,
                avg_entries = EXCLUDED.avg_entries,
                active_days = EXCLUDED.active_days,
                active_weeks = EXCLUDED.active_weeks,
                sentiment_breakdown = EXCLUDED.sentiment_breakdown,
                tokens_used = EXCLUDED.tokens_used,
                model = EXCLUDED.model,
                generated_at = EXCLUDED.generated_at
            RETURNING {}
            "#,
            SUMMARY_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(draft.kind.as_str())
            .bind(&draft.period_id)
            .bind(draft.period_start)
            .bind(draft.period_end)
            .bind(draft.entry_count)
            .bind(&draft.narrative)
            .bind(draft.mood_trend.map(|m| m.label()))
            .bind(&draft.insight)
            .bind(&draft.highlight)
            .bind(Json(&draft.recommendations))
            .bind(&draft.next_focus)
            .bind(&draft.dominant_mode)
            .bind(&draft.dominant_energy)
            .bind(draft.dominant_sentiment.map(|s| s.label()))
            .bind(Json(&draft.top_themes))
            .bind(&draft.top_contradiction)
            .bind(draft.positive_ratio)
            .bind(draft.avg_entries)
            .bind(draft.active_days)
            .bind(draft.active_weeks)
            .bind(Json(draft.sentiment_breakdown))
            .bind(draft.tokens_used)
            .bind(&draft.model)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        summary_from_row(&row)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health(&self) -> Result<String, StoreError> {
        Ok(db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
