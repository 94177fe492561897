use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS journal_entries (
    id                   UUID PRIMARY KEY,
    text                 TEXT NOT NULL,
    entry_date           DATE NOT NULL,
    timestamp            TIMESTAMPTZ NOT NULL,
    entry_type           TEXT NOT NULL,
    format               TEXT NOT NULL,
    name                 TEXT NOT NULL,
    snapshot             TEXT NOT NULL,
    inferred_mode        TEXT NOT NULL,
    inferred_energy      TEXT NOT NULL,
    energy_shape         TEXT NOT NULL,
    sentiment            TEXT NOT NULL,
    theme_tags           TEXT[] NOT NULL DEFAULT '{}',
    contradiction        TEXT,
    loops                TEXT,
    summary              TEXT NOT NULL,
    actionable_insights  TEXT NOT NULL,
    next_action          TEXT NOT NULL,
    word_count           INTEGER NOT NULL DEFAULT 0,
    tokens_used          INTEGER NOT NULL DEFAULT 0,
    parent_id            UUID REFERENCES journal_entries(id),
    is_decomposed        BOOLEAN NOT NULL DEFAULT false,
    decomposition_count  INTEGER NOT NULL DEFAULT 0,
    sequence_order       INTEGER,
    approximate_time     TEXT,
    overarching_theme    TEXT,
    meta_flag            TEXT NOT NULL,
    is_bookmarked        BOOLEAN NOT NULL DEFAULT false,
    is_deleted           BOOLEAN NOT NULL DEFAULT false,
    created_at           TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS journal_entries_live_date_idx
    ON journal_entries (entry_date) WHERE is_deleted = false;

CREATE TABLE IF NOT EXISTS period_summaries (
    id                   UUID PRIMARY KEY,
    kind                 TEXT NOT NULL,
    period_id            TEXT NOT NULL,
    period_start         DATE NOT NULL,
    period_end           DATE NOT NULL,
    entry_count          INTEGER NOT NULL,
    narrative            TEXT NOT NULL,
    mood_trend           TEXT,
    insight              TEXT,
    highlight            TEXT,
    recommendations      JSONB NOT NULL DEFAULT '[]',
    next_focus           TEXT,
    dominant_mode        TEXT,
    dominant_energy      TEXT,
    dominant_sentiment   TEXT,
    top_themes           JSONB NOT NULL DEFAULT '[]',
    top_contradiction    TEXT,
    positive_ratio       DOUBLE PRECISION NOT NULL DEFAULT 0,
    avg_entries          DOUBLE PRECISION NOT NULL DEFAULT 0,
    active_days          INTEGER NOT NULL DEFAULT 0,
    active_weeks         INTEGER NOT NULL DEFAULT 0,
    sentiment_breakdown  JSONB NOT NULL DEFAULT '{}',
    tokens_used          INTEGER NOT NULL DEFAULT 0,
    model                TEXT,
    generated_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (kind, period_id)
);
"#;

/// Create tables and indexes if they do not exist. Safe to run on every start.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
