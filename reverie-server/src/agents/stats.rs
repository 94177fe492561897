//! Pure aggregate statistics over a set of entries.
//!
//! Frequency maps are `BTreeMap`s so that iteration order, and therefore
//! every tie-break, is alphabetical and independent of input order.

use std::collections::{BTreeMap, BTreeSet};

use reverie_core::models::{JournalEntry, SentimentBreakdown};
use reverie_core::period::WeekId;
use reverie_core::vocab::{Sentiment, Vocabulary};

/// Stand-in label when a frequency map is empty.
pub const UNKNOWN: &str = "Unknown";
pub const TOP_THEMES: usize = 5;

pub type Frequency = BTreeMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeriodStats {
    pub entry_count: usize,
    pub mode_distribution: Frequency,
    pub theme_frequency: Frequency,
    pub sentiment: SentimentBreakdown,
    pub contradictions: Frequency,
    pub energy_shapes: Frequency,
    pub active_days: usize,
    /// Percentage of entries with positive sentiment, 0 when there are none.
    pub positive_ratio: f64,
}

/// One ISO week's slice of a month.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekBucket {
    pub week: WeekId,
    pub count: usize,
    pub dominant_mode: String,
    pub positive: u32,
    pub negative: u32,
}

fn bump(map: &mut Frequency, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

/// Case-insensitive substring classification, so legacy labels such as
/// "Mostly positive" still count.
fn classify_sentiment(label: &str) -> Sentiment {
    let lower = label.to_lowercase();
    if lower.contains("positive") {
        Sentiment::Positive
    } else if lower.contains("negative") {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

fn add_sentiment(breakdown: &mut SentimentBreakdown, sentiment: Sentiment) {
    match sentiment {
        Sentiment::Positive => breakdown.positive += 1,
        Sentiment::Negative => breakdown.negative += 1,
        Sentiment::Neutral => breakdown.neutral += 1,
    }
}

pub fn calculate_stats(entries: &[JournalEntry]) -> PeriodStats {
    let mut stats = PeriodStats {
        entry_count: entries.len(),
        ..PeriodStats::default()
    };
    let mut days = BTreeSet::new();

    for entry in entries {
        let a = &entry.analysis;
        bump(&mut stats.mode_distribution, a.inferred_mode.label());
        bump(&mut stats.energy_shapes, a.energy_shape.label());

        for tag in a.theme_tags.iter().flat_map(|t| t.split(',')) {
            let tag = tag.trim();
            if !tag.is_empty() {
                bump(&mut stats.theme_frequency, tag);
            }
        }

        add_sentiment(&mut stats.sentiment, classify_sentiment(a.sentiment.label()));

        if let Some(c) = a.contradiction {
            bump(&mut stats.contradictions, c.label());
        }

        days.insert(entry.date);
    }

    stats.active_days = days.len();
    stats.positive_ratio = if stats.entry_count > 0 {
        stats.sentiment.positive as f64 / stats.entry_count as f64 * 100.0
    } else {
        0.0
    };
    stats
}

/// Keys by descending count, ties alphabetical.
pub fn ranked(map: &Frequency) -> Vec<(&str, u32)> {
    let mut items: Vec<(&str, u32)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    // stable sort keeps the BTreeMap's alphabetical order among equal counts
    items.sort_by(|a, b| b.1.cmp(&a.1));
    items
}

pub fn dominant(map: &Frequency) -> Option<String> {
    ranked(map).first().map(|(k, _)| k.to_string())
}

pub fn top_n(map: &Frequency, n: usize) -> Vec<String> {
    ranked(map).into_iter().take(n).map(|(k, _)| k.to_string()).collect()
}

/// Highest count wins, ties prefer Positive, then Negative, then Neutral.
/// A strict majority is always also the highest count, so this covers the
/// majority rule too. Neutral for an empty breakdown.
pub fn dominant_sentiment(b: &SentimentBreakdown) -> Sentiment {
    if b.total() == 0 {
        return Sentiment::Neutral;
    }
    if b.positive >= b.negative && b.positive >= b.neutral {
        Sentiment::Positive
    } else if b.negative >= b.neutral {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Entries grouped by ISO week, in week order.
pub fn week_buckets(entries: &[JournalEntry]) -> Vec<WeekBucket> {
    let mut grouped: BTreeMap<WeekId, Vec<&JournalEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(WeekId::containing(entry.date)).or_default().push(entry);
    }

    grouped
        .into_iter()
        .map(|(week, items)| {
            let mut modes = Frequency::new();
            let mut sentiment = SentimentBreakdown::default();
            for e in &items {
                bump(&mut modes, e.analysis.inferred_mode.label());
                add_sentiment(&mut sentiment, classify_sentiment(e.analysis.sentiment.label()));
            }
            WeekBucket {
                week,
                count: items.len(),
                dominant_mode: dominant(&modes).unwrap_or_else(|| UNKNOWN.to_string()),
                positive: sentiment.positive,
                negative: sentiment.negative,
            }
        })
        .collect()
}

/// Entries per active day; 0 with no active days.
pub fn avg_per_day(stats: &PeriodStats) -> f64 {
    if stats.active_days == 0 {
        0.0
    } else {
        stats.entry_count as f64 / stats.active_days as f64
    }
}

/// Entries per week, taking a month as four weeks.
pub fn avg_per_week(stats: &PeriodStats) -> f64 {
    stats.entry_count as f64 / 4.0
}

/// "Calm(3), Anxious(1)"
pub fn format_distribution(items: &[(&str, u32)]) -> String {
    items
        .iter()
        .map(|(k, v)| format!("{}({})", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
