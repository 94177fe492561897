//! Closed vocabularies for every enum-typed journal field, plus the
//! decode-then-validate helpers that turn loosely-shaped model output into
//! strongly-typed values.
//!
//! Every vocabulary carries its own default. A value outside the allow-list is
//! never an error: it is replaced by the default and processing continues.

use serde_json::Value;

/// A closed set of labels with a designated fallback.
pub trait Vocabulary: Sized + Copy + 'static {
    /// Every legal value, in canonical order (the order prompts list them in).
    const ALL: &'static [Self];

    /// Substituted whenever a candidate is not a member.
    const DEFAULT: Self;

    fn label(&self) -> &'static str;

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.label() == label)
    }

    /// Comma-joined labels, as embedded in system prompts.
    fn joined() -> String {
        Self::ALL
            .iter()
            .map(|v| v.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl Vocabulary for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];
            const DEFAULT: Self = Self::$default;

            fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_label(s)
                    .ok_or_else(|| format!("'{}' is not a valid {}", s, stringify!($name)))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

vocabulary! {
    /// What an entry is about.
    EntryType, default = Reflection {
        Emotional => "Emotional",
        Cognitive => "Cognitive",
        Family => "Family",
        Work => "Work",
        Relationship => "Relationship",
        Health => "Health",
        Creativity => "Creativity",
        Social => "Social",
        Reflection => "Reflection",
        Decision => "Decision",
        Avoidance => "Avoidance",
        Growth => "Growth",
        Stress => "Stress",
        Communication => "Communication",
        Routine => "Routine",
    }
}

vocabulary! {
    /// How an entry is written.
    EntryFormat, default = QuickLog {
        QuickLog => "Quick Log",
        DailyLog => "Daily Log",
        EndOfDay => "End of Day",
        Consolidated => "Consolidated",
    }
}

vocabulary! {
    /// Psychological state inferred from the writing.
    InferredMode, default = Reflective {
        Hopeful => "Hopeful",
        Calm => "Calm",
        Grounded => "Grounded",
        Compassionate => "Compassionate",
        Curious => "Curious",
        Reflective => "Reflective",
        Conflicted => "Conflicted",
        Withdrawn => "Withdrawn",
        Overthinking => "Overthinking",
        Numb => "Numb",
        Anxious => "Anxious",
        Agitated => "Agitated",
        Disconnected => "Disconnected",
        SelfCritical => "Self-critical",
        Defensive => "Defensive",
    }
}

vocabulary! {
    EnergyLevel, default = Moderate {
        VeryLow => "Very Low",
        Low => "Low",
        Moderate => "Moderate",
        Balanced => "Balanced",
        High => "High",
        Elevated => "Elevated",
        Scattered => "Scattered",
        Drained => "Drained",
        Flat => "Flat",
        Restorative => "Restorative",
    }
}

vocabulary! {
    /// The quality and movement of an entry's energy.
    EnergyShape, default = Centered {
        Flat => "Flat",
        Heavy => "Heavy",
        Chaotic => "Chaotic",
        Rising => "Rising",
        Collapsing => "Collapsing",
        Expanding => "Expanding",
        Contracted => "Contracted",
        Uneven => "Uneven",
        Centered => "Centered",
        Cyclical => "Cyclical",
        Stabilized => "Stabilized",
        Pulsing => "Pulsing",
    }
}

vocabulary! {
    /// Entry valence. Storage has no "Mixed" option; see [`validate_sentiment`].
    Sentiment, default = Neutral {
        Positive => "Positive",
        Negative => "Negative",
        Neutral => "Neutral",
    }
}

vocabulary! {
    /// Internal tension. Nullable on entries, so `DEFAULT` is only used by
    /// [`validate_or_default`] callers that want a non-null value.
    Contradiction, default = IdealVsReality {
        ConnectionVsAvoidance => "Connection vs. Avoidance",
        HopeVsHopelessness => "Hope vs. Hopelessness",
        AngerVsShame => "Anger vs. Shame",
        ControlVsSurrender => "Control vs. Surrender",
        ConfidenceVsDoubt => "Confidence vs. Doubt",
        IndependenceVsBelonging => "Independence vs. Belonging",
        ClosenessVsDistance => "Closeness vs. Distance",
        ExpressionVsSilence => "Expression vs. Silence",
        SelfCareVsObligation => "Self-care vs. Obligation",
        IdealVsReality => "Ideal vs. Reality",
        ActionVsFear => "Action vs. Fear",
        GrowthVsComfort => "Growth vs. Comfort",
    }
}

vocabulary! {
    /// Trajectory of mood across a week or month.
    MoodTrend, default = Stable {
        Improving => "improving",
        Declining => "declining",
        Stable => "stable",
        Volatile => "volatile",
    }
}

/// Return the member named by `value`, or `V::DEFAULT`.
pub fn validate_or_default<V: Vocabulary>(value: &Value) -> V {
    validate_optional(value).unwrap_or(V::DEFAULT)
}

/// Return the member named by `value`, or `None` for null, non-strings and
/// non-members.
pub fn validate_optional<V: Vocabulary>(value: &Value) -> Option<V> {
    value.as_str().and_then(V::from_label)
}

/// Sentiment with the one canonicalising rewrite: "Mixed" becomes "Neutral"
/// before the allow-list check.
pub fn validate_sentiment(value: &Value) -> Sentiment {
    match value.as_str() {
        Some("Mixed") => Sentiment::Neutral,
        _ => validate_or_default(value),
    }
}

/// Non-empty string or `fallback`.
pub fn string_or(value: &Value, fallback: &str) -> String {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}

/// Non-empty string or `None`. The literal string "null" counts as absent.
pub fn optional_string(value: &Value) -> Option<String> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() && s.trim() != "null" => Some(s.to_string()),
        _ => None,
    }
}

/// String items of an array, blank items dropped, truncated to `max`.
/// Anything that is not an array yields an empty vec.
pub fn string_array(value: &Value, max: usize) -> Vec<String> {
    match value.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .take(max)
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Like [`string_array`], but a bare scalar is wrapped into a single-element
/// list first. Null and missing values yield an empty vec.
pub fn coerce_string_list(value: &Value, max: usize) -> Vec<String> {
    match value {
        Value::Array(_) => string_array(value, max),
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s.clone()],
        other => vec![other.to_string()],
    }
    .into_iter()
    .take(max)
    .collect()
}
