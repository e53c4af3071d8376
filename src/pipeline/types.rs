//! Axis vocabularies, classification records, and fill accounting.

use serde::{Deserialize, Serialize};

// ── Axis vocabularies ───────────────────────────────────────────────
//
// Each axis decodes totally: a known label (any case, stray padding)
// maps to its variant, anything else is preserved verbatim inside
// `Unrecognized` so a sloppy model answer never breaks a consumer.

/// Message category axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Category {
    Work,
    School,
    Shopping,
    Entertainment,
    Other,
    /// Model answer outside the declared vocabulary, kept verbatim.
    Unrecognized(String),
}

impl Category {
    pub const VOCABULARY: &'static [&'static str] =
        &["Work", "School", "Shopping", "Entertainment", "Other"];

    pub fn parse(raw: &str) -> Self {
        match normalize(raw).to_ascii_lowercase().as_str() {
            "work" => Self::Work,
            "school" => Self::School,
            "shopping" => Self::Shopping,
            "entertainment" => Self::Entertainment,
            "other" => Self::Other,
            _ => Self::Unrecognized(normalize(raw).to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Work => "Work",
            Self::School => "School",
            Self::Shopping => "Shopping",
            Self::Entertainment => "Entertainment",
            Self::Other => "Other",
            Self::Unrecognized(raw) => raw,
        }
    }
}

/// Message priority axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Priority {
    Urgent,
    Important,
    Normal,
    Unrecognized(String),
}

impl Priority {
    pub const VOCABULARY: &'static [&'static str] = &["Urgent", "Important", "Normal"];

    pub fn parse(raw: &str) -> Self {
        match normalize(raw).to_ascii_lowercase().as_str() {
            "urgent" => Self::Urgent,
            "important" => Self::Important,
            "normal" => Self::Normal,
            _ => Self::Unrecognized(normalize(raw).to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Urgent => "Urgent",
            Self::Important => "Important",
            Self::Normal => "Normal",
            Self::Unrecognized(raw) => raw,
        }
    }
}

/// Whether the message needs a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Respond {
    Yes,
    No,
    Unrecognized(String),
}

impl Respond {
    pub const VOCABULARY: &'static [&'static str] = &["Yes", "No"];

    pub fn parse(raw: &str) -> Self {
        match normalize(raw).to_ascii_lowercase().as_str() {
            "yes" => Self::Yes,
            "no" => Self::No,
            _ => Self::Unrecognized(normalize(raw).to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Unrecognized(raw) => raw,
        }
    }
}

/// Trim whitespace and a single trailing period off a model answer.
fn normalize(raw: &str) -> &str {
    raw.trim().strip_suffix('.').unwrap_or(raw.trim()).trim()
}

macro_rules! string_convertible {
    ($axis:ty) => {
        impl From<String> for $axis {
            fn from(raw: String) -> Self {
                Self::parse(&raw)
            }
        }

        impl From<$axis> for String {
            fn from(axis: $axis) -> String {
                axis.label().to_string()
            }
        }

        impl std::fmt::Display for $axis {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

string_convertible!(Category);
string_convertible!(Priority);
string_convertible!(Respond);

// ── Classification results ──────────────────────────────────────────

/// One message's answers along the three axes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub priority: Priority,
    pub respond: Respond,
}

/// The cached unit: message identity, its headers, and its classification.
///
/// Records are written once and never updated; they disappear when their
/// TTL elapses. Header fields absent on the wire are stored as empty
/// strings so every record is fully populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub category: Category,
    pub priority: Priority,
    pub respond: Respond,
}

impl ClassificationRecord {
    /// Encode to the single string blob the cache stores.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from the cache blob.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

// ── Fill accounting ─────────────────────────────────────────────────

/// Per-message outcome of one fill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Newly classified and written to the cache.
    Classified,
    /// A live cache entry already existed; nothing was done.
    AlreadyCached,
    /// Header block could not be read; message skipped.
    SkippedUnreadable,
}

/// Aggregate result of one `ensure_filled` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub target: u64,
    pub live_before: u64,
    /// Batch size asked of the source (exactly the shortfall).
    pub requested: usize,
    /// Messages the source actually returned.
    pub fetched: usize,
    pub classified: usize,
    pub already_cached: usize,
    pub skipped_unreadable: usize,
}

impl FillReport {
    pub fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Classified => self.classified += 1,
            MessageOutcome::AlreadyCached => self.already_cached += 1,
            MessageOutcome::SkippedUnreadable => self.skipped_unreadable += 1,
        }
    }

    /// Live population after the pass, assuming no concurrent expiry.
    pub fn live_after(&self) -> u64 {
        self.live_before + self.classified as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Axis parsing ────────────────────────────────────────────────

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::parse("work"), Category::Work);
        assert_eq!(Category::parse("WORK"), Category::Work);
        assert_eq!(Category::parse("  Entertainment  "), Category::Entertainment);
    }

    #[test]
    fn category_parse_strips_trailing_period() {
        assert_eq!(Category::parse("Shopping."), Category::Shopping);
    }

    #[test]
    fn category_parse_preserves_off_vocabulary_text() {
        assert_eq!(
            Category::parse("Maybe work?"),
            Category::Unrecognized("Maybe work?".to_string())
        );
        assert_eq!(Category::parse(""), Category::Unrecognized(String::new()));
    }

    #[test]
    fn priority_parse_covers_vocabulary() {
        assert_eq!(Priority::parse("Urgent"), Priority::Urgent);
        assert_eq!(Priority::parse("important"), Priority::Important);
        assert_eq!(Priority::parse("NORMAL"), Priority::Normal);
        assert_eq!(
            Priority::parse("low"),
            Priority::Unrecognized("low".to_string())
        );
    }

    #[test]
    fn respond_parse_covers_vocabulary() {
        assert_eq!(Respond::parse("Yes"), Respond::Yes);
        assert_eq!(Respond::parse("no."), Respond::No);
        assert_eq!(
            Respond::parse("probably"),
            Respond::Unrecognized("probably".to_string())
        );
    }

    #[test]
    fn labels_round_trip_through_parse() {
        for label in Category::VOCABULARY {
            assert_eq!(Category::parse(label).label(), *label);
        }
        for label in Priority::VOCABULARY {
            assert_eq!(Priority::parse(label).label(), *label);
        }
        for label in Respond::VOCABULARY {
            assert_eq!(Respond::parse(label).label(), *label);
        }
    }

    // ── Record blob ─────────────────────────────────────────────────

    #[test]
    fn record_blob_round_trips() {
        let record = ClassificationRecord {
            message_id: "m-1".to_string(),
            sender: "Alice <alice@example.com>".to_string(),
            subject: "Sale ends tonight".to_string(),
            category: Category::Shopping,
            priority: Priority::Normal,
            respond: Respond::No,
        };
        let blob = record.encode().unwrap();
        assert_eq!(ClassificationRecord::decode(&blob).unwrap(), record);
    }

    #[test]
    fn record_blob_round_trips_unrecognized_labels() {
        let record = ClassificationRecord {
            message_id: "m-2".to_string(),
            sender: String::new(),
            subject: String::new(),
            category: Category::Unrecognized("Spam".to_string()),
            priority: Priority::Unrecognized("ASAP".to_string()),
            respond: Respond::Unrecognized("maybe".to_string()),
        };
        let blob = record.encode().unwrap();
        let decoded = ClassificationRecord::decode(&blob).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn axis_serializes_as_plain_label_string() {
        let blob = serde_json::to_string(&Category::Work).unwrap();
        assert_eq!(blob, "\"Work\"");
    }

    // ── Fill report ─────────────────────────────────────────────────

    #[test]
    fn report_accumulates_outcomes() {
        let mut report = FillReport {
            target: 5,
            live_before: 2,
            requested: 3,
            fetched: 3,
            ..Default::default()
        };
        report.record(MessageOutcome::Classified);
        report.record(MessageOutcome::Classified);
        report.record(MessageOutcome::AlreadyCached);

        assert_eq!(report.classified, 2);
        assert_eq!(report.already_cached, 1);
        assert_eq!(report.skipped_unreadable, 0);
        assert_eq!(report.live_after(), 4);
    }
}
