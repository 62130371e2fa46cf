use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Display text for a timestamp that cannot be parsed.
pub const UNKNOWN_TIME: &str = "Unknown time";

/// One persisted question/answer exchange.
///
/// Records are immutable once written. Legacy records predate session
/// tracking and carry no `session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub question: String,
    pub answer: String,
    pub model: String,
    /// ISO-8601 text as stored. Kept verbatim so unparsable values survive.
    pub created_at: String,
}

impl LogRecord {
    pub fn new(session_id: Option<String>, question: String, answer: String, model: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id,
            question,
            answer,
            model,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    /// The session this record belongs to. An empty id counts as none.
    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_legacy(&self) -> bool {
        self.session().is_none()
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp::parse(&self.created_at)
    }

    /// Case-insensitive substring match over question and answer.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.question.to_lowercase().contains(needle_lower)
            || self.answer.to_lowercase().contains(needle_lower)
    }
}

/// A parsed `created_at`.
///
/// Unparsable values order before every valid instant and equal to each
/// other, which keeps sorting total and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Timestamp {
    Unknown,
    At(DateTime<Utc>),
}

impl Timestamp {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Self::At(dt.with_timezone(&Utc));
        }
        // Naive forms without an offset are taken as UTC.
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Self::At(naive.and_utc());
            }
        }
        Self::Unknown
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::At(_))
    }
}

/// Rewrites a parsable `created_at` as UTC RFC 3339 with fixed microsecond
/// precision, so stored text sorts in time order. Unparsable text is kept.
pub fn normalize_timestamp(raw: &str) -> String {
    match Timestamp::parse(raw) {
        Timestamp::At(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
        Timestamp::Unknown => raw.to_string(),
    }
}

/// Orders two raw timestamps the way grouping does.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    Timestamp::parse(a).cmp(&Timestamp::parse(b))
}

pub fn display_time(raw: &str) -> String {
    match Timestamp::parse(raw) {
        Timestamp::At(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Timestamp::Unknown => UNKNOWN_TIME.to_string(),
    }
}
