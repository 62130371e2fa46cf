use std::collections::HashMap;

use crate::core::record::{LogRecord, Timestamp};

/// Key prefix for conversations built from records without a session id.
pub const LEGACY_KEY_PREFIX: &str = "legacy-";

/// A conversation reconstructed from the flat record log. Rebuilt on every
/// grouping pass and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    /// The session id, or `legacy-<index>` where index is the record's position
    /// in the fetch it came from. Legacy keys change between fetches.
    pub key: String,
    pub session_id: Option<String>,
    /// Question of the earliest record.
    pub title: String,
    /// Raw `created_at` of the most recent record.
    pub latest_timestamp: String,
    /// Model of the most recent record.
    pub model: String,
    pub message_count: usize,
    /// Oldest first.
    pub ordered_records: Vec<LogRecord>,
}

impl ConversationSummary {
    fn from_ordered(key: String, session_id: Option<String>, ordered_records: Vec<LogRecord>) -> Self {
        let first = &ordered_records[0];
        // Sorted ascending, so the last record is also the latest
        let last = &ordered_records[ordered_records.len() - 1];

        Self {
            title: first.question.clone(),
            latest_timestamp: last.created_at.clone(),
            model: last.model.clone(),
            message_count: ordered_records.len(),
            key,
            session_id,
            ordered_records,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.session_id.is_none()
    }

    pub fn latest(&self) -> Timestamp {
        Timestamp::parse(&self.latest_timestamp)
    }
}

pub fn legacy_key(index: usize) -> String {
    format!("{LEGACY_KEY_PREFIX}{index}")
}

/// Groups a flat record list into conversations, most recent first.
///
/// Records sharing a session id form one conversation ordered by
/// `created_at`; every record without one becomes its own conversation. Ties
/// in recency keep the order in which conversations first appear in `records`.
pub fn group_records(records: &[LogRecord]) -> Vec<ConversationSummary> {
    let mut by_session: HashMap<&str, Vec<LogRecord>> = HashMap::new();
    // First-appearance order of sessions, so ties are deterministic
    let mut session_order: Vec<&str> = Vec::new();
    let mut legacy: Vec<ConversationSummary> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match record.session() {
            Some(session_id) => {
                let group = by_session.entry(session_id).or_insert_with(|| {
                    session_order.push(session_id);
                    Vec::new()
                });
                group.push(record.clone());
            }
            None => legacy.push(ConversationSummary::from_ordered(
                legacy_key(index),
                None,
                vec![record.clone()],
            )),
        }
    }

    let mut summaries: Vec<ConversationSummary> = Vec::with_capacity(session_order.len() + legacy.len());
    for session_id in session_order {
        let Some(mut group) = by_session.remove(session_id) else {
            continue;
        };
        // Stable: records with equal timestamps keep fetch order
        group.sort_by_key(|r| r.timestamp());
        summaries.push(ConversationSummary::from_ordered(
            session_id.to_string(),
            Some(session_id.to_string()),
            group,
        ));
    }
    summaries.extend(legacy);

    summaries.sort_by(|a, b| b.latest().cmp(&a.latest()));
    summaries
}

/// Looks a conversation up by its key.
pub fn find_by_key<'a>(summaries: &'a [ConversationSummary], key: &str) -> Option<&'a ConversationSummary> {
    summaries.iter().find(|s| s.key == key)
}
