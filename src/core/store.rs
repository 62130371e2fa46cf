use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::core::error::StoreError;
use crate::core::record::LogRecord;

/// Number of most-recently-active sessions returned by an unfiltered fetch.
pub const RECENT_SESSION_LIMIT: usize = 50;

/// Maximum number of records returned by a search fetch.
pub const SEARCH_RECORD_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogQuery {
    /// All records of the `session_limit` most recently active sessions,
    /// plus every record without a session.
    Recent { session_limit: usize },
    /// Up to `limit` most recent records whose question or answer contains `term`.
    Search { term: String, limit: usize },
}

impl LogQuery {
    /// Builds the query for an optional search term. Blank terms mean no search.
    pub fn for_term(term: Option<&str>) -> Self {
        match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => Self::Search {
                term: term.to_string(),
                limit: SEARCH_RECORD_LIMIT,
            },
            None => Self::Recent {
                session_limit: RECENT_SESSION_LIMIT,
            },
        }
    }
}

/// What a deletion removes.
///
/// `Sessions` only ever matches records that carry a session id, so legacy
/// records survive it and are removed only by `All`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionTarget {
    Sessions(BTreeSet<String>),
    All,
}

impl DeletionTarget {
    pub fn sessions<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Sessions(ids.into_iter().map(Into::into).collect())
    }

    pub fn includes_session(&self, session_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Sessions(ids) => ids.contains(session_id),
        }
    }
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn fetch(&self, query: &LogQuery) -> Result<Vec<LogRecord>, StoreError>;

    /// Every record of one session, oldest first.
    async fn fetch_session(&self, session_id: &str) -> Result<Vec<LogRecord>, StoreError>;

    async fn append(&self, record: &LogRecord) -> Result<(), StoreError>;

    /// Returns the number of removed records.
    async fn delete(&self, target: &DeletionTarget) -> Result<u64, StoreError>;
}
