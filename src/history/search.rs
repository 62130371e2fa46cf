use std::sync::Arc;
use std::time::Duration;

use crate::core::error::StoreError;
use crate::core::record::LogRecord;
use crate::core::store::{LogQuery, LogStore};
use crate::history::debounce::Debouncer;
use crate::history::grouping::{group_records, ConversationSummary};

/// Result of applying a search term. "No search" and "searched, nothing
/// found" are different states and render different empty messages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchOutcome {
    #[default]
    NotSearched,
    Searched {
        term: String,
        conversations: Vec<ConversationSummary>,
    },
}

impl SearchOutcome {
    pub fn conversations(&self) -> Option<&[ConversationSummary]> {
        match self {
            Self::NotSearched => None,
            Self::Searched { conversations, .. } => Some(conversations),
        }
    }
}

/// Filters `records` by a case-insensitive substring of question or answer,
/// then groups what is left. Blank terms perform no search.
pub fn search_records(term: &str, records: &[LogRecord]) -> SearchOutcome {
    let term = term.trim();
    if term.is_empty() {
        return SearchOutcome::NotSearched;
    }

    let needle = term.to_lowercase();
    let matching: Vec<LogRecord> = records.iter().filter(|r| r.matches(&needle)).cloned().collect();

    SearchOutcome::Searched {
        term: term.to_string(),
        conversations: group_records(&matching),
    }
}

type SearchResult = (String, Result<Vec<LogRecord>, StoreError>);

/// Debounced search against the store. Each keystroke restarts the window;
/// only the newest term's results are ever applied.
pub struct SearchView {
    store: Arc<dyn LogStore>,
    delay: Duration,
    outcome: SearchOutcome,
    last_error: Option<StoreError>,
    debouncer: Debouncer<SearchResult>,
}

impl SearchView {
    pub fn new(store: Arc<dyn LogStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            outcome: SearchOutcome::NotSearched,
            last_error: None,
            debouncer: Debouncer::new(),
        }
    }

    pub fn outcome(&self) -> &SearchOutcome {
        &self.outcome
    }

    pub fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// The search box changed.
    pub fn input(&mut self, term: &str) {
        let term = term.trim().to_string();
        if term.is_empty() {
            self.debouncer.cancel();
            self.outcome = SearchOutcome::NotSearched;
            self.last_error = None;
            return;
        }

        let store = self.store.clone();
        self.debouncer.schedule(self.delay, move |_| async move {
            let result = store.fetch(&LogQuery::for_term(Some(&term))).await;
            (term, result)
        });
    }

    /// Waits for the newest pending search and applies it.
    pub async fn next(&mut self) -> &SearchOutcome {
        if let Some((term, result)) = self.debouncer.next().await {
            match result {
                Ok(records) => {
                    self.outcome = search_records(&term, &records);
                    self.last_error = None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, %term, "search failed");
                    self.last_error = Some(e);
                }
            }
        }
        &self.outcome
    }

    /// The view closed; drop anything in flight.
    pub fn close(&mut self) {
        self.debouncer.cancel();
    }
}
