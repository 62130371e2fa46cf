use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::error::DeletionError;
use crate::core::record::LogRecord;
use crate::core::store::{DeletionTarget, LogStore};
use crate::history::grouping::{find_by_key, ConversationSummary};
use crate::history::selection::SelectionState;
use crate::history::sync::HistoryVersion;

/// The conversation loaded in the chat view. `None` is a fresh conversation
/// that has not been saved yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSession(Option<String>);

impl ActiveSession {
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_fresh(&self) -> bool {
        self.0.is_none()
    }

    pub fn set(&mut self, session_id: Option<String>) {
        self.0 = session_id;
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}

/// UI-owned state the engine reconciles after mutations.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub selection: SelectionState,
    pub active: ActiveSession,
    /// Records shown in the chat view, oldest first.
    pub transcript: Vec<LogRecord>,
}

impl ViewState {
    /// Back to an empty, unsaved conversation.
    pub fn reset_conversation(&mut self) {
        self.active.clear();
        self.transcript.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionReport {
    /// Records the store reported removed. Informational only.
    pub removed: u64,
    /// Whether the chat view was reset to a fresh conversation.
    pub cleared_active: bool,
}

/// Builds a deletion target from the current selection.
///
/// Keys are resolved against `summaries`. Legacy conversations have no session
/// id to delete by and keys that no longer resolve are skipped, so the result
/// may be empty.
pub fn selection_target(selection: &SelectionState, summaries: &[ConversationSummary]) -> DeletionTarget {
    DeletionTarget::sessions(
        selection
            .selected_keys()
            .filter_map(|key| find_by_key(summaries, key))
            .filter_map(|summary| summary.session_id.clone()),
    )
}

/// Applies deletions to the store and reconciles the view afterwards.
///
/// Only one deletion runs at a time; a request made while another is in
/// flight is rejected with [`DeletionError::Busy`]. On failure the view is
/// left exactly as it was.
pub struct DeletionCoordinator {
    store: Arc<dyn LogStore>,
    version: HistoryVersion,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DeletionCoordinator {
    pub fn new(store: Arc<dyn LogStore>, version: HistoryVersion) -> Self {
        Self {
            store,
            version,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn request_deletion(
        &self,
        target: DeletionTarget,
        view: &mut ViewState,
    ) -> Result<DeletionReport, DeletionError> {
        if matches!(&target, DeletionTarget::Sessions(ids) if ids.is_empty()) {
            return Err(DeletionError::EmptySelection);
        }

        let _guard = self.acquire()?;

        let removed = match self.store.delete(&target).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, ?target, "deletion failed");
                return Err(e.into());
            }
        };
        tracing::info!(removed, ?target, "deleted conversations");

        self.version.bump();

        let cleared_active = match (&target, view.active.id()) {
            (DeletionTarget::All, _) => true,
            (DeletionTarget::Sessions(_), Some(id)) => target.includes_session(id),
            (DeletionTarget::Sessions(_), None) => false,
        };
        if cleared_active {
            view.reset_conversation();
        }
        view.selection.deletion_succeeded();

        Ok(DeletionReport {
            removed,
            cleared_active,
        })
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, DeletionError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DeletionError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }
}
