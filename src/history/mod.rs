//! Session reconciliation: turns the flat exchange log into a conversation
//! list and keeps that list, the selection and the active conversation
//! consistent under deletion, search and new messages.

mod debounce;
mod deletion;
mod grouping;
mod search;
mod selection;
mod sync;


pub use debounce::Debouncer;
pub use deletion::{selection_target, ActiveSession, DeletionCoordinator, DeletionReport, ViewState};
pub use grouping::{find_by_key, group_records, legacy_key, ConversationSummary, LEGACY_KEY_PREFIX};
pub use search::{search_records, SearchOutcome, SearchView};
pub use selection::{RowAction, SelectionState};
pub use sync::{FetchState, HistoryVersion, ModelListRefresher, ModelListState, ViewSynchronizer};
