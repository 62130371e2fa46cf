use std::sync::Arc;
use tokio::sync::watch;

use crate::core::config::DebounceSettings;
use crate::core::error::{ProviderError, StoreError};
use crate::core::provider::ModelCatalog;
use crate::core::record::LogRecord;
use crate::core::store::{LogQuery, LogStore};
use crate::history::debounce::Debouncer;
use crate::history::grouping::{group_records, ConversationSummary};

/// Monotonic counter whose increments mean "the conversation list is stale".
///
/// Clones share the same counter.
#[derive(Clone)]
pub struct HistoryVersion {
    tx: Arc<watch::Sender<u64>>,
}

impl HistoryVersion {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn bump(&self) -> u64 {
        self.tx.send_modify(|v| *v += 1);
        self.current()
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for HistoryVersion {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Loading,
    Loaded,
    Error(StoreError),
}

/// Keeps the grouped conversation list in step with the history version.
///
/// Version-driven refreshes are not debounced: each bump comes from a
/// discrete user action. A failed fetch leaves the previous list in place
/// and moves to [`FetchState::Error`].
pub struct ViewSynchronizer {
    store: Arc<dyn LogStore>,
    version: watch::Receiver<u64>,
    state: FetchState,
    records: Vec<LogRecord>,
    conversations: Vec<ConversationSummary>,
}

impl ViewSynchronizer {
    pub fn new(store: Arc<dyn LogStore>, version: &HistoryVersion) -> Self {
        Self {
            store,
            version: version.subscribe(),
            state: FetchState::Idle,
            records: Vec::new(),
            conversations: Vec::new(),
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    /// Called when the view is (re)opened. Always fetches.
    pub async fn open(&mut self) -> Result<&[ConversationSummary], StoreError> {
        self.version.borrow_and_update();
        self.refresh().await?;
        Ok(&self.conversations)
    }

    /// Fetch-then-group.
    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        self.state = FetchState::Loading;
        match self.store.fetch(&LogQuery::for_term(None)).await {
            Ok(records) => {
                self.conversations = group_records(&records);
                self.records = records;
                self.state = FetchState::Loaded;
                tracing::debug!(
                    version = *self.version.borrow(),
                    conversations = self.conversations.len(),
                    "conversation list refreshed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "conversation list refresh failed");
                self.state = FetchState::Error(e.clone());
                Err(e)
            }
        }
    }

    /// Refreshes only if the version moved since the last look.
    pub async fn refresh_if_changed(&mut self) -> Result<bool, StoreError> {
        if !self.version.has_changed().unwrap_or(false) {
            return Ok(false);
        }
        self.version.borrow_and_update();
        self.refresh().await?;
        Ok(true)
    }

    /// Waits for the next version change, then refreshes. Returns `false` once
    /// every [`HistoryVersion`] handle is gone.
    pub async fn next_change(&mut self) -> Result<bool, StoreError> {
        if self.version.changed().await.is_err() {
            return Ok(false);
        }
        self.version.borrow_and_update();
        self.refresh().await?;
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelListState {
    Idle,
    Loading,
    Loaded(Vec<String>),
    Error(String),
}

/// Model-list lookups driven by typing in the endpoint settings.
///
/// Base-URL and API-key edits have their own debounce windows. Any edit
/// restarts the window and supersedes an in-flight lookup.
pub struct ModelListRefresher {
    catalog: Arc<dyn ModelCatalog>,
    windows: DebounceSettings,
    base_url: String,
    api_key: Option<String>,
    state: ModelListState,
    debouncer: Debouncer<Result<Vec<String>, ProviderError>>,
}

impl ModelListRefresher {
    pub fn new(
        catalog: Arc<dyn ModelCatalog>,
        windows: DebounceSettings,
        base_url: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            catalog,
            windows,
            base_url,
            api_key,
            state: ModelListState::Idle,
            debouncer: Debouncer::new(),
        }
    }

    pub fn state(&self) -> &ModelListState {
        &self.state
    }

    pub fn base_url_changed(&mut self, base_url: &str) {
        self.base_url = base_url.trim().to_string();
        self.schedule(self.windows.base_url());
    }

    pub fn api_key_changed(&mut self, api_key: &str) {
        let key = api_key.trim();
        self.api_key = (!key.is_empty()).then(|| key.to_string());
        self.schedule(self.windows.api_key());
    }

    /// The settings view closed; nothing pending may land afterwards.
    pub fn close(&mut self) {
        self.debouncer.cancel();
        if self.state == ModelListState::Loading {
            self.state = ModelListState::Idle;
        }
    }

    /// Applies the latest lookup once it completes.
    pub async fn next(&mut self) -> &ModelListState {
        if let Some(result) = self.debouncer.next().await {
            self.state = match result {
                Ok(models) => ModelListState::Loaded(models),
                Err(e) => ModelListState::Error(e.to_string()),
            };
        }
        &self.state
    }

    fn schedule(&mut self, window: std::time::Duration) {
        if self.base_url.is_empty() {
            self.debouncer.cancel();
            self.state = ModelListState::Idle;
            return;
        }

        let catalog = self.catalog.clone();
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();
        self.state = ModelListState::Loading;
        self.debouncer.schedule(window, move |_| async move {
            catalog.list_models(&base_url, api_key.as_deref()).await
        });
    }
}
