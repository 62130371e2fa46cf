use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::error::ChatError;
use crate::core::provider::Provider;
use crate::core::record::LogRecord;
use crate::core::store::{DeletionTarget, LogStore};
use crate::history::{
    find_by_key, selection_target, ConversationSummary, DeletionCoordinator, DeletionReport,
    HistoryVersion, RowAction, ViewState,
};

/// Wires the reconciliation engine to its collaborators: sends messages,
/// loads conversations and runs deletions against one shared view state.
pub struct ChatController {
    config: AppConfig,
    store: Arc<dyn LogStore>,
    provider: Arc<dyn Provider>,
    version: HistoryVersion,
    deletion: DeletionCoordinator,
    view: ViewState,
}

impl ChatController {
    pub fn new(config: AppConfig, store: Arc<dyn LogStore>, provider: Arc<dyn Provider>) -> Self {
        let version = HistoryVersion::new();
        Self {
            deletion: DeletionCoordinator::new(store.clone(), version.clone()),
            config,
            store,
            provider,
            version,
            view: ViewState::default(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn LogStore> {
        self.store.clone()
    }

    pub fn version(&self) -> &HistoryVersion {
        &self.version
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Asks the provider and appends the exchange to the active conversation,
    /// starting a new session when none is active.
    pub async fn send(&mut self, message: &str) -> Result<LogRecord, ChatError> {
        let completion = self
            .provider
            .complete(message, &self.view.transcript, &self.config.system_instruction)
            .await?;

        let session_id = self
            .view
            .active
            .id()
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let record = LogRecord::new(
            Some(session_id.clone()),
            message.to_string(),
            completion.answer,
            self.provider.model().to_string(),
        );
        self.store.append(&record).await?;
        tracing::debug!(
            %session_id,
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "exchange saved"
        );

        self.view.active.set(Some(session_id));
        self.view.transcript.push(record.clone());
        self.version.bump();
        Ok(record)
    }

    /// A click on a conversation row: loads it while browsing, toggles it
    /// while selecting.
    pub fn click(&mut self, key: &str, summaries: &[ConversationSummary]) -> Result<RowAction, ChatError> {
        let action = self.view.selection.click(key);
        if let RowAction::Load(key) = &action {
            let summary =
                find_by_key(summaries, key).ok_or_else(|| ChatError::ConversationNotFound(key.clone()))?;
            self.load(summary);
        }
        Ok(action)
    }

    pub fn load(&mut self, summary: &ConversationSummary) {
        self.view.active.set(summary.session_id.clone());
        self.view.transcript = summary.ordered_records.clone();
        self.version.bump();
    }

    /// Loads a session straight from the store, e.g. when resuming by id.
    pub async fn resume(&mut self, session_id: &str) -> Result<(), ChatError> {
        let records = self.store.fetch_session(session_id).await?;
        if records.is_empty() {
            return Err(ChatError::ConversationNotFound(session_id.to_string()));
        }
        self.view.active.set(Some(session_id.to_string()));
        self.view.transcript = records;
        self.version.bump();
        Ok(())
    }

    pub fn new_conversation(&mut self) {
        self.view.reset_conversation();
    }

    pub fn enter_selection(&mut self) {
        self.view.selection.enter_selection();
    }

    pub fn cancel_selection(&mut self) {
        self.view.selection.cancel();
    }

    pub async fn delete_selected(
        &mut self,
        summaries: &[ConversationSummary],
    ) -> Result<DeletionReport, ChatError> {
        let target = selection_target(&self.view.selection, summaries);
        self.delete(target).await
    }

    pub async fn delete_all(&mut self) -> Result<DeletionReport, ChatError> {
        self.delete(DeletionTarget::All).await
    }

    pub async fn delete(&mut self, target: DeletionTarget) -> Result<DeletionReport, ChatError> {
        Ok(self.deletion.request_deletion(target, &mut self.view).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{DeletionError, ProviderError};
    use crate::core::provider::Completion;
    use crate::history::tests::{rec, MemoryStore};
    use crate::history::{group_records, SelectionState};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoProvider {
        seen_history: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl EchoProvider {
        fn new() -> Self {
            Self {
                seen_history: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Provider for EchoProvider {
        async fn complete(
            &self,
            message: &str,
            history: &[LogRecord],
            _system_instruction: &str,
        ) -> Result<Completion, ProviderError> {
            if self.fail {
                return Err(ProviderError::Http("offline".into()));
            }
            self.seen_history.lock().unwrap().push(history.len());
            Ok(Completion {
                answer: format!("echo: {message}"),
                usage: Default::default(),
            })
        }

        fn model(&self) -> &str {
            "echo-1"
        }
    }

    fn controller(store: Arc<MemoryStore>, provider: Arc<EchoProvider>) -> ChatController {
        ChatController::new(AppConfig::default(), store, provider)
    }

    #[tokio::test]
    async fn test_send_starts_and_continues_session() {
        let store = Arc::new(MemoryStore::default());
        let provider = Arc::new(EchoProvider::new());
        let mut chat = controller(store.clone(), provider.clone());

        let first = chat.send("hello").await.unwrap();
        let second = chat.send("again").await.unwrap();

        assert_eq!(first.answer, "echo: hello");
        assert_eq!(first.model, "echo-1");
        assert!(first.session_id.is_some());
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(chat.view().active.id(), first.session_id.as_deref());
        assert_eq!(*provider.seen_history.lock().unwrap(), vec![0, 1]);
        assert_eq!(store.records().len(), 2);
        assert_eq!(chat.version().current(), 2);
    }

    #[tokio::test]
    async fn test_send_failure_persists_nothing() {
        let store = Arc::new(MemoryStore::default());
        let provider = Arc::new(EchoProvider {
            fail: true,
            ..EchoProvider::new()
        });
        let mut chat = controller(store.clone(), provider);

        assert!(matches!(chat.send("hi").await, Err(ChatError::Provider(_))));
        assert!(store.records().is_empty());
        assert!(chat.view().active.is_fresh());
        assert_eq!(chat.version().current(), 0);
    }

    #[tokio::test]
    async fn test_click_loads_only_while_browsing() {
        let store = Arc::new(MemoryStore::default());
        let mut chat = controller(store, Arc::new(EchoProvider::new()));
        let summaries = group_records(&[
            rec(Some("A"), "hi", "hello", 1),
            rec(Some("A"), "bye", "later", 2),
            rec(None, "legacy", "old", 0),
        ]);

        assert_eq!(chat.click("A", &summaries).unwrap(), RowAction::Load("A".into()));
        assert_eq!(chat.view().active.id(), Some("A"));
        assert_eq!(chat.view().transcript.len(), 2);

        chat.enter_selection();
        let action = chat.click("legacy-2", &summaries).unwrap();
        assert_eq!(action, RowAction::Toggled { key: "legacy-2".into(), selected: true });
        // Still showing A
        assert_eq!(chat.view().active.id(), Some("A"));

        chat.cancel_selection();
        chat.click("legacy-2", &summaries).unwrap();
        assert!(chat.view().active.is_fresh());
        assert_eq!(chat.view().transcript[0].question, "legacy");

        assert!(matches!(
            chat.click("missing", &summaries),
            Err(ChatError::ConversationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_selected_drops_legacy_keys() {
        let store = Arc::new(MemoryStore::with_records(vec![
            rec(Some("A"), "hi", "hello", 1),
            rec(Some("B"), "b", "b", 2),
            rec(None, "legacy", "old", 0),
        ]));
        let mut chat = controller(store.clone(), Arc::new(EchoProvider::new()));
        let summaries = group_records(&store.records());

        chat.enter_selection();
        chat.click("A", &summaries).unwrap();
        chat.click("legacy-2", &summaries).unwrap();

        let report = chat.delete_selected(&summaries).await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(store.deletes(), vec![DeletionTarget::sessions(["A"])]);
        assert_eq!(chat.view().selection, SelectionState::Browsing);
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_selected_with_only_legacy_keys() {
        let store = Arc::new(MemoryStore::with_records(vec![rec(None, "legacy", "old", 0)]));
        let mut chat = controller(store.clone(), Arc::new(EchoProvider::new()));
        let summaries = group_records(&store.records());

        chat.enter_selection();
        chat.click("legacy-0", &summaries).unwrap();

        let err = chat.delete_selected(&summaries).await.unwrap_err();
        assert!(matches!(err, ChatError::Deletion(DeletionError::EmptySelection)));
        assert!(chat.view().selection.is_selecting());
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_all_after_chatting() {
        let store = Arc::new(MemoryStore::with_records(vec![rec(None, "legacy", "old", 0)]));
        let mut chat = controller(store.clone(), Arc::new(EchoProvider::new()));
        chat.send("hello").await.unwrap();

        let report = chat.delete_all().await.unwrap();
        assert_eq!(report.removed, 2);
        assert!(chat.view().active.is_fresh());
        assert!(chat.view().transcript.is_empty());
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_resume_session() {
        let store = Arc::new(MemoryStore::with_records(vec![
            rec(Some("A"), "second", "", 2),
            rec(Some("A"), "first", "", 1),
        ]));
        let mut chat = controller(store, Arc::new(EchoProvider::new()));

        chat.resume("A").await.unwrap();
        assert_eq!(chat.view().transcript[0].question, "first");
        assert!(matches!(
            chat.resume("nope").await,
            Err(ChatError::ConversationNotFound(_))
        ));

        chat.new_conversation();
        assert!(chat.view().active.is_fresh());
    }
}
