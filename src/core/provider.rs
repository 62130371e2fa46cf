use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::ProviderError;
use crate::core::record::LogRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub answer: String,
    pub usage: TokenUsage,
}

/// LLM chat-completion backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Answers `message` given the earlier exchanges of the same conversation.
    async fn complete(
        &self,
        message: &str,
        history: &[LogRecord],
        system_instruction: &str,
    ) -> Result<Completion, ProviderError>;

    /// Model identifier recorded on every log record this provider answers.
    fn model(&self) -> &str;
}

/// Lists the models an endpoint offers. Fed by settings typing, so callers
/// debounce it.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn list_models(
        &self,
        base_url: &str,
        api_key: Option<&str>,
    ) -> Result<Vec<String>, ProviderError>;
}
