mod openai;

pub use openai::OpenAiProvider;

use crate::core::config::AppConfig;
use std::sync::Arc;


/// Builds the completion provider described by the LLM settings.
///
/// A missing API key is not an error here; it surfaces on the first request
/// so history browsing keeps working without one.
pub fn create_provider(config: &AppConfig) -> Arc<OpenAiProvider> {
    let llm = &config.llm;
    Arc::new(OpenAiProvider::new(
        llm.api_key.clone(),
        llm.model.clone(),
        llm.base_url.clone(),
        llm.max_tokens,
    ))
}
