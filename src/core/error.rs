use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Deletion failed: {0}")]
    Deletion(#[from] DeletionError),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Unexpected response: {0}")]
    Response(String),

    #[error("Missing API key: {0}")]
    MissingApiKey(String),
}

/// Failures of the log store. A record with unreadable fields is not one of
/// these; it is returned with degraded fields instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No log store configured. Set CHATLOG_STORE_URL or `store_url` in the config file.")]
    Unconfigured,

    #[error("Store transport error: {0}")]
    Transport(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeletionError {
    #[error("Another deletion is still in progress")]
    Busy,

    #[error("Nothing selected that can be deleted")]
    EmptySelection,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file error: {0}")]
    File(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
