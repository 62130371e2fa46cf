use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::ConfigError;

/// OpenAI-compatible default endpoint
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";

/// Settings read once at startup and passed down explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default)]
    pub llm: LlmSettings,

    /// Log store connection string, e.g. `sqlite://chatlog.db`
    #[serde(default)]
    pub store_url: Option<String>,

    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    #[serde(default)]
    pub debounce: DebounceSettings,

    #[serde(default)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            llm: LlmSettings::default(),
            store_url: None,
            system_instruction: default_system_instruction(),
            debounce: DebounceSettings::default(),
            debug: false,
        }
    }
}

fn default_working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_system_instruction() -> String {
    DEFAULT_SYSTEM_INSTRUCTION.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_max_tokens() -> u64 {
    4_096
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Debounce windows, in milliseconds, for input-driven fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceSettings {
    #[serde(default = "default_search_ms")]
    pub search_ms: u64,

    #[serde(default = "default_base_url_ms")]
    pub base_url_ms: u64,

    #[serde(default = "default_api_key_ms")]
    pub api_key_ms: u64,
}

fn default_search_ms() -> u64 {
    300
}

fn default_base_url_ms() -> u64 {
    500
}

fn default_api_key_ms() -> u64 {
    800
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            search_ms: default_search_ms(),
            base_url_ms: default_base_url_ms(),
            api_key_ms: default_api_key_ms(),
        }
    }
}

impl DebounceSettings {
    pub fn search(&self) -> Duration {
        Duration::from_millis(self.search_ms)
    }

    pub fn base_url(&self) -> Duration {
        Duration::from_millis(self.base_url_ms)
    }

    pub fn api_key(&self) -> Duration {
        Duration::from_millis(self.api_key_ms)
    }
}

pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut config = AppConfig {
        working_dir: wd.clone(),
        ..AppConfig::default()
    };

    // Global config first, project-local config overrides it
    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("chatlog").join("config.json");
        if global_path.exists() {
            merge_config(&mut config, read_config_file(&global_path)?);
        }
    }

    let local_path = wd.join("chatlog.json");
    if local_path.exists() {
        merge_config(&mut config, read_config_file(&local_path)?);
    }

    apply_env(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

fn read_config_file(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))
}

pub(crate) fn merge_config(base: &mut AppConfig, overlay: AppConfig) {
    if overlay.llm.base_url != default_base_url() {
        base.llm.base_url = overlay.llm.base_url;
    }
    if overlay.llm.api_key.is_some() {
        base.llm.api_key = overlay.llm.api_key;
    }
    if overlay.llm.model != default_model() {
        base.llm.model = overlay.llm.model;
    }
    if overlay.llm.max_tokens != default_max_tokens() {
        base.llm.max_tokens = overlay.llm.max_tokens;
    }
    if overlay.store_url.is_some() {
        base.store_url = overlay.store_url;
    }
    if overlay.system_instruction != default_system_instruction() {
        base.system_instruction = overlay.system_instruction;
    }
    if overlay.debounce.search_ms != default_search_ms() {
        base.debounce.search_ms = overlay.debounce.search_ms;
    }
    if overlay.debounce.base_url_ms != default_base_url_ms() {
        base.debounce.base_url_ms = overlay.debounce.base_url_ms;
    }
    if overlay.debounce.api_key_ms != default_api_key_ms() {
        base.debounce.api_key_ms = overlay.debounce.api_key_ms;
    }
    if overlay.debug {
        base.debug = true;
    }
}

/// Environment overrides. `lookup` is injected so tests need not touch the
/// process environment.
pub(crate) fn apply_env<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty("CHATLOG_STORE_URL") {
        config.store_url = Some(url);
    }
    if let Some(url) = non_empty("CHATLOG_BASE_URL") {
        config.llm.base_url = url;
    }
    if let Some(model) = non_empty("CHATLOG_MODEL") {
        config.llm.model = model;
    }
    if config.llm.api_key.is_none() {
        config.llm.api_key = ["CHATLOG_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|key| non_empty(key));
    }
}

impl AppConfig {
    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    /// Connection string for the log store, if one is configured.
    pub fn store_url(&self) -> Option<&str> {
        self.store_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}
