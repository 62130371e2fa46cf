mod output;
mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::chat::ChatController;
use crate::core::config::{load_config, AppConfig};
use crate::core::store::{DeletionTarget, LogQuery, LogStore};
use crate::history::{find_by_key, group_records, search_records, SearchOutcome, ViewState};
use crate::providers::create_provider;
use crate::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "chatlog", version, about = "LLM chat with a searchable conversation history")]
struct Cli {
    /// Working directory
    #[arg(short = 'c', long = "cwd")]
    working_dir: Option<PathBuf>,

    /// Log store URL (overrides config)
    #[arg(long, env = "CHATLOG_STORE_URL")]
    store: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (default)
    Chat {
        /// Resume a conversation by session id
        #[arg(long)]
        session: Option<String>,
    },
    /// List conversations, most recent first
    List {
        /// Only conversations whose messages contain this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Print one conversation by key
    Show { key: String },
    /// Delete conversations by session id, or everything with --all
    Delete {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        session_ids: Vec<String>,

        /// Delete every conversation, including ones without a session id
        #[arg(long)]
        all: bool,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.working_dir.clone()).map_err(|e| anyhow::anyhow!("{e}"))?;
    if cli.store.is_some() {
        config.store_url = cli.store.clone();
    }

    let filter = if cli.debug || config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let db = Database::connect(config.store_url())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    db.run_migrations()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let store: Arc<dyn LogStore> = Arc::new(db.logs());

    match cli.command.unwrap_or(Command::Chat { session: None }) {
        Command::Chat { session } => {
            let chat = controller(config, store);
            repl::run(chat, session).await
        }
        Command::List { search } => list(store.as_ref(), search.as_deref()).await,
        Command::Show { key } => show(store.as_ref(), &key).await,
        Command::Delete { session_ids, all } => {
            let target = if all {
                DeletionTarget::All
            } else {
                DeletionTarget::sessions(session_ids)
            };
            let mut chat = controller(config, store);
            let report = chat.delete(target).await.map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("Deleted {} record(s).", report.removed);
            Ok(())
        }
    }
}

fn controller(config: AppConfig, store: Arc<dyn LogStore>) -> ChatController {
    let provider = create_provider(&config);
    ChatController::new(config, store, provider)
}

async fn list(store: &dyn LogStore, search: Option<&str>) -> Result<()> {
    let records = store
        .fetch(&LogQuery::for_term(search))
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let outcome = search.map(|term| search_records(term, &records)).unwrap_or_default();
    match &outcome {
        SearchOutcome::NotSearched => {
            output::print_conversations(&group_records(&records), &ViewState::default(), &outcome)
        }
        SearchOutcome::Searched { conversations, .. } => {
            output::print_conversations(conversations, &ViewState::default(), &outcome)
        }
    }
    Ok(())
}

async fn show(store: &dyn LogStore, key: &str) -> Result<()> {
    let records = store
        .fetch(&LogQuery::for_term(None))
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let summaries = group_records(&records);
    let summary = find_by_key(&summaries, key)
        .ok_or_else(|| anyhow::anyhow!("No conversation with key {key}"))?;
    output::print_transcript(&summary.ordered_records);
    Ok(())
}
