use anyhow::Result;
use std::io::{self, Write};

use super::output;
use crate::chat::ChatController;
use crate::history::{
    ConversationSummary, ModelListRefresher, ModelListState, RowAction, SearchOutcome, SearchView,
    ViewSynchronizer,
};
use crate::providers::create_provider;

struct Sidebar {
    sync: ViewSynchronizer,
    search: SearchView,
}

impl Sidebar {
    /// Conversations currently on screen; keys typed by the user refer to these.
    fn displayed(&self) -> &[ConversationSummary] {
        self.search
            .outcome()
            .conversations()
            .unwrap_or_else(|| self.sync.conversations())
    }
}

pub async fn run(mut chat: ChatController, resume_session: Option<String>) -> Result<()> {
    println!("\x1b[1mchatlog\x1b[0m v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: \x1b[36m{}\x1b[0m", chat.model());
    if !chat.config().has_api_key() {
        println!("\x1b[33mNo API key set (OPENAI_API_KEY). History commands still work.\x1b[0m");
    }
    println!("Type \x1b[33m/help\x1b[0m for commands, \x1b[33mCtrl-D\x1b[0m to exit.\n");

    if let Some(id) = resume_session {
        chat.resume(&id).await.map_err(|e| anyhow::anyhow!("{e}"))?;
        output::print_transcript(&chat.view().transcript);
    }

    let mut sidebar = Sidebar {
        sync: ViewSynchronizer::new(chat.store(), chat.version()),
        search: SearchView::new(chat.store(), chat.config().debounce.search()),
    };
    if let Err(e) = sidebar.sync.open().await {
        eprintln!("\x1b[33mCould not load history: {e}\x1b[0m");
    }

    loop {
        eprint!("\x1b[32;1mchat>\x1b[0m ");
        io::stderr().flush().ok();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => {
                println!("\nGoodbye!");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        }

        let input = input.trim().to_string();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match handle_command(&input, &mut chat, &mut sidebar).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => eprintln!("\x1b[31mCommand error: {e}\x1b[0m"),
            }
        } else {
            match chat.send(&input).await {
                Ok(record) => println!("\n{}\n", record.answer),
                Err(e) => eprintln!("\x1b[31mError: {e}\x1b[0m"),
            }
        }

        if let Err(e) = sidebar.sync.refresh_if_changed().await {
            eprintln!("\x1b[33mHistory refresh failed: {e}\x1b[0m");
        }
    }

    sidebar.search.close();
    Ok(())
}

async fn handle_command(input: &str, chat: &mut ChatController, sidebar: &mut Sidebar) -> Result<bool> {
    let (cmd, arg) = match input.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (input, ""),
    };

    match cmd {
        "/quit" | "/exit" | "/q" => return Ok(false),
        "/help" => print_help(),
        "/history" => {
            output::print_conversations(sidebar.displayed(), chat.view(), sidebar.search.outcome());
        }
        "/search" => {
            sidebar.search.input(arg);
            sidebar.search.next().await;
            if let Some(e) = sidebar.search.last_error() {
                eprintln!("\x1b[33mSearch failed: {e}\x1b[0m");
            }
            if let SearchOutcome::NotSearched = sidebar.search.outcome() {
                println!("\x1b[90mSearch cleared.\x1b[0m");
            }
            output::print_conversations(sidebar.displayed(), chat.view(), sidebar.search.outcome());
        }
        "/load" => {
            if chat.view().selection.is_selecting() {
                anyhow::bail!("finish or /cancel the selection first");
            }
            chat.click(arg, sidebar.displayed())?;
            output::print_transcript(&chat.view().transcript);
        }
        "/new" => {
            chat.new_conversation();
            println!("\x1b[90mStarted a new conversation.\x1b[0m");
        }
        "/select" => {
            chat.enter_selection();
            println!("\x1b[90mSelecting. /toggle KEY, then /delete or /cancel.\x1b[0m");
        }
        "/toggle" => {
            if !chat.view().selection.is_selecting() {
                anyhow::bail!("not selecting; run /select first");
            }
            if let RowAction::Toggled { key, selected } = chat.click(arg, sidebar.displayed())? {
                let state = if selected { "selected" } else { "unselected" };
                println!("{key} {state} ({} total)", chat.view().selection.selected_count());
            }
        }
        "/cancel" => {
            chat.cancel_selection();
        }
        "/delete" => {
            let summaries = sidebar.displayed().to_vec();
            let report = chat.delete_selected(&summaries).await?;
            println!("Deleted {} record(s).", report.removed);
            sidebar.search.input("");
        }
        "/delete-all" => {
            let report = chat.delete_all().await?;
            println!("Deleted {} record(s).", report.removed);
            sidebar.search.input("");
        }
        "/models" => {
            let llm = &chat.config().llm;
            let catalog = create_provider(chat.config());
            let mut refresher = ModelListRefresher::new(
                catalog,
                chat.config().debounce.clone(),
                llm.base_url.clone(),
                llm.api_key.clone(),
            );
            let url = if arg.is_empty() { llm.base_url.clone() } else { arg.to_string() };
            refresher.base_url_changed(&url);
            match refresher.next().await {
                ModelListState::Loaded(models) => models.iter().for_each(|m| println!("  {m}")),
                ModelListState::Error(e) => eprintln!("\x1b[33mModel lookup failed: {e}\x1b[0m"),
                ModelListState::Idle | ModelListState::Loading => {}
            }
        }
        other => anyhow::bail!("unknown command {other}; try /help"),
    }

    Ok(true)
}

fn print_help() {
    println!(
        "\
  /history          list conversations
  /search [TERM]    filter conversations; no term clears the search
  /load KEY         open a conversation
  /new              start a new conversation
  /select           enter selection mode
  /toggle KEY       select or unselect a conversation
  /cancel           leave selection mode
  /delete           delete the selected conversations
  /delete-all       delete every conversation
  /models [URL]     list models offered by an endpoint
  /quit             exit"
    );
}
