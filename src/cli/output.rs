use crate::core::record::{display_time, LogRecord};
use crate::history::{ConversationSummary, SearchOutcome, ViewState};

const TITLE_WIDTH: usize = 48;

fn truncate(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let truncated: String = line.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{truncated}...")
}

pub(crate) fn empty_message(outcome: &SearchOutcome) -> String {
    match outcome {
        SearchOutcome::NotSearched => "No conversations yet.".into(),
        SearchOutcome::Searched { term, .. } => format!("No conversations match \"{term}\"."),
    }
}

pub fn print_conversations(summaries: &[ConversationSummary], view: &ViewState, outcome: &SearchOutcome) {
    if summaries.is_empty() {
        println!("\x1b[90m{}\x1b[0m", empty_message(outcome));
        return;
    }

    let selecting = view.selection.is_selecting();
    for summary in summaries {
        let marker = if selecting {
            if view.selection.is_selected(&summary.key) {
                "[x] "
            } else {
                "[ ] "
            }
        } else if summary.session_id.is_some() && summary.session_id.as_deref() == view.active.id() {
            "\x1b[32m*\x1b[0m "
        } else {
            "  "
        };

        println!(
            "{marker}\x1b[1m{:<width$}\x1b[0m  \x1b[36m{}\x1b[0m  {} msg  \x1b[90m{}  {}\x1b[0m",
            truncate(&summary.title, TITLE_WIDTH),
            summary.key,
            summary.message_count,
            summary.model,
            display_time(&summary.latest_timestamp),
            width = TITLE_WIDTH,
        );
    }
}

pub fn print_transcript(records: &[LogRecord]) {
    for record in records {
        println!(
            "\x1b[90m{}  {}\x1b[0m",
            display_time(&record.created_at),
            record.model
        );
        println!("\x1b[32;1m>\x1b[0m {}", record.question);
        println!("{}\n", record.answer);
    }
}
