//! Interactive terminal client for the SheetMate assistant.
//! Run with: cargo run --bin sheetmate
//!
//! Plain lines are sent as chat messages. Lines starting with `/` are
//! commands, see `/help`.
//!
//! Chat messages are not added to the query history unless the client is
//! started with `--record-history`.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, BufReader};

use sheetmate_agent::assistant::HttpAssistantClient;
use sheetmate_agent::capabilities::{Clipboard, Notice, Notifier};
use sheetmate_agent::core::AssistantConfig;
use sheetmate_agent::session::{
    AnalysisKind, Applied, AssistantSession, Commit, OperationStatus, ResultSection,
};

const HELP: &str = "\
  Commands:
    <text>               ask the assistant
    /formula <formula>   set the formula to analyse
    /error [message]     set or clear the error message used by /debug
    /validate            validate the formula
    /explain             explain the formula
    /debug               debug the formula
    /history [filter]    list past queries
    /repeat <n>          send history entry n again
    /clear-history       forget all past queries
    /save                save the last question and answer
    /saved [filter]      list saved answers
    /open <n>            fold or unfold saved answer n
    /copy <n>            copy saved answer n to the clipboard
    /delete <n>          delete saved answer n
    /dismiss             hide the error banner
    /help                show this help
    /quit                leave";

/// Command-line flag that records typed chat messages in the history.
const RECORD_HISTORY_FLAG: &str = "--record-history";

/// Characters of a folded saved answer shown in listings.
const PREVIEW_CHARS: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Prints notices inline.
struct PrintNotifier;

impl Notifier for PrintNotifier {
    fn notify(&self, notice: Notice) {
        println!("  [{}] {}", notice.title, notice.description);
    }
}

/// Sets the clipboard through the OSC 52 terminal escape sequence.
struct TerminalClipboard;

impl Clipboard for TerminalClipboard {
    fn write_text(&self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        write!(out, "\x1b]52;c;{}\x07", STANDARD.encode(text))?;
        out.flush()
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn parse_index(arg: &str, len: usize) -> Option<usize> {
    let n: usize = arg.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

fn print_sections(sections: &[ResultSection<'_>]) {
    for section in sections {
        println!("  {}:", section.title);
        for item in section.items {
            println!("    - {item}");
        }
    }
}

fn print_history(session: &AssistantSession, needle: &str) {
    let history = session.history();
    let entries = history.entries();
    let mut shown = 0;
    for entry in history.filter(needle) {
        let n = entries.iter().position(|e| e.id == entry.id).map_or(0, |i| i + 1);
        println!(
            "  {n:>3}. {} {}  {}",
            entry.date,
            entry.time.format("%H:%M"),
            entry.query_text
        );
        shown += 1;
    }
    if shown == 0 {
        println!("  No history found.");
    }
}

fn print_saved(session: &AssistantSession, needle: &str) {
    let saved = session.saved();
    let artifacts = saved.artifacts();
    let mut shown = 0;
    for artifact in saved.filter(needle) {
        let n = artifacts
            .iter()
            .position(|a| a.id == artifact.id)
            .map_or(0, |i| i + 1);
        println!("  {n:>3}. {}  ({})", artifact.query_text, artifact.date);
        if artifact.expanded {
            for line in artifact.response_text.lines() {
                println!("       {line}");
            }
        } else if let Some(preview) = saved.preview(artifact.id, PREVIEW_CHARS) {
            println!("       {}", preview.replace('\n', " "));
        }
        shown += 1;
    }
    if shown == 0 {
        println!("  No saved queries found.");
    }
}

fn print_analysis(session: &AssistantSession, kind: AnalysisKind, commit: Commit) {
    let formula = session.formula();
    if commit == Commit::Stale {
        println!("  (older {kind} result discarded)");
        return;
    }
    if formula.status(kind) == OperationStatus::Failed {
        if let Some(notice) = formula.failure_notice(kind) {
            println!("  ! {notice}");
        }
        return;
    }

    match kind {
        AnalysisKind::Validate => {
            if let Some(result) = formula.validation().value() {
                let verdict = if result.is_valid { "Valid" } else { "Invalid" };
                println!("  {verdict} formula");
                if !result.explanation.is_empty() {
                    println!("  {}", result.explanation);
                }
                print_sections(&result.sections());
            }
        }
        AnalysisKind::Explain => {
            if let Some(result) = formula.explanation().value() {
                print_sections(&result.sections());
                if !result.components.is_empty() {
                    println!("  Components:");
                    for component in &result.components {
                        println!("    {}: {}", component.part, component.explanation);
                    }
                }
            }
        }
        AnalysisKind::Debug => {
            if let Some(result) = formula.debugging().value() {
                print_sections(&result.sections());
            }
        }
    }
    if formula.is_stale(kind) {
        println!("  (the formula has changed since this {kind} request)");
    }
}

fn render(session: &AssistantSession, applied: Applied) {
    match applied {
        Applied::Query(_) => {
            let conversation = session.conversation();
            if let Some(message) = conversation.messages().last() {
                println!("  assistant> {}", message.content);
            }
            if let Some(banner) = conversation.banner() {
                println!("  ! {banner}");
            }
        }
        Applied::Analysis(kind, commit) => print_analysis(session, kind, commit),
    }
}

fn handle_command(session: &mut AssistantSession, command: &str, arg: &str) -> Flow {
    match command {
        "/quit" | "/exit" => return Flow::Quit,
        "/help" => println!("{HELP}"),
        "/formula" => {
            session.formula_mut().set_formula(arg);
            println!("  formula: {arg}");
        }
        "/error" => {
            let message = (!arg.is_empty()).then(|| arg.to_string());
            session.formula_mut().set_error_message(message);
        }
        "/validate" => {
            session.dispatch_analysis(AnalysisKind::Validate);
        }
        "/explain" => {
            session.dispatch_analysis(AnalysisKind::Explain);
        }
        "/debug" => {
            session.dispatch_analysis(AnalysisKind::Debug);
        }
        "/history" => print_history(session, arg),
        "/repeat" => match parse_index(arg, session.history().len()) {
            Some(i) => {
                let id = session.history().entries()[i].id;
                session.repeat_history(id);
            }
            None => println!("  usage: /repeat <n>"),
        },
        "/clear-history" => session.clear_history(),
        "/save" => match session.save_last_exchange() {
            Some(_) => println!("  saved"),
            None => println!("  nothing to save yet"),
        },
        "/saved" => print_saved(session, arg),
        "/open" | "/copy" | "/delete" => {
            let Some(i) = parse_index(arg, session.saved().len()) else {
                println!("  usage: {command} <n>");
                return Flow::Continue;
            };
            let id = session.saved().artifacts()[i].id;
            match command {
                "/open" => {
                    session.toggle_saved(id);
                    print_saved(session, "");
                }
                "/copy" => {
                    if !session.copy_saved(id, &TerminalClipboard) {
                        println!("  ! could not copy to the clipboard");
                    }
                }
                _ => {
                    session.remove_saved(id);
                }
            }
        }
        "/dismiss" => session.dismiss_banner(),
        _ => println!("  unknown command {command}, try /help"),
    }
    Flow::Continue
}

fn handle_line(session: &mut AssistantSession, line: &str, record_history: bool) -> Flow {
    if line.starts_with('/') {
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        return handle_command(session, command.trim(), arg.trim());
    }
    if session.dispatch_query(line) && record_history {
        session.history_mut().record(line);
    }
    Flow::Continue
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let record_history = std::env::args().skip(1).any(|arg| arg == RECORD_HISTORY_FLAG);
    let config = AssistantConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("  Invalid configuration: {e}");
        return ExitCode::from(1);
    }
    let client = match HttpAssistantClient::new(&config.backend) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("  Cannot create backend client: {e}");
            return ExitCode::from(1);
        }
    };

    println!();
    println!("  ╔═══════════════════════════════════════════╗");
    println!("  ║        SheetMate - Excel Assistant        ║");
    println!("  ╚═══════════════════════════════════════════╝");
    println!("  Backend: {}", client.base_url());
    if record_history {
        println!("  Chat messages are recorded in the history.");
    }
    println!("  Type /help for commands.");
    println!();

    let mut session = AssistantSession::with_config(
        Arc::new(client),
        Arc::new(PrintNotifier),
        config.conversation,
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if handle_line(&mut session, &line, record_history) == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    eprintln!("  Cannot read input: {e}");
                    break;
                }
            },
            Some(applied) = session.next_completion() => render(&session, applied),
        }
    }

    if session.in_flight() > 0 {
        println!("  Leaving with {} request(s) unanswered.", session.in_flight());
    }
    ExitCode::SUCCESS
}
