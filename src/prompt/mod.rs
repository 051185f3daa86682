use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::constants::{full_version, DEFAULT_APP_NAME, ICON_PLACEHOLDER};
use crate::network::broadcast::broadcast_message;
use crate::network::message::strip_line_ending;
use crate::node::NodeContext;

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    History,
    Clear,
    Peers,
    Help,
    Quit,
    /// Anything else that is not blank, including unknown `/words`
    Say(String),
    Empty,
}

impl Command {
    /// Commands are matched case-insensitively on the trimmed line; anything
    /// else non-empty is sent as typed, minus the line ending.
    pub fn parse(input: &str) -> Self {
        let line = strip_line_ending(input);
        if line.is_empty() {
            return Command::Empty;
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "/history" => Command::History,
            "/clear" => Command::Clear,
            "/peers" => Command::Peers,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Say(line.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const COMMANDS: &[(&str, &str)] = &[
    ("/history", "Show every stored message"),
    ("/clear", "Delete the message history"),
    ("/peers", "List connected peers"),
    ("/help", "Show this help"),
    ("/quit, /exit", "Leave the chat"),
];

pub fn help_text() -> String {
    let mut out = String::from("Available commands:\n");
    for (name, about) in COMMANDS {
        out.push_str(&format!("  {:<14} {}\n", name, about));
    }
    out.push_str("Anything else is sent to all peers.");
    out
}

pub async fn render_history(ctx: &NodeContext) -> String {
    let lines = ctx.registry().history().await;
    let mut out = String::from("=== Chat History ===\n");
    if lines.is_empty() {
        out.push_str("(no messages)\n");
    }
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("====================");
    out
}

pub fn render_peers(ctx: &NodeContext) -> String {
    let peers = ctx.registry().reserved_peers();
    if peers.is_empty() {
        return "No peers connected.".to_string();
    }
    let mut out = format!("Connected peers ({}):", peers.len());
    for peer in peers {
        out.push_str(&format!("\n  - {}", peer));
    }
    out
}

/// Run one command, printing its output.
pub async fn execute(ctx: &NodeContext, command: Command) -> Flow {
    match command {
        Command::Empty => {}
        Command::History => println!("{}", render_history(ctx).await),
        Command::Clear => match ctx.registry().clear_history().await {
            Ok(()) => println!("{}History cleared.", ICON_PLACEHOLDER),
            Err(e) => println!("❌ Could not clear history: {}", e),
        },
        Command::Peers => println!("{}", render_peers(ctx)),
        Command::Help => println!("{}", help_text()),
        Command::Quit => return Flow::Quit,
        Command::Say(text) => {
            let report = broadcast_message(ctx, &text).await;
            if let Some(err) = report.history_error {
                println!("⚠️ Message sent but not saved: {}", err);
            }
        }
    }
    Flow::Continue
}

/// Print the startup banner for an interactive session.
pub fn print_banner(ctx: &NodeContext, history_loaded: usize) {
    println!("=== {} {} ===", DEFAULT_APP_NAME, full_version());
    println!(
        "{}User: {}  listening on port {}",
        ICON_PLACEHOLDER,
        ctx.user_name(),
        ctx.listen_port()
    );
    println!("{}Loaded {} messages from history", ICON_PLACEHOLDER, history_loaded);
    println!("{}", help_text());
}

enum PromptInput {
    Line(String),
    Closed,
}

fn prompt_history_path() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".peerchat_prompt_history"))
        .unwrap_or_else(|_| PathBuf::from(".peerchat_prompt_history"))
}

/// Interactive loop. Returns when the user quits, stdin closes, or the node
/// starts shutting down for another reason (e.g. Ctrl+C).
pub async fn run_prompt(ctx: NodeContext) {
    let (tx, mut rx) = mpsc::channel::<PromptInput>(16);
    let label = format!("{}> ", ctx.user_name());
    let spawned = std::thread::Builder::new()
        .name("peerchat-prompt".into())
        .spawn(move || read_lines(tx, label));
    if let Err(e) = spawned {
        println!("❌ Prompt unavailable: {}", e);
        return;
    }

    let shutdown = ctx.shutdown().clone();
    loop {
        let input = tokio::select! {
            _ = shutdown.wait() => break,
            input = rx.recv() => input,
        };
        match input {
            Some(PromptInput::Line(line)) => {
                if execute(&ctx, Command::parse(&line)).await == Flow::Quit {
                    break;
                }
            }
            Some(PromptInput::Closed) | None => break,
        }
    }
}

/// Blocking line editor; lives on its own thread and forwards lines.
fn read_lines(tx: mpsc::Sender<PromptInput>, label: String) {
    use rustyline::error::ReadlineError;
    use rustyline::{CompletionType, Config as RLConfig, Editor};

    let rl_cfg = RLConfig::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();
    let mut rl: Editor<PromptCompleter, rustyline::history::DefaultHistory> =
        match Editor::with_config(rl_cfg) {
            Ok(rl) => rl,
            Err(e) => {
                println!("❌ Line editor unavailable: {}", e);
                let _ = tx.blocking_send(PromptInput::Closed);
                return;
            }
        };
    rl.set_helper(Some(PromptCompleter {
        builtins: COMMANDS
            .iter()
            .flat_map(|(name, _)| name.split(", "))
            .map(str::to_string)
            .collect(),
    }));
    let hist_path = prompt_history_path();
    let _ = rl.load_history(hist_path.as_path());

    loop {
        match rl.readline(&label) {
            Ok(line) => {
                let quitting = Command::parse(&line) == Command::Quit;
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                if quitting {
                    let _ = rl.save_history(&hist_path);
                }
                if tx.blocking_send(PromptInput::Line(line)).is_err() || quitting {
                    break;
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                let _ = rl.save_history(&hist_path);
                let _ = tx.blocking_send(PromptInput::Closed);
                break;
            }
            Err(e) => {
                println!("❌ Read error: {}", e);
                let _ = tx.blocking_send(PromptInput::Closed);
                break;
            }
        }
    }
}

/// Completes slash commands at the start of the line.
struct PromptCompleter {
    builtins: Vec<String>,
}

impl rustyline::Helper for PromptCompleter {}

impl rustyline::hint::Hinter for PromptCompleter {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl rustyline::highlight::Highlighter for PromptCompleter {}

impl rustyline::validate::Validator for PromptCompleter {}

impl rustyline::completion::Completer for PromptCompleter {
    type Candidate = rustyline::completion::Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> Result<(usize, Vec<Self::Candidate>), rustyline::error::ReadlineError> {
        let before = &line[..pos];
        if !before.starts_with('/') || before.contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }
        let lowered = before.to_ascii_lowercase();
        let out = self
            .builtins
            .iter()
            .filter(|s| s.starts_with(&lowered))
            .map(|s| rustyline::completion::Pair {
                display: s.clone(),
                replacement: s.clone(),
            })
            .collect();
        Ok((0, out))
    }
}
