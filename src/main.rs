use anyhow::{bail, Context};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio::signal;

use peerchat::{
    config::Config,
    constants::*,
    emit_system_event,
    events::model::LogLevel,
    node::ChatNode,
    prompt::{print_banner, run_prompt},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serverless LAN chat: multicast discovery, direct TCP links")]
struct Args {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// User name prefixed to every message you send
    #[arg(short, long)]
    name: Option<String>,

    /// TCP listen port (0 picks a free one)
    #[arg(short, long)]
    port: Option<u16>,

    /// Chat history file
    #[arg(long)]
    history: Option<String>,

    /// Do not announce or listen for peers (inbound links still accepted)
    #[arg(long)]
    no_discovery: bool,

    /// No interactive prompt; run until Ctrl+C
    #[arg(long)]
    headless: bool,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config_path = PathBuf::from(
        args.config
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string()),
    );
    let mut config = match Config::load(&config_path)
        .with_context(|| format!("failed to load config file '{}'", config_path.display()))?
    {
        Some(cfg) => {
            println!("{}Loaded config from: {}", ICON_PLACEHOLDER, config_path.display());
            cfg
        }
        None => {
            if args.config.is_some() {
                bail!("config file '{}' not found", config_path.display());
            }
            println!(
                "⚠️ No config file found at '{}', falling back to default config.",
                config_path.display()
            );
            Config::default()
        }
    };

    if let Some(name) = args.name.as_ref() {
        config.user_name = Some(name.clone());
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.history.as_ref() {
        config.history.get_or_insert_with(Default::default).path = Some(path.clone());
    }
    if args.no_discovery {
        config.discovery.get_or_insert_with(Default::default).enabled = false;
    }
    Ok(config)
}

/// Ask on stdin until a non-blank name is given; stdin EOF yields "anonymous".
fn ask_user_name() -> String {
    let stdin = std::io::stdin();
    loop {
        print!("Enter your username: ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return "anonymous".to_string(),
            Ok(_) => {
                let name = line.trim();
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match load_config(&args) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("❌ {:#}", err);
            std::process::exit(1);
        }
    };
    let has_name = config
        .user_name
        .as_deref()
        .map(|n| !n.trim().is_empty())
        .unwrap_or(false);
    if !has_name {
        config.user_name = Some(ask_user_name());
    }

    // Events come up after config so a custom log path applies.
    peerchat::events::init_events_from_config(config.logging.as_ref()).await;

    let mut node = match ChatNode::start(&config).await {
        Ok(node) => node,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    let ctx = node.context().clone();
    if !node.discovery_active() {
        println!("⚠️ Peer discovery is off; waiting for inbound connections only.");
    }

    // Ctrl+C takes the same path as /quit.
    {
        let shutdown = ctx.shutdown().clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                shutdown.trigger();
            }
        });
    }

    if args.headless {
        println!(
            "🟢 {} is running as '{}' on {}. Press Ctrl+C to shut down...",
            DEFAULT_APP_NAME,
            ctx.user_name(),
            node.listen_addr()
        );
        println!("{}Loaded {} messages from history", ICON_PLACEHOLDER, node.history_loaded());
        ctx.shutdown().wait().await;
    } else {
        print_banner(&ctx, node.history_loaded());
        run_prompt(ctx.clone()).await;
    }

    println!("=== Shutting down chat ===");
    emit_system_event!("main", LogLevel::Info, "shutdown_requested", None);
    node.shutdown().await;
    println!("Chat closed");
    // The line editor thread may still be parked in a blocking read.
    std::process::exit(0);
}
