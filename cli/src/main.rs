//! Parley operator command line.
//!
//! Drives the chat session workflow against a JSON-directory store. Every
//! command prints its result as pretty JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use parley_ai::{AiConfig, AiService, ChatSessions, DEFAULT_TOP_K};
use parley_conversations::JsonStore;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Chat conversations with remote and local language models")]
#[command(version)]
struct Cli {
    /// Directory holding conversation files
    #[arg(long, global = true, env = "PARLEY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Start a conversation, ending the active one
    Start {
        #[arg(long)]
        title: Option<String>,
    },
    /// Send a message and print the exchange
    Send { id: String, text: String },
    /// End a conversation and store its summary
    End { id: String },
    /// Rank ended conversations by summary similarity
    Search {
        query: String,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// List conversations, newest first
    List,
    /// Show conversation statistics
    Stats,
    /// Show provider configuration
    Status,
    /// End conversations idle for longer than the given time
    Sweep {
        #[arg(long, default_value_t = 10)]
        idle_minutes: u32,
    },
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_default()
        .join("parley/conversations")
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    debug!("Using data directory {}", data_dir.display());

    let config = AiConfig::from_env().context("invalid AI configuration")?;
    let store = JsonStore::open(&data_dir)
        .await
        .with_context(|| format!("failed to open store at {}", data_dir.display()))?;
    let service = AiService::from_config(&config, Arc::new(store))?;
    let sessions = ChatSessions::new(Arc::new(service));

    match cli.command {
        Command::Start { title } => {
            print_json(&sessions.start_conversation(title.as_deref()).await?)
        }
        Command::Send { id, text } => print_json(&sessions.send_message(&id, &text).await?),
        Command::End { id } => print_json(&sessions.end_conversation(&id).await?),
        Command::Search { query, top_k } => print_json(&sessions.search(&query, top_k).await?),
        Command::List => print_json(&sessions.conversations().await?),
        Command::Stats => print_json(&sessions.dashboard_stats().await?),
        Command::Status => print_json(&sessions.system_status()),
        Command::Sweep { idle_minutes } => {
            let idle = chrono::Duration::minutes(i64::from(idle_minutes));
            let ended = sessions.end_idle_conversations(idle).await?;
            print_json(&json!({ "ended": ended }))
        }
    }
}
