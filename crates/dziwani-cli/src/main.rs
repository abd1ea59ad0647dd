mod display;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dziwani_core::{ChatRequest, ConversationTurn, ResponseEnvelope};
use dziwani_engine::{Engine, EngineConfig};
use dziwani_llm::{Completion, HttpCompletionClient};
use dziwani_store::DuckStore;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(
    name = "dziwani",
    version,
    about = "Ask questions about infrastructure projects in Malawi"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create proj_dashboard and load a CSV export into it
    Load {
        #[arg(long)]
        csv: PathBuf,
        /// DuckDB file (defaults to DZIWANI_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Answer one question
    Ask {
        question: String,
        #[arg(long)]
        db: Option<PathBuf>,
        /// Print the response envelope as JSON
        #[arg(long)]
        json: bool,
        /// JSON array of earlier turns, for "show more"
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Show the classification and generated SQL without executing it
    Sql { question: String },
    /// Interactive session; "show more" pages through the last listing
    Repl {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("reading configuration")?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Load { csv, db } => cmd_load(&config, &csv, db.as_deref()),
        Commands::Ask {
            question,
            db,
            json,
            history,
        } => cmd_ask(&config, &question, db.as_deref(), json, history.as_deref()).await,
        Commands::Sql { question } => cmd_sql(&config, &question).await,
        Commands::Repl { db } => cmd_repl(&config, db.as_deref()).await,
    }
}

/// Install a stderr fmt subscriber. `RUST_LOG` wins over `LOG_LEVEL`.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

// ── Wiring ──

fn open_store(config: &EngineConfig, db: Option<&Path>) -> anyhow::Result<DuckStore> {
    let path = db.or(config.db_path.as_deref());
    let store = match path {
        Some(path) => DuckStore::open_persistent(path)
            .with_context(|| format!("opening {}", path.display()))?,
        None => DuckStore::open().context("opening in-memory database")?,
    };
    if !store.has_table() {
        store.create_schema().context("creating proj_dashboard")?;
    }
    Ok(store)
}

fn completion(config: &EngineConfig) -> anyhow::Result<Option<Arc<dyn Completion>>> {
    let Some(settings) = &config.completion else {
        return Ok(None);
    };
    let client = HttpCompletionClient::with_config(
        &settings.api_key,
        &settings.base_url,
        &settings.model,
        config.completion_timeout,
    )
    .context("building completion client")?;
    info!(model = %client.model(), "completion service enabled");
    let client: Arc<dyn Completion> = Arc::new(client);
    Ok(Some(client))
}

fn build_engine(config: &EngineConfig, db: Option<&Path>) -> anyhow::Result<Engine> {
    let store = open_store(config, db)?;
    let executor = Arc::new(store.into_shared(config.sql_timeout));
    Ok(Engine::from_config(config, executor, completion(config)?))
}

// ── Commands ──

fn cmd_load(config: &EngineConfig, csv: &Path, db: Option<&Path>) -> anyhow::Result<()> {
    let store = open_store(config, db)?;
    let loaded = store
        .load_csv(csv)
        .with_context(|| format!("loading {}", csv.display()))?;
    let total = store.count()?;
    eprintln!("Loaded {loaded} rows from {} ({total} in proj_dashboard)", csv.display());
    if db.or(config.db_path.as_deref()).is_none() {
        eprintln!("  (in-memory database: pass --db to keep the catalog)");
    }
    Ok(())
}

async fn cmd_ask(
    config: &EngineConfig,
    question: &str,
    db: Option<&Path>,
    json: bool,
    history: Option<&Path>,
) -> anyhow::Result<()> {
    let engine = build_engine(config, db)?;
    let history: Vec<ConversationTurn> = match history {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).context("parsing history")?
        }
        None => Vec::new(),
    };

    let response = engine
        .handle(&ChatRequest::new(question).with_history(history))
        .await;
    print_response(&response, json)
}

async fn cmd_sql(config: &EngineConfig, question: &str) -> anyhow::Result<()> {
    let engine = build_engine(config, None)?;
    let classification = engine.classify(question, &[]).await;
    println!("{}", serde_json::to_string_pretty(&classification)?);
    let sql = engine.builder().build(&classification);
    if sql.is_empty() {
        println!("(no SQL generated)");
    } else {
        println!("{sql}");
    }
    Ok(())
}

async fn cmd_repl(config: &EngineConfig, db: Option<&Path>) -> anyhow::Result<()> {
    let engine = build_engine(config, db)?;
    let mut history: Vec<ConversationTurn> = Vec::new();
    let stdin = io::stdin();

    println!("Ask about projects in Malawi. Type 'quit' to leave.");
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "quit" | "exit") {
            break;
        }

        let request = ChatRequest::new(message).with_history(history.clone());
        let response = engine.handle(&request).await;
        display::print_envelope(&response);
        history.push(ConversationTurn::from_response(message, &response));
    }
    Ok(())
}

fn print_response(response: &ResponseEnvelope, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        display::print_envelope(response);
    }
    Ok(())
}
