//! # Concierge CLI
//!
//! The `concierge` binary is the operational interface for the site
//! assistant: database setup, knowledge-base indexing, one-shot questions,
//! and views over recorded leads and knowledge gaps.
//!
//! ## Usage
//!
//! ```bash
//! concierge --config ./config/concierge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `concierge init` | Create the SQLite database and run schema migrations |
//! | `concierge index [--reset]` | Chunk and embed the knowledge directory |
//! | `concierge ask "<message>"` | Ask the assistant one question |
//! | `concierge leads` | List recorded contact leads |
//! | `concierge gaps` | List questions the assistant couldn't answer |
//! | `concierge stats` | Show corpus, cache, and lead counters |
//!
//! ## Environment
//!
//! API keys come from the environment (a `.env` file is honored):
//! `OPENAI_API_KEY` for embeddings and completions, and optionally
//! `PUSHOVER_TOKEN` / `PUSHOVER_USER` for push notifications.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use concierge::cache::SqliteResponseCache;
use concierge::chat::{Assistant, AssistantOptions};
use concierge::embedding::create_embedder;
use concierge::leads::LeadStore;
use concierge::llm::OpenAiChatClient;
use concierge::notify::Notifier;
use concierge::sqlite_store::SqliteVectorStore;
use concierge::tools::ToolRegistry;
use concierge::{config, db, index, leads, migrate, stats};

/// Concierge — a retrieval-augmented assistant for personal websites.
#[derive(Parser)]
#[command(
    name = "concierge",
    about = "A retrieval-augmented assistant for personal websites",
    version,
    long_about = "Concierge indexes a personal knowledge base into a SQLite-backed vector \
    store, answers visitor questions through a language model grounded on retrieved context, \
    caches responses, and records contact leads and unanswerable questions."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/concierge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Index the knowledge directory into the vector store.
    ///
    /// Loads every supported file (.pdf, .txt, .md), chunks it, embeds the
    /// chunks, and stores them. Per-file failures are skipped with a
    /// warning; the run completes with whatever succeeded.
    Index {
        /// Delete the existing collection before indexing. Irrecoverable.
        #[arg(long)]
        reset: bool,
    },

    /// Ask the assistant a single question.
    Ask {
        /// The visitor message.
        message: String,
    },

    /// List recorded contact leads, newest first.
    Leads,

    /// List recorded knowledge gaps, newest first.
    Gaps,

    /// Show corpus, cache, and lead counters.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("concierge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Index { reset } => {
            let pool = db::connect(&cfg.db.path).await?;
            let embedder = create_embedder(&cfg.embedding)?;
            let store = SqliteVectorStore::new(pool.clone(), embedder);
            index::run_index_command(&cfg, &store, reset).await?;
            pool.close().await;
        }
        Commands::Ask { message } => {
            let pool = db::connect(&cfg.db.path).await?;

            let embedder = create_embedder(&cfg.embedding)?;
            let store = Arc::new(SqliteVectorStore::new(pool.clone(), embedder));
            let cache = Arc::new(SqliteResponseCache::new(
                pool.clone(),
                cfg.cache.ttl_secs,
                cfg.cache.max_bytes,
            ));
            let lead_store = Arc::new(LeadStore::new(pool.clone()));
            let notifier = Arc::new(Notifier::from_env(cfg.notify.enabled));
            let tools = Arc::new(ToolRegistry::with_builtins(lead_store, notifier));
            let model = Arc::new(OpenAiChatClient::new(&cfg.model)?);

            let assistant = Assistant::new(
                model,
                store,
                cache,
                tools,
                AssistantOptions {
                    name: cfg.assistant.name.clone(),
                    top_k: cfg.retrieval.top_k,
                    max_distance: cfg.retrieval.max_distance,
                    max_tool_rounds: cfg.model.max_tool_rounds,
                },
            );

            match assistant.generate_reply(&message, &[]).await {
                Ok(reply) => println!("{}", reply),
                Err(e) => {
                    tracing::error!(error = %e, "reply generation failed");
                    eprintln!("Sorry, something went wrong while generating a reply.");
                    std::process::exit(1);
                }
            }
            pool.close().await;
        }
        Commands::Leads => {
            let pool = db::connect(&cfg.db.path).await?;
            let store = LeadStore::new(pool.clone());
            leads::run_leads(&store).await?;
            pool.close().await;
        }
        Commands::Gaps => {
            let pool = db::connect(&cfg.db.path).await?;
            let store = LeadStore::new(pool.clone());
            leads::run_gaps(&store).await?;
            pool.close().await;
        }
        Commands::Stats => {
            let pool = db::connect(&cfg.db.path).await?;
            stats::run_stats(&pool).await?;
            pool.close().await;
        }
    }

    Ok(())
}
