//! # docqa CLI
//!
//! The `docqa` binary drives the document question-answering service. It
//! provides commands for database initialization, document ingestion,
//! retrieval inspection, one-off questions, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and run schema migrations |
//! | `docqa ingest <file>` | Extract, chunk, embed, index, and archive a document |
//! | `docqa search "<query>"` | Show the nearest indexed chunks for a query |
//! | `docqa ask "<question>"` | Answer a question with retrieved context via the LLM |
//! | `docqa serve` | Start the HTTP server (`/upload`, `/query`, `/files`, `/health`) |

mod answer;
mod chunk;
mod config;
mod db;
mod embedding;
mod error;
mod extract;
mod index;
mod llm;
mod memory;
mod models;
mod pipeline;
mod server;
mod storage;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::index::VectorIndex;

/// docqa — a retrieval-augmented document question-answering service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa — a retrieval-augmented document question-answering service",
    version,
    long_about = "docqa ingests PDF and plain-text documents, chunks and embeds them into a \
    local vector index, archives originals to S3-compatible storage, and answers questions by \
    retrieving relevant chunks and forwarding them with conversation history to a hosted LLM."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// chunks, chunk_vectors). Idempotent.
    Init,

    /// Ingest a document from the local filesystem.
    ///
    /// Extracts text (.pdf or .txt), chunks it, embeds the chunks, writes
    /// them to the vector index, and archives the original to object
    /// storage when `[storage]` is configured. Indexing and archival are
    /// independent; either can fail without undoing the other.
    Ingest {
        /// Path to the document (.pdf or .txt).
        file: PathBuf,
    },

    /// Show the nearest indexed chunks for a query.
    ///
    /// Retrieval only — no LLM call. Useful for inspecting what context
    /// `ask` would see.
    Search {
        /// The query string.
        query: String,

        /// Maximum number of chunks to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a single question using retrieved context and the LLM.
    ///
    /// Requires the provider's API key in the environment (`GROQ_API_KEY`
    /// or `OPENAI_API_KEY`). Each invocation starts a fresh conversation;
    /// use `serve` for multi-turn sessions.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            db::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file } => {
            run_ingest(&cfg, &file).await?;
        }
        Commands::Search { query, limit } => {
            run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { question } => {
            run_ask(&cfg, &question).await?;
        }
        Commands::Serve => {
            server::run_server(cfg).await?;
        }
    }

    Ok(())
}

async fn run_ingest(cfg: &config::Config, file: &PathBuf) -> Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid file path: {}", file.display()))?
        .to_string();
    let bytes = std::fs::read(file)?;
    let doc = models::Document::new(filename, bytes).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let index = VectorIndex::open(&cfg.db.path, cfg.embedding.clone()).await?;
    let summary = pipeline::ingest_document(cfg, &index, &doc)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    println!("ingest {}", summary.filename);
    println!("  document id: {}", summary.document_id);
    println!("  chunks written: {}", summary.chunks);

    match cfg.storage {
        Some(ref storage_config) => {
            let storage =
                storage::S3Storage::new(storage_config).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            let key = pipeline::archive_document(&storage, &index, &doc, &summary.document_id)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("  archived: s3://{}/{}", storage_config.bucket, key);
        }
        None => {
            println!("  archived: skipped (no [storage] configured)");
        }
    }

    println!("ok");
    Ok(())
}

async fn run_search(cfg: &config::Config, query: &str, limit: Option<usize>) -> Result<()> {
    let index = VectorIndex::open(&cfg.db.path, cfg.embedding.clone()).await?;
    let k = limit.unwrap_or(cfg.retrieval.top_k);

    let hits = index
        .search(query, k)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let excerpt: String = hit.text.chars().take(160).collect();
        println!("{}. [{:.3}] {}", i + 1, hit.score, excerpt.replace('\n', " "));
        println!("    chunk: {}  document: {}", hit.chunk_id, hit.document_id);
    }
    Ok(())
}

async fn run_ask(cfg: &config::Config, question: &str) -> Result<()> {
    let index = VectorIndex::open(&cfg.db.path, cfg.embedding.clone()).await?;
    let llm = llm::LlmClient::new(&cfg.llm).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let mut conversation = memory::ConversationMemory::new();

    let reply = answer::answer(question, &index, &mut conversation, &llm, cfg.retrieval.top_k)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    println!("{}", reply);
    Ok(())
}
