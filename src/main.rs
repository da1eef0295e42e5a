//! # ragstore CLI
//!
//! Command-line surface for the ingestion pipeline and retrieval engine.
//!
//! ```bash
//! ragstore init                         # create the database
//! ragstore ingest notes.pdf             # register + ingest a document
//! ragstore search "deployment steps"    # retrieve the nearest chunks
//! ragstore list                         # list stored documents
//! ragstore delete <id>                  # delete a document and its chunks
//! ```
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file; embedding calls read `OPENAI_API_KEY` from the environment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use ragstore::config::{self, Config};
use ragstore::embedding::EmbeddingProducer;
use ragstore::models::Document;
use ragstore::store::VectorStore;
use ragstore::{extract, ingest, retrieve};

#[derive(Parser)]
#[command(
    name = "ragstore",
    about = "Document-to-vector ingestion and nearest-neighbor retrieval for retrieval-augmented QA",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./ragstore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite database and run schema migrations.
    Init,

    /// Register a document and run the ingestion pipeline on it.
    Ingest {
        /// File to ingest.
        file: PathBuf,

        /// Display name; defaults to the file name.
        #[arg(long)]
        name: Option<String>,

        /// MIME type; inferred from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
    },

    /// Retrieve the chunks most similar to a query.
    Search {
        /// Query text.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List stored documents.
    List,

    /// Delete a document, cascading to its chunks and vectors.
    Delete {
        /// Document id.
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Ingest { file, name, mime } => run_ingest(&config, &file, name, mime).await,
        Commands::Search { query, limit } => run_search(&config, &query, limit).await,
        Commands::List => run_list(&config).await,
        Commands::Delete { id } => run_delete(&config, &id).await,
    }
}

async fn open_store(config: &Config) -> Result<VectorStore> {
    let store = VectorStore::connect(&config.db.path, config.embedding.dims).await?;
    Ok(store)
}

async fn run_init(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    store.close().await;
    println!("initialized database at {}", config.db.path.display());
    Ok(())
}

async fn run_ingest(
    config: &Config,
    file: &Path,
    name: Option<String>,
    mime: Option<String>,
) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    });
    let mime_type = mime.unwrap_or_else(|| infer_mime(file));

    let store = open_store(config).await?;
    let producer = EmbeddingProducer::openai(&config.embedding)?;

    // The blob itself is owned by external storage; we only record an
    // opaque key for it, never parse one.
    let doc = Document {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.clone(),
        mime_type: mime_type.clone(),
        byte_size: bytes.len() as i64,
        storage_key: format!("uploads/{}", uuid::Uuid::new_v4()),
        created_at: chrono::Utc::now().timestamp(),
    };
    store.insert_document(&doc).await?;

    let report = ingest::ingest_document(
        &store,
        &producer,
        &config.chunking,
        &doc.id,
        &bytes,
        &mime_type,
    )
    .await?;

    println!("ingest {}", name);
    println!("  document id: {}", report.document_id);
    println!("  fragments: {}", report.fragments);
    println!("  stored: {}", report.stored);
    if report.skipped > 0 {
        println!("  skipped (embedding failed): {}", report.skipped);
    }

    store.close().await;
    Ok(())
}

async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let store = open_store(config).await?;
    let producer = EmbeddingProducer::openai(&config.embedding)?;
    let k = limit.unwrap_or(config.retrieval.default_limit);

    let results = retrieve::retrieve(&store, &producer, query, k).await?;

    if results.is_empty() {
        println!("No results.");
    } else {
        for (i, result) in results.iter().enumerate() {
            println!(
                "{}. [distance {:.4}] {} (chunk {})",
                i + 1,
                result.distance,
                result.document_name,
                result.chunk_id
            );
            println!("   {}", result.text.replace('\n', " ").trim());
        }
    }

    store.close().await;
    Ok(())
}

async fn run_list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let documents = store.list_documents().await?;

    if documents.is_empty() {
        println!("No documents.");
    } else {
        for doc in documents {
            let date = chrono::DateTime::from_timestamp(doc.created_at, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!(
                "{}  {}  {}  {} bytes  {}",
                doc.id, doc.name, doc.mime_type, doc.byte_size, date
            );
        }
    }

    store.close().await;
    Ok(())
}

async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let removed = store.delete_document(id).await?;

    if removed == 0 {
        println!("nothing to delete for {}", id);
    } else {
        println!("deleted {} ({} rows removed)", id, removed);
    }

    store.close().await;
    Ok(())
}

fn infer_mime(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => extract::MIME_PDF.to_string(),
        _ => extract::MIME_TEXT.to_string(),
    }
}
