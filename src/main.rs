//! # Quarry CLI (`quarry`)
//!
//! The `quarry` binary is the command-line interface to the retrieval
//! engine. It indexes collections of plain-text files and searches them
//! with one or more strategies.
//!
//! ## Usage
//!
//! ```bash
//! quarry --config ./quarry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quarry index <collection>` | Chunk, embed, and store a collection's files |
//! | `quarry search "<query>" -c <collection>` | Search with one or more strategies |
//! | `quarry remove <collection> <filename>` | Unlink a file from a collection |
//! | `quarry docs <collection>` | List a collection's indexed documents |
//! | `quarry stats <collection>` | Show store counters for a collection |
//! | `quarry collections` | List collections found under the sources root |
//!
//! ## Examples
//!
//! ```bash
//! # Build the persistent index for a collection
//! quarry index notes --config ./quarry.toml
//!
//! # TF-IDF keyword search (the default strategy)
//! quarry search "deployment rollback" -c notes
//!
//! # Boolean line matching
//! quarry search "error AND NOT timeout" -c notes --strategy lines
//!
//! # Run every strategy and compare
//! quarry search "deployment" -c notes --all
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use quarry::config;
use quarry::embedding;
use quarry::models::StrategyOutcome;
use quarry::orchestrator::{Orchestrator, SearchOptions, STRATEGY_NAMES};
use quarry::sources;
use quarry::store::CollectionStore;

/// Quarry — a multi-strategy passage retrieval engine for local document
/// collections.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with `[storage]`, `[sources]`, `[chunking]`, `[embedding]`, and
/// `[retrieval]` sections.
#[derive(Parser)]
#[command(
    name = "quarry",
    about = "Quarry — multi-strategy passage retrieval over local document collections",
    version,
    long_about = "Quarry indexes named collections of plain-text files (chunking and optionally \
    embedding them into a per-collection SQLite store) and retrieves passages with five \
    strategies: boolean line matching, inverted-index full-text, TF-IDF keyword scoring, \
    embedding-based semantic similarity, and a weighted keyword+semantic fusion."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./quarry.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the persistent index for a collection.
    ///
    /// Reads every source file, chunks it, embeds the chunks when an
    /// embedding provider is configured, and stores everything in the
    /// collection's SQLite file. Idempotent: unchanged files are detected
    /// by content hash and skipped.
    Index {
        /// Collection name (a subdirectory of the sources root).
        collection: String,
    },

    /// Search a collection.
    ///
    /// Runs the requested strategies sequentially and prints each
    /// strategy's ranked results. A strategy that fails reports its error
    /// without aborting the others.
    Search {
        /// The search query. The `lines` strategy accepts boolean
        /// operators (AND, OR, NOT or `&`, `|`, `!`).
        query: String,

        /// Collection to search.
        #[arg(short, long)]
        collection: String,

        /// Comma-separated strategies: lines, fulltext, keyword, semantic, hybrid.
        #[arg(long, default_value = "keyword")]
        strategy: String,

        /// Run every registered strategy (overrides --strategy).
        #[arg(long)]
        all: bool,

        /// Maximum results per strategy.
        #[arg(long)]
        top_k: Option<usize>,

        /// Case-sensitive matching (lines strategy only).
        #[arg(long)]
        case_sensitive: bool,

        /// Match whole words only (lines strategy only).
        #[arg(long)]
        whole_words: bool,
    },

    /// Remove a file's link from a collection.
    ///
    /// Deletes the collection link for the filename; the underlying
    /// document and its chunks are deleted only when no other filename in
    /// the collection still references them.
    Remove {
        /// Collection name.
        collection: String,
        /// Collection-relative filename to unlink.
        filename: String,
    },

    /// List the documents indexed in a collection.
    Docs {
        /// Collection name.
        collection: String,
    },

    /// Retrieve a stored document by its id (content hash).
    ///
    /// Prints the document's metadata, full content, and chunk boundaries.
    Get {
        /// Collection name.
        collection: String,
        /// Document id, as shown by `quarry docs`.
        id: String,
    },

    /// Show store counters for a collection.
    Stats {
        /// Collection name.
        collection: String,
    },

    /// List collections found under the sources root.
    Collections,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { collection } => run_index(cfg, &collection).await,
        Commands::Search {
            query,
            collection,
            strategy,
            all,
            top_k,
            case_sensitive,
            whole_words,
        } => {
            run_search(
                cfg,
                &query,
                &collection,
                &strategy,
                all,
                top_k,
                case_sensitive,
                whole_words,
            )
            .await
        }
        Commands::Remove {
            collection,
            filename,
        } => run_remove(cfg, &collection, &filename).await,
        Commands::Docs { collection } => run_docs(cfg, &collection).await,
        Commands::Get { collection, id } => run_get(cfg, &collection, &id).await,
        Commands::Stats { collection } => run_stats(cfg, &collection).await,
        Commands::Collections => run_collections(cfg),
    }
}

async fn run_index(cfg: config::Config, collection: &str) -> Result<()> {
    if !cfg.embedding.is_enabled() {
        anyhow::bail!(
            "Indexing requires embeddings. Set [embedding] provider in config. \
             (The lines, fulltext, and keyword strategies search source files directly \
             and need no index.)"
        );
    }

    let files = sources::read_files(&cfg, collection)?;
    let embedder = embedding::create_embedder(&cfg.embedding)?;
    let store = CollectionStore::open(&cfg.storage.root, collection).await?;

    let mut ingested = 0usize;
    let mut reused = 0usize;
    let mut chunks_written = 0usize;
    for (name, content) in &files {
        let outcome = store
            .ingest(
                name,
                content,
                embedder.as_ref(),
                &cfg.chunking,
                cfg.embedding.doc_prefix_chars,
            )
            .await?;
        if outcome.reused {
            reused += 1;
        } else {
            ingested += 1;
            chunks_written += outcome.chunk_count;
        }
    }

    println!("index {}", collection);
    println!("  files found: {}", files.len());
    println!("  ingested: {}", ingested);
    println!("  reused: {}", reused);
    println!("  chunks written: {}", chunks_written);
    println!("ok");
    store.close().await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_search(
    cfg: config::Config,
    query: &str,
    collection: &str,
    strategy: &str,
    all: bool,
    top_k: Option<usize>,
    case_sensitive: bool,
    whole_words: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let strategies: Vec<String> = if all {
        STRATEGY_NAMES.iter().map(|s| s.to_string()).collect()
    } else {
        strategy
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };
    for name in &strategies {
        if !STRATEGY_NAMES.contains(&name.as_str()) {
            anyhow::bail!(
                "Unknown strategy: {}. Use one of: {}.",
                name,
                STRATEGY_NAMES.join(", ")
            );
        }
    }

    // Explicitly requested semantic retrieval needs a configured embedding
    // backend. Under --all the lexical strategies still run; semantic and
    // hybrid report their failure per strategy instead.
    if !all
        && strategies.iter().any(|s| s == "semantic" || s == "hybrid")
        && !cfg.embedding.is_enabled()
    {
        anyhow::bail!(
            "Strategies semantic/hybrid require embeddings. Set [embedding] provider in config."
        );
    }

    let mut options = SearchOptions::from_config(&cfg, collection);
    if let Some(k) = top_k {
        options.top_k = k;
    }
    options.case_sensitive = case_sensitive;
    options.whole_words = whole_words;

    let embedder: Arc<dyn embedding::Embedder> = Arc::from(embedding::create_embedder(&cfg.embedding)?);
    let orchestrator = Orchestrator::new(cfg, embedder);
    let report = orchestrator.search(query, &strategies, &options).await;

    for name in &strategies {
        if let Some(outcome) = report.outcomes.get(name) {
            let elapsed = report.timing_ms.get(name).copied().unwrap_or(0);
            print_outcome(name, outcome, elapsed);
        }
    }
    Ok(())
}

fn print_outcome(strategy: &str, outcome: &StrategyOutcome, elapsed_ms: u64) {
    println!("[{}] {} results ({} ms)", strategy, outcome.total, elapsed_ms);

    if let Some(ref error) = outcome.error {
        println!("  error: {}", error);
        println!();
        return;
    }
    if let Some(ref message) = outcome.message {
        println!("  {}", message);
        println!();
        return;
    }

    for (i, result) in outcome.results.iter().enumerate() {
        println!("  {}. [{:.3}] {}", i + 1, result.score, result.title);
        println!(
            "      excerpt: \"{}\"",
            result.excerpt.replace('\n', " ")
        );
        println!("      id: {}", result.id);
    }
    println!();
}

async fn run_remove(cfg: config::Config, collection: &str, filename: &str) -> Result<()> {
    if !CollectionStore::exists(&cfg.storage.root, collection) {
        anyhow::bail!("No store for collection '{}'. Run `quarry index` first.", collection);
    }
    let store = CollectionStore::open(&cfg.storage.root, collection).await?;
    let removed = store.remove(filename).await?;
    if removed {
        println!("removed {} from {}", filename, collection);
    } else {
        println!("{} is not linked in {}", filename, collection);
    }
    store.close().await;
    Ok(())
}

async fn run_docs(cfg: config::Config, collection: &str) -> Result<()> {
    if !CollectionStore::exists(&cfg.storage.root, collection) {
        anyhow::bail!("No store for collection '{}'. Run `quarry index` first.", collection);
    }
    let store = CollectionStore::open(&cfg.storage.root, collection).await?;
    let docs = store.list_documents().await?;

    println!("docs {} ({} linked)", collection, docs.len());
    for doc in &docs {
        let added = chrono::DateTime::from_timestamp(doc.added_at, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "  {} ({} chunks, added {})",
            doc.filename, doc.chunk_count, added
        );
        println!("    document: {}", doc.document_id);
    }
    store.close().await;
    Ok(())
}

async fn run_get(cfg: config::Config, collection: &str, id: &str) -> Result<()> {
    if !CollectionStore::exists(&cfg.storage.root, collection) {
        anyhow::bail!("No store for collection '{}'. Run `quarry index` first.", collection);
    }
    let store = CollectionStore::open(&cfg.storage.root, collection).await?;

    let doc = match store.get_document(id).await? {
        Some(doc) => doc,
        None => {
            store.close().await;
            anyhow::bail!("document not found: {}", id);
        }
    };
    let chunks = store.chunks_for(id).await?;

    println!("Document {}", doc.id);
    println!("  filename: {}", doc.filename);
    let processed = chrono::DateTime::from_timestamp(doc.processed_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    println!("  processed: {}", processed);
    println!("  chunks: {}", chunks.len());
    println!();
    println!("{}", doc.full_content);
    println!();
    for chunk in &chunks {
        println!(
            "-- chunk {} [{}..{}] ({})",
            chunk.chunk_index,
            chunk.start_char,
            chunk.end_char,
            chunk.chunk_type.as_str()
        );
    }
    store.close().await;
    Ok(())
}

async fn run_stats(cfg: config::Config, collection: &str) -> Result<()> {
    if !CollectionStore::exists(&cfg.storage.root, collection) {
        anyhow::bail!("No store for collection '{}'. Run `quarry index` first.", collection);
    }
    let store = CollectionStore::open(&cfg.storage.root, collection).await?;
    let stats = store.stats().await?;

    println!("stats {}", collection);
    println!("  documents: {}", stats.documents);
    println!("  chunks: {}", stats.chunks);
    println!("  content bytes: {}", stats.content_bytes);
    for (filename, count) in store.chunk_counts().await? {
        println!("    {}: {} chunks", filename, count);
    }
    store.close().await;
    Ok(())
}

fn run_collections(cfg: config::Config) -> Result<()> {
    let names = sources::list_collections(&cfg)?;
    if names.is_empty() {
        println!("No collections found under {}", cfg.sources.root.display());
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
