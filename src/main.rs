//! curator CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use curator::{
    config::Config,
    embed::OpenAiEmbedder,
    error::Result,
    pipeline::{IngestionResult, Ingestor},
    render,
    retrieve::Retriever,
    store::{QdrantStore, ScoredPayload},
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "curator")]
#[command(version, about = "Ingest web pages into a vector store for agent retrieval", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize curator configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest a web page into the knowledge base
    Ingest {
        /// URL of the page to ingest
        url: String,
    },

    /// Query the knowledge base
    Query {
        /// The search query
        query: String,

        /// Maximum number of results (default from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Init and completions don't need a loaded config
    if matches!(cli.command, Commands::Init { .. }) {
        return handle_init(cli);
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "curator", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    let store = Arc::new(QdrantStore::connect(&config).await?);

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Ingest { url } => {
            if config.render.js_rendering && !render::is_js_rendering_available() {
                warn!("JS rendering requested but not compiled in; fetching statically");
            }
            let renderer = render::default_renderer(&config.render)?;
            let embedder = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
            let ingestor = Ingestor::new(
                renderer,
                embedder,
                store,
                config.embedding.concurrency,
            )?;

            let result = ingestor.ingest(&url).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_ingestion_result(&url, &result);
            }
        }

        Commands::Query { query, limit } => {
            let embedder = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
            let retriever = Retriever::new(embedder, store, config.query.default_k);

            let results = retriever.retrieve(&query, limit).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_query_results(&query, &results);
            }
        }

        Commands::Status => {
            let status = get_status(&config, &store).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

fn handle_init(cli: Cli) -> Result<()> {
    let Commands::Init { force } = cli.command else {
        unreachable!()
    };

    let config_path = cli
        .config
        .unwrap_or_else(Config::default_config_path);

    if config_path.exists() && !force {
        eprintln!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
        std::process::exit(1);
    }

    let mut config = Config::default();
    config.paths.base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_base_dir);
    config.paths.config_file = config_path.clone();
    config.save()?;

    println!("✓ curator initialized successfully");
    println!("  Config: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit the config file to customize settings");
    println!("  2. Export your API keys:");
    println!("       export {}=<key>", config.embedding.api_key_env);
    println!("       export {}=<key>  # if Qdrant needs one", config.qdrant_api_key_env);
    println!("  3. Start Qdrant: docker run -p 6333:6333 -p 6334:6334 qdrant/qdrant");
    println!("  4. Ingest a page: curator ingest https://example.com");

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_from(None),
    }
}

/// Status information
#[derive(Debug, Serialize)]
struct StatusInfo {
    config_path: String,
    qdrant_url: String,
    collection_name: String,
    embedding_model: String,
    embedding_dimension: usize,
    js_rendering_available: bool,
    qdrant_connected: bool,
    collection_exists: bool,
    points_count: usize,
}

async fn get_status(config: &Config, store: &QdrantStore) -> StatusInfo {
    let (qdrant_connected, collection_exists, points_count) = match store.collection_exists().await
    {
        Ok(true) => match store.stats().await {
            Ok(stats) => (true, true, stats.points_count),
            Err(e) => {
                tracing::debug!("Qdrant stats error: {:?}", e);
                (true, true, 0)
            }
        },
        Ok(false) => (true, false, 0),
        Err(e) => {
            tracing::debug!("Qdrant connection error: {:?}", e);
            (false, false, 0)
        }
    };

    StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        qdrant_url: config.qdrant_url.clone(),
        collection_name: config.collection_name.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: config.embedding.dimension,
        js_rendering_available: render::is_js_rendering_available(),
        qdrant_connected,
        collection_exists,
        points_count,
    }
}

fn print_ingestion_result(url: &str, result: &IngestionResult) {
    println!("\n✓ Ingestion complete: {}", url);
    println!("  Items stored: {}", result.items_stored);
    println!("  Items failed: {}", result.items_failed);

    for failure in &result.failures {
        println!("  ✗ [{}] {}: {}", failure.kind, failure.content, failure.reason);
    }
}

fn print_query_results(query: &str, results: &[ScoredPayload]) {
    println!("\n🔍 Query: {}\n", query);
    println!("Found {} results:\n", results.len());

    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [score: {:.3}] [{}] {}",
            i + 1,
            r.score,
            r.payload.kind,
            r.payload.source_url
        );

        let preview = if r.payload.content.chars().count() > 200 {
            let truncated: String = r.payload.content.chars().take(200).collect();
            format!("{}...", truncated.trim())
        } else {
            r.payload.content.trim().to_string()
        };
        println!("   {}\n", preview.replace('\n', " "));
    }
}

fn print_status(status: &StatusInfo) {
    println!("\ncurator status");
    println!("  Config: {}", status.config_path);
    println!("  Qdrant: {} (connected: {})", status.qdrant_url, status.qdrant_connected);
    println!(
        "  Collection: {} (exists: {}, points: {})",
        status.collection_name, status.collection_exists, status.points_count
    );
    println!(
        "  Embedding model: {} ({} dims)",
        status.embedding_model, status.embedding_dimension
    );
    println!("  JS rendering: {}", status.js_rendering_available);
}
