//! # Campus Advisor CLI (`cadv`)
//!
//! The `cadv` binary drives the advisory service: catalog conversion,
//! ingestion, one-shot questions, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! cadv --config ./config/advisor.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cadv convert <in.json> <out.csv>` | Produce a catalog's CSV row source |
//! | `cadv ingest [--dry-run]` | Load all configured catalogs into the index |
//! | `cadv ask "<query>"` | Answer one query and print the full response |
//! | `cadv serve` | Ingest, then start the HTTP server |

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use campus_advisor::chat::Advisor;
use campus_advisor::config::{load_config, Config};
use campus_advisor::convert::run_convert;
use campus_advisor::embedding::{DisabledEmbedder, HostedEmbedder};
use campus_advisor::generation::GenerationClient;
use campus_advisor::index::{MemoryIndex, QdrantIndex, VectorIndex};
use campus_advisor::ingest::run_ingest;
use campus_advisor::server::run_server;

/// Campus Advisor: a retrieval-augmented course and career advisory chat
/// service.
#[derive(Parser)]
#[command(
    name = "cadv",
    about = "Campus Advisor — retrieval-augmented course and career advice",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/advisor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a catalog JSON file into its CSV row source.
    ///
    /// The output columns follow the catalog's global header order, so the
    /// pair can be ingested together.
    Convert {
        /// Catalog JSON file.
        input: PathBuf,
        /// CSV file to write.
        output: PathBuf,
    },

    /// Load all configured catalogs into the vector index.
    Ingest {
        /// Show document counts without touching the index.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a single query and print the full response.
    Ask {
        /// The student's question.
        query: String,
    },

    /// Run ingestion, then start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert { input, output } => {
            run_convert(&input, &output)?;
        }
        Commands::Ingest { dry_run } => {
            let config = load_config(&cli.config)?;
            // Dry runs only count documents, so no credentials are needed.
            let index: Arc<dyn VectorIndex> = if dry_run {
                Arc::new(MemoryIndex::new(Arc::new(DisabledEmbedder)))
            } else {
                build_index(&config)?
            };
            let summary = run_ingest(&config, index.as_ref(), dry_run).await?;
            println!(
                "ok ({} catalogs, {} documents)",
                summary.catalogs_loaded, summary.documents
            );
        }
        Commands::Ask { query } => {
            let config = load_config(&cli.config)?;
            let advisor = build_advisor(&config).await?;
            let answer = advisor.respond_blocking(&query).await?;
            println!("{}", answer);
        }
        Commands::Serve => {
            let config = load_config(&cli.config)?;
            let advisor = build_advisor(&config).await?;
            run_server(&config, advisor).await?;
        }
    }

    Ok(())
}

/// Construct the configured index backend over the hosted embedder.
fn build_index(config: &Config) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let embedder = Arc::new(HostedEmbedder::new(&config.embedding)?);
    let index: Arc<dyn VectorIndex> = match config.index.provider.as_str() {
        "qdrant" => Arc::new(QdrantIndex::new(
            &config.index.url,
            &config.index.collection,
            embedder,
        )),
        _ => Arc::new(MemoryIndex::new(embedder)),
    };
    Ok(index)
}

/// Build the full pipeline: index, ingestion, generation client, advisor.
///
/// Ingestion completes here, before any query is served.
async fn build_advisor(config: &Config) -> anyhow::Result<Arc<Advisor>> {
    let index = build_index(config)?;
    run_ingest(config, index.as_ref(), false).await?;

    let llm = Arc::new(GenerationClient::new(&config.generation)?);
    Ok(Arc::new(Advisor::new(index, llm, &config.retrieval)))
}
