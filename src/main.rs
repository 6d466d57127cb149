//! # Codebase RAG CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ingest --project-root <dir>` | Build a collection; refuses a non-empty one without `--force` |
//! | `rag update --project-root <dir>` | Re-ingest, overwriting records with the same id |
//! | `rag query --query "<text>"` | Retrieve context and ask Gemini |
//! | `rag collections` | List collections and record counts |

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use codebase_rag::config;
use codebase_rag::generate;
use codebase_rag::ingest::{self, IngestOptions};
use codebase_rag::progress::ProgressMode;
use codebase_rag::{collections, query, RagError};

/// Codebase RAG: ask Gemini about your project with retrieved context.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Retrieval-augmented generation over a local codebase",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rag.toml`; built-in defaults apply when that
    /// file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ingestion progress on stderr.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    progress: ProgressMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a project into a collection.
    ///
    /// Fails without writing if the collection already holds records,
    /// unless `--force` is given.
    Ingest {
        /// Root directory of the project to ingest.
        #[arg(long)]
        project_root: PathBuf,

        /// Delete and recreate the collection first.
        #[arg(long)]
        force: bool,

        /// Collection name (default from `[retrieval] default_collection`).
        #[arg(long)]
        collection: Option<String>,

        /// Report file and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask a question about the ingested project.
    Query {
        /// The question.
        #[arg(long)]
        query: String,

        #[arg(long)]
        collection: Option<String>,

        /// Number of chunks to retrieve (default from `[retrieval] top_k`).
        #[arg(long, value_parser = parse_top_k)]
        top_k: Option<usize>,

        /// Print the augmented prompt before the response.
        #[arg(long)]
        show_prompt: bool,
    },

    /// Re-ingest a project, overwriting records with matching ids.
    Update {
        #[arg(long)]
        project_root: PathBuf,

        #[arg(long)]
        collection: Option<String>,
    },

    /// List configured and stored collections.
    Collections,
}

fn parse_top_k(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // A `.env` next to the invocation may carry GEMINI_API_KEY.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.downcast_ref::<RagError>().map(RagError::exit_code).unwrap_or(1);
            eprintln!("Error: {:#}", e);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_or_default(cli.config.as_deref())?;

    // Collections only reads the store; every other command needs a
    // working provider.
    if !matches!(cli.command, Commands::Collections) {
        cfg.check_api_key()?;
    }
    if matches!(cli.command, Commands::Query { .. }) {
        generate::check_cli_available(&cfg.generation).await?;
    }

    match cli.command {
        Commands::Ingest {
            project_root,
            force,
            collection,
            dry_run,
        } => {
            ingest::run_ingest(
                &cfg,
                &project_root,
                collection.as_deref(),
                IngestOptions::ingest(force, dry_run),
                cli.progress,
            )
            .await?;
        }
        Commands::Update {
            project_root,
            collection,
        } => {
            ingest::run_ingest(
                &cfg,
                &project_root,
                collection.as_deref(),
                IngestOptions::update(false),
                cli.progress,
            )
            .await?;
        }
        Commands::Query {
            query,
            collection,
            top_k,
            show_prompt,
        } => {
            query::run_query(&cfg, &query, collection.as_deref(), top_k, show_prompt).await?;
        }
        Commands::Collections => {
            collections::run_collections(&cfg).await?;
        }
    }

    Ok(())
}
