//! `notevec`: semantic search over a markdown notes vault.
//!
//! ```bash
//! notevec index --scope memory
//! notevec search "how did I fix the boiler" -k 3
//! notevec status --json
//! ```

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::Secret;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use notevec_cli::output;
use notevec_core::{Config, EngineConfig};
use notevec_embed::build_provider;
use notevec_index::{status, BuildOptions, CancelFlag, Indexer, SearchEngine, SearchQuery};

#[derive(Parser)]
#[command(name = "notevec", version, about = "Semantic vector search over memory notes and a knowledge base")]
struct Cli {
    /// Config file (default: ./notevec.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `corpus.root`
    #[arg(long, global = true)]
    root: Option<String>,

    /// API key for the remote provider, used when the config has none
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// -v for info, -vv for debug. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build or update the index; only changed files are re-embedded
    Index {
        /// `all` or a configured scope name
        #[arg(long, default_value = "all")]
        scope: String,

        /// Re-embed every file, ignoring stored fingerprints
        #[arg(long)]
        force: bool,
    },
    /// Rank indexed chunks against a query
    Search {
        query: String,

        /// Number of results (default: `search.top_k`)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[arg(long, default_value = "all")]
        scope: String,

        /// Minimum similarity score (default: `search.threshold`)
        #[arg(long)]
        threshold: Option<f32>,

        #[arg(long)]
        json: bool,
    },
    /// Show index statistics without embedding anything
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut engine = Config::load_from(cli.config.as_deref())
        .and_then(|c| c.engine())
        .context("failed to load configuration")?;
    if let Some(root) = &cli.root {
        engine.corpus.root.clone_from(root);
    }
    if engine.embedding.api_key.is_none() {
        engine.embedding.api_key = cli.api_key.clone().filter(|k| !k.is_empty()).map(Secret::new);
    }
    debug!(root = %engine.corpus.root_dir().display(), index = %engine.corpus.index_file().display(), "configuration loaded");
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let engine = load_config(&cli)?;

    match &cli.command {
        Command::Index { scope, force } => {
            let scope = engine.corpus.scope(scope)?;
            let provider = build_provider(&engine.embedding)?;
            let indexer = Indexer::new(&engine, provider);
            let _lock = indexer.store().lock()?;

            let cancel = CancelFlag::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current batch");
                    on_interrupt.cancel();
                }
            });

            let options = BuildOptions { scope, force: *force, progress: std::io::stderr().is_terminal(), cancel };
            let report = indexer.build(&options).await?;
            println!("{}", output::format_build(&report));
        }
        Command::Search { query, top_k, scope, threshold, json } => {
            let scope = engine.corpus.scope(scope)?;
            let provider = build_provider(&engine.embedding)?;
            let store = notevec_index::IndexStore::new(engine.corpus.index_file());
            let search = SearchEngine::open(&store, provider);
            let request = SearchQuery::new(query.clone(), top_k.unwrap_or(engine.search.top_k))
                .with_scope(scope.clone())
                .with_min_score(threshold.unwrap_or(engine.search.threshold));
            let outcome = search.search(&request).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&output::search_json(query, &scope, &outcome))?);
            } else {
                println!("{}", output::format_search(&outcome, &scope, engine.search.preview_chars));
            }
        }
        Command::Status { json } => {
            let store = notevec_index::IndexStore::new(engine.corpus.index_file());
            let report = status(&store, &engine.corpus.named_scopes())?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", output::format_status(&report));
            }
        }
    }
    Ok(())
}
