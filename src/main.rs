//! # Privy CLI (`privy`)
//!
//! ## Usage
//!
//! ```bash
//! privy [--config ~/.privy/config.toml] [command]
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `privy` / `privy shell` | Interactive shell |
//! | `privy ask "<request>"` | Run one request and print the result |
//! | `privy index` | Rebuild the documentation index |
//! | `privy search "<query>"` | Print the documentation context for a query |
//! | `privy status` | System dashboard |
//! | `privy pm <package>` | Install a package and print a cheat sheet |
//! | `privy completions <shell>` | Print a shell completion script |

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use privy::agent::AgentOrchestrator;
use privy::config::{self, Config};
use privy::generator::{create_generator, TextGenerator};
use privy::index::{format_context, RetrievalIndex};
use privy::models::AgentResult;
use privy::repl::Repl;
use privy::store::SqliteStore;
use privy::{pm, status};

/// Privy: a local AI terminal assistant grounded in your own documentation.
#[derive(Parser)]
#[command(
    name = "privy",
    about = "Privy: a local AI terminal assistant",
    version,
    long_about = "Privy turns natural-language requests into shell commands or answers. \
    It can run read-only checks to inspect the system, and grounds its replies in a local \
    documentation index embedded with the configured provider (Ollama or Gemini)."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `~/.privy/config.toml`. A missing file means built-in
    /// defaults; environment variables override file values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell (the default).
    Shell,

    /// Run one request through the assistant.
    Ask {
        /// The request, e.g. `How much disk space is left?`.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the documentation index for the active provider.
    ///
    /// Replaces the provider's previous index in one step.
    Index {
        /// Override `[index].docs_dir`.
        #[arg(long)]
        docs_dir: Option<PathBuf>,
    },

    /// Print the documentation context retrieved for a query.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Maximum number of chunks (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show CPU, memory, disk and provider status.
    Status,

    /// Install a package with apt and print an AI-generated cheat sheet.
    Pm {
        package: String,
    },

    /// Print a shell completion script.
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("privy=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "privy", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = config::load_config(&config_path)?;
    let generator = create_generator(&cfg)?;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let agent = build_agent(&cfg, generator).await;
            let mut repl = Repl::new(agent, cfg.agent.history_limit);
            repl.run().await?;
        }
        Commands::Ask { query, json } => {
            let agent = build_agent(&cfg, generator).await;
            let result = agent.run(&query.join(" "), &[]).await;
            print_result(&result, json)?;
            if result.is_error() {
                std::process::exit(1);
            }
        }
        Commands::Index { docs_dir } => {
            let index = open_index(&cfg).await?;
            let dir = docs_dir.unwrap_or_else(|| cfg.index.docs_dir.clone());
            let stats = index.rebuild(&dir, generator.as_ref()).await?;
            println!(
                "Indexed {} chunks from {} files for {} ({} skipped).",
                stats.chunks,
                stats.files,
                generator.identity(),
                stats.skipped
            );
        }
        Commands::Search { query, top_k } => {
            run_search(&cfg, generator.as_ref(), &query.join(" "), top_k).await?;
        }
        Commands::Status => {
            let index = open_index(&cfg).await.ok();
            let store = index.as_ref().map(|i| i.store().as_ref());
            status::run_status(generator.as_ref(), store).await?;
        }
        Commands::Pm { package } => pm::run_pm(generator.as_ref(), &package).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// An orchestrator over the persisted index; without one it runs ungrounded.
async fn build_agent(cfg: &Config, generator: Arc<dyn TextGenerator>) -> AgentOrchestrator {
    let agent = AgentOrchestrator::new(generator, &cfg.agent);
    match open_index(cfg).await {
        Ok(index) => agent.with_index(index),
        Err(e) => {
            let reason = format!("{:#}", e);
            warn!(error = %reason, "index unavailable, continuing without documentation");
            agent
        }
    }
}

async fn open_index(cfg: &Config) -> Result<Arc<RetrievalIndex>> {
    let store = SqliteStore::open(&cfg.index.db_path)
        .await
        .with_context(|| format!("Failed to open index at {}", cfg.index.db_path.display()))?;
    Ok(Arc::new(RetrievalIndex::new(
        Arc::new(store),
        cfg.index.clone(),
        cfg.retrieval.clone(),
    )))
}

async fn run_search(
    cfg: &Config,
    generator: &dyn TextGenerator,
    query: &str,
    top_k: Option<usize>,
) -> Result<()> {
    let index = open_index(cfg).await?;
    let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
    if top_k == 0 {
        bail!("--top-k must be at least 1");
    }

    let results = index.search(query, generator, top_k).await;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for r in &results {
        println!("{:.3}  {}#{}", r.score, r.chunk.source, r.chunk.ordinal);
    }
    println!();
    print!("{}", format_context(&results));
    Ok(())
}

fn print_result(result: &AgentResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    match result {
        AgentResult::Message { content } => println!("{}", content),
        AgentResult::Suggestion {
            content,
            explanation,
        } => {
            if let Some(explanation) = explanation {
                println!("{}", explanation);
                println!();
            }
            println!("{}", content);
        }
        AgentResult::Error { content } => eprintln!("{}", content),
    }
    Ok(())
}
