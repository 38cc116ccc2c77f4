//! Oracle CLI — the main entry point.
//!
//! Commands:
//! - `run`      — Start a voice session over the terminal
//! - `recall`   — Search long-term memory
//! - `remember` — Store a fact in long-term memory
//! - `config`   — Print or check configuration

use clap::{Parser, Subcommand};

mod commands;
mod terminal;

#[derive(Parser)]
#[command(
    name = "oracle",
    about = "Oracle — a voice agent with long-term memory and tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (type utterances, Ctrl+C to end)
    Run {
        /// Override the configured user id
        #[arg(short, long)]
        user: Option<String>,

        /// Skip the opening greeting
        #[arg(long)]
        no_greeting: bool,
    },

    /// Search long-term memory for the configured user
    Recall {
        query: String,

        /// Maximum number of facts to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Store a fact in long-term memory for the configured user
    Remember { fact: String },

    /// Print the default configuration, or check the current one
    Config {
        /// Validate the current configuration instead of printing defaults
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { user, no_greeting } => commands::run::run(user, no_greeting).await?,
        Commands::Recall { query, limit } => commands::memory::recall(&query, limit).await?,
        Commands::Remember { fact } => commands::memory::remember(&fact).await?,
        Commands::Config { check } => commands::config_cmd::run(check).await?,
    }

    Ok(())
}
