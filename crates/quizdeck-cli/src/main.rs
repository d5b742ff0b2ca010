//! quizdeck CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod context;
mod display;

use commands::cache::CacheAction;
use commands::quiz::QuizArgs;

#[derive(Parser)]
#[command(name = "quizdeck", version, about = "Exam quiz engine with a durable question cache")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and sample corpus
    Init,

    /// Check a corpus for malformed records and quality issues
    Validate {
        /// Corpus file or URL (defaults to the configured corpus)
        #[arg(long)]
        corpus: Option<String>,
    },

    /// Show the question index
    Index {
        /// List the questions of one subject
        #[arg(long)]
        subject: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Take a quiz
    Quiz(QuizArgs),

    /// Show statistics of the last session
    Stats {
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Inspect or manage the durable question cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Discard the saved session
    Reset {
        /// Also clear cached chunks and the saved quiz settings
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "quizdeck=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { corpus } => commands::validate::execute(config, corpus).await,
        Commands::Index { subject, json } => commands::index::execute(config, subject, json).await,
        Commands::Quiz(args) => commands::quiz::execute(config, args).await,
        Commands::Stats { json } => commands::stats::execute(config, json).await,
        Commands::Cache { action } => commands::cache::execute(config, action).await,
        Commands::Reset { all } => commands::reset::execute(config, all).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
