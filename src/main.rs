use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notes_rag::Result;
use notes_rag::commands::{ask, build, import_keep, query, run_config, shell, status};
use notes_rag::config::Config;
use notes_rag::generation::Mode;

#[derive(Parser)]
#[command(name = "notes-rag")]
#[command(about = "Semantic search and AI analysis over a personal notes collection")]
#[command(version)]
struct Cli {
    /// Base directory for configuration and data artifacts
    #[arg(long, default_value = ".", global = true)]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Convert a directory of Google Keep JSON exports into the notes CSV
    ImportKeep {
        /// Directory containing the JSON exports
        dir: PathBuf,
    },
    /// Chunk the notes, embed every chunk, and build the search index
    Build,
    /// Retrieve the most relevant chunks for a query
    Query {
        /// The search query
        query: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Retrieve relevant chunks and generate an answer
    Ask {
        /// The question to answer
        query: String,
        /// Prompt mode: analysis, summary, or patterns
        #[arg(long, default_value = "analysis")]
        mode: Mode,
    },
    /// Start an interactive query shell
    Shell,
    /// Show artifact status and consistency
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.base_dir)?;

    match cli.command {
        Commands::Config { show } => {
            run_config(&config, show)?;
        }
        Commands::ImportKeep { dir } => {
            import_keep(&config, &dir)?;
        }
        Commands::Build => {
            build(config)?;
        }
        Commands::Query { query: text, top_k } => {
            query(&config, &text, top_k)?;
        }
        Commands::Ask { query: text, mode } => {
            ask(&config, &text, mode)?;
        }
        Commands::Shell => {
            shell(&config)?;
        }
        Commands::Status => {
            status(&config)?;
        }
    }

    Ok(())
}
