use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vine_concierge::commands::{ask, chat, delete_index, ingest_document, show_status, weather};
use vine_concierge::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "vine-concierge")]
#[command(about = "Answers questions about a wine business from its documents, the web and the weather")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure API keys, models and the default city
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the retrieval index from the business document
    Ingest {
        /// Document to ingest instead of the configured one
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Ask a single question
    Ask {
        /// The question
        query: String,
        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start an interactive question session
    Chat,
    /// Show the current weather
    Weather {
        /// City to look up, e.g. "Napa,CA"; defaults to the configured city
        city: Option<String>,
    },
    /// Show the state of the index and configured services
    Status,
    /// Remove the stored index
    DeleteIndex,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&Config::load()?)?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { path } => {
            ingest_document(&Config::load()?, path)?;
        }
        Commands::Ask { query, json } => {
            ask(Config::load()?, &query, json)?;
        }
        Commands::Chat => {
            chat(Config::load()?)?;
        }
        Commands::Weather { city } => {
            weather(Config::load()?, city.as_deref())?;
        }
        Commands::Status => {
            show_status(&Config::load()?)?;
        }
        Commands::DeleteIndex => {
            delete_index(&Config::load()?)?;
        }
    }

    Ok(())
}
