use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recall::cli::{fetch, hook, index, show};
use recall::config::Config;

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Incremental conversation index and context recall for coding sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "recall.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Prompt-submit hook: reads the host payload from stdin
    Hook,

    /// Bring the index up to date with a transcript
    Index {
        /// Session ID
        #[arg(short, long)]
        session: String,

        /// Path to the JSONL transcript
        #[arg(short, long)]
        transcript: String,
    },

    /// Browse indexed exchanges, most recent first
    Show {
        /// Page number
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Jump to the page containing this time (e.g. "2pm", "jan 5 2:30pm")
        #[arg(long)]
        around: Option<String>,

        /// List exchanges matching a term
        #[arg(long)]
        search: Option<String>,
    },

    /// Fetch full exchanges: last<N>, around <time>, search <term>
    Fetch {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {:#}", e);
            Config::default()
        }
    };

    match cli.command {
        Commands::Hook => {
            hook::run(&config)?;
        }
        Commands::Index {
            session,
            transcript,
        } => {
            index::run(&config, &session, &transcript)?;
        }
        Commands::Show {
            page,
            around,
            search,
        } => {
            show::run(&config, page, around, search)?;
        }
        Commands::Fetch { args } => {
            fetch::run(&config, &args)?;
        }
    }

    Ok(())
}
