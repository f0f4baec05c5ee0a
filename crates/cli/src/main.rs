//! Nami CLI: the main entry point.
//!
//! Commands:
//! - `run`    : Start the router with the console and configured producers
//! - `status` : Show the effective configuration
//! - `onboard`: Write a default config file
//! - `score`  : Dry-run the scorer against every conversation state

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "nami",
    about = "Nami: attention router for a streaming companion",
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
    /// Start routing console and producer input
    Run {
        /// Answer admitted inputs inline instead of through the funnel
        #[arg(long)]
        no_funnel: bool,

        /// Override the initial conversation state
        #[arg(short, long)]
        state: Option<String>,
    },

    /// Show the effective configuration
    Status {
        /// Also check that the model endpoint answers
        #[arg(long)]
        check: bool,
    },

    /// Write a default configuration file
    Onboard,

    /// Score a hypothetical input without starting the router
    Score {
        /// Source kind (mic, mention, audio, vision, chat)
        #[arg(short = 'k', long, default_value = "mic")]
        source: String,

        /// Only compare against this conversation state
        #[arg(short, long)]
        state: Option<String>,

        /// Stated relevance in [0, 1]
        #[arg(long)]
        relevance: Option<f64>,

        /// Stated urgency in [0, 1]
        #[arg(long)]
        urgency: Option<f64>,

        /// Seconds since the last reply, to preview the cooldown penalty
        #[arg(long)]
        since_reply: Option<f64>,

        /// The input text
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { no_funnel, state } => commands::run::run(no_funnel, state).await?,
        Commands::Status { check } => commands::status::run(check).await?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Score {
            source,
            state,
            relevance,
            urgency,
            since_reply,
            text,
        } => {
            let args = commands::score::ScoreArgs {
                source,
                state,
                relevance,
                urgency,
                since_reply,
                text,
            };
            commands::score::run(args).await?
        }
    }

    Ok(())
}
