//! Ember CLI - Command-line interface for Ember media generation

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{gallery, generate, parse, providers, vault};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "EMBER_LOG";
const DEFAULT_LOG_FILTER: &str = "warn,ember=info";

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Generate media from prompts and keep the results", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a prompt, wait for the job, and store every result
    Generate {
        /// Prompt text
        #[arg(long, short)]
        prompt: String,

        /// Request an instrumental track
        #[arg(long)]
        instrumental: bool,

        /// Requested duration in seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Owner recorded on saved assets
        #[arg(long)]
        owner: Option<String>,

        /// Cover image URL to use instead of the provider's
        #[arg(long)]
        cover: Option<String>,

        /// Provider to use (mock, http)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Extract result clips from a saved status payload
    Parse {
        /// Path to a JSON file
        path: String,

        /// Output format (json or text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Gallery cache operations
    #[command(subcommand)]
    Gallery(gallery::GalleryCommands),

    /// Asset vault operations
    #[command(subcommand)]
    Vault(vault::VaultCommands),

    /// List providers and whether they are usable
    Providers,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            prompt,
            instrumental,
            duration,
            owner,
            cover,
            provider,
        } => generate::run(generate::GenerateArgs {
            prompt,
            instrumental,
            duration,
            owner,
            cover,
            provider,
        }),
        Commands::Parse { path, format } => parse::run(&path, &format),
        Commands::Gallery(cmd) => gallery::run(cmd),
        Commands::Vault(cmd) => vault::run(cmd),
        Commands::Providers => providers::run(),
    }
}
