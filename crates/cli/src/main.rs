//! Reagent CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Create `~/.reagent/` with a default config and prompts
//! - `agent`    — Interactive chat or single-message mode
//! - `status`   — Show the resolved configuration
//! - `config`   — Show, validate, or locate the config file
//! - `prompts`  — List, validate, or show prompt templates
//! - `runs`     — Recent run records
//! - `session`  — Inspect stored transcripts

use clap::{Parser, Subcommand};
use reagent_config::{AppConfig, ConfigError, LogFormat, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "reagent",
    about = "Reagent — a ReAct agent scaffold for tool-using LLM agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.reagent/config.toml
    #[arg(short, long, global = true, env = "REAGENT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and prompt templates
    Onboard,

    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue a stored session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Show the resolved configuration summary
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Prompt template management
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },

    /// Show recent run records
    Runs {
        /// How many runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Inspect stored sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML (secrets redacted)
    Show,
    /// Load and validate the configuration
    Validate,
    /// Print the config file path
    Path,
}

#[derive(Subcommand)]
enum PromptsAction {
    /// List available prompts
    List,
    /// Check every prompt's placeholders against its declared variables
    Validate,
    /// Print one prompt
    Show { name: String },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Print a stored transcript
    Show { id: String },
    /// List stored sessions, most recent first
    List {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}

/// `RUST_LOG` wins; otherwise `--verbose`, then `logging.level`.
fn init_tracing(logging: Option<&LoggingConfig>, verbose: bool) {
    let default_level = match (verbose, logging) {
        (true, _) => "debug".to_string(),
        (false, Some(logging)) => logging.level.clone(),
        (false, None) => "info".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.map(|l| l.format).unwrap_or_default() {
        LogFormat::Json => builder.json().init(),
        LogFormat::Console => builder.with_target(false).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref());
    init_tracing(loaded.as_ref().ok().map(|c| &c.logging), cli.verbose);
    match &loaded {
        Ok(config) => debug!(environment = %config.environment, provider = %config.llm.provider, "Configuration loaded"),
        Err(e) => debug!("Configuration failed to load: {e}"),
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Config { action: ConfigAction::Path } => {
            commands::config_cmd::path(cli.config.as_deref())
        }
        Commands::Config { action: ConfigAction::Validate } => commands::config_cmd::validate(loaded)?,
        Commands::Config { action: ConfigAction::Show } => commands::config_cmd::show(&loaded?)?,
        Commands::Agent { message, session } => commands::agent::run(&loaded?, message, session).await?,
        Commands::Status => commands::status::run(&loaded?).await?,
        Commands::Prompts { action } => {
            let config = loaded?;
            match action {
                PromptsAction::List => commands::prompts::list(&config)?,
                PromptsAction::Validate => commands::prompts::validate(&config)?,
                PromptsAction::Show { name } => commands::prompts::show(&config, &name)?,
            }
        }
        Commands::Runs { limit } => commands::runs::run(&loaded?, limit).await?,
        Commands::Session { action } => {
            let config = loaded?;
            match action {
                SessionAction::Show { id } => commands::session::show(&config, &id).await?,
                SessionAction::List { limit } => commands::session::list(&config, limit).await?,
            }
        }
    }

    Ok(())
}
