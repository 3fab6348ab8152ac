//! Entitle CLI
//!
//! Command-line consumer of the entitlement session.
//!
//! # Usage
//!
//! ```bash
//! entitle --user u1 status
//! entitle --user u1 consume
//! entitle --user u1 set-credits 10
//! entitle --user u1 subscribe pro
//! entitle config set api_url https://api.example.com/v1
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "entitle")]
#[command(version)]
#[command(about = "Subscription and credit client", long_about = None)]
struct Cli {
    /// Entitlement service URL
    #[arg(long, env = "ENTITLE_API_URL")]
    api_url: Option<String>,

    /// API key for authentication
    #[arg(long, env = "ENTITLE_API_KEY")]
    api_key: Option<String>,

    /// Signed-in user
    #[arg(long, short, env = "ENTITLE_USER_ID")]
    user: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    format: output::OutputFormat,

    /// Profile name from config file
    #[arg(long, short)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show credits and subscription
    Status,
    /// Consume one credit
    Consume,
    /// Overwrite the credit balance
    SetCredits { credits: u32 },
    /// Subscribe to a plan
    Subscribe { plan: String },
    /// Forget the stored user
    Logout,
    /// Configure CLI
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set configuration value
    Set { key: String, value: String },
    /// Get configuration value
    Get { key: String },
    /// List all configuration
    List,
    /// Initialize configuration
    Init,
}

fn init_tracing(level: Option<&str>) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| level.map(String::from))
        .unwrap_or_else(|| "warn".into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match config::Config::load(cli.profile.as_deref()) {
        Ok(config) => {
            init_tracing(config.log_level.as_deref());
            config
        }
        Err(e) => {
            init_tracing(None);
            let detail = format!("{:#}", e);
            tracing::warn!(error = %detail, "ignoring unreadable config, using defaults");
            config::Config::default()
        }
    };

    let profile = cli.profile.as_deref();
    let result = match cli.command {
        Commands::Config { action } => commands::config::handle(action, profile),
        Commands::Logout => commands::config::logout(profile),
        command => {
            let target = commands::Target {
                api_url: cli.api_url.or(config.api_url.clone()),
                api_key: cli.api_key.or(config.api_key.clone()),
                user: cli.user.or(config.user_id.clone()),
                timeout_secs: config.timeout_secs,
            };
            match commands::connect(&target).await {
                Ok(session) => match command {
                    Commands::Status => commands::credits::status(&session, cli.format),
                    Commands::Consume => commands::credits::consume(&session).await,
                    Commands::SetCredits { credits } => {
                        commands::credits::set(&session, credits).await
                    }
                    Commands::Subscribe { plan } => {
                        commands::subscription::subscribe(&session, &plan, cli.format).await
                    }
                    Commands::Config { .. } | Commands::Logout => Ok(()),
                },
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        if e.downcast_ref::<output::AlreadyReported>().is_none() {
            eprintln!("{} {:#}", "error:".red().bold(), e);
        }
        std::process::exit(1);
    }
}
