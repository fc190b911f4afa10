//! azrelay - OpenAI-compatible relay for deployment-based Azure OpenAI endpoints
//!
//! Accepts OpenAI-style completion requests, maps the model name to a
//! deployment and streams the vendor response back with paced framing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use azrelay::config::Config;
use azrelay::router::ModelAliases;

#[derive(Parser)]
#[command(name = "azrelay")]
#[command(about = "OpenAI-compatible relay for deployment-based Azure OpenAI endpoints")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,

        /// TOML file with extra model aliases
        #[arg(short, long)]
        aliases: Option<PathBuf>,
    },

    /// Validate configuration from the environment
    Check {
        /// TOML file with extra model aliases
        #[arg(short, long)]
        aliases: Option<PathBuf>,
    },

    /// Show the effective model alias table
    Models {
        /// TOML file with extra model aliases
        #[arg(short, long)]
        aliases: Option<PathBuf>,
    },
}

/// Load config from the environment, applying the CLI alias file override.
fn load(aliases: Option<PathBuf>) -> anyhow::Result<(Config, ModelAliases)> {
    let mut config = Config::from_env()?;
    if aliases.is_some() {
        config.models.aliases_file = aliases;
    }
    let table = ModelAliases::load(config.models.aliases_file.as_deref())?;
    Ok((config, table))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env file for local runs
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "azrelay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, aliases } => {
            tracing::info!("Starting azrelay");
            let (mut config, table) = load(aliases)?;

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            azrelay::proxy::run_server(config, table).await
        }

        Commands::Check { aliases } => {
            let (config, table) = load(aliases)?;

            println!("Configuration OK");
            println!("  listen:        {}", config.server.listen);
            println!("  upstream:      {}", config.upstream_origin());
            println!("  api version:   {}", config.upstream.api_version);
            println!(
                "  vendor key:    {}",
                if config.upstream.api_key.is_empty() { "unset" } else { "set" }
            );
            println!(
                "  inbound key:   {}",
                if config.auth.secret.is_some() { "set" } else { "unset (all proxied requests rejected)" }
            );
            println!("  pacing:        {} ms", config.stream.pacing.as_millis());
            match config.upstream.timeout {
                Some(t) => println!("  timeout:       {} s", t.as_secs()),
                None => println!("  timeout:       none"),
            }
            println!("  require model: {}", config.models.require_model);
            println!("  aliases:       {}", table.count());
            Ok(())
        }

        Commands::Models { aliases } => {
            let (_, table) = load(aliases)?;

            println!("{:<24} DEPLOYMENT", "MODEL");
            for (model, deployment) in table.entries() {
                println!("{:<24} {}", model, deployment);
            }
            Ok(())
        }
    }
}
