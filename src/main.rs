//! bedrock-relay - stream Amazon Bedrock completions to HTTP clients
//!
//! Accepts a prompt on `POST /generate-text` and relays the model's streamed
//! output back as server-sent events.

use std::path::Path;

use bedrock_relay::config::{Config, LogFormat, LoggingConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Parser)]
#[command(name = "bedrock-relay")]
#[command(about = "Stream Amazon Bedrock completions as server-sent events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
}

/// Load the config file; a missing file at the default path means defaults.
fn load_config(path: &str) -> anyhow::Result<(Config, bool)> {
    if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
        let config = Config::default();
        config.validate()?;
        return Ok((config, false));
    }
    Ok((Config::from_file(path)?, true))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "bedrock_relay={level},tower_http={level}",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let (mut loaded, from_file) = load_config(&config)?;
            init_tracing(&loaded.logging);

            if from_file {
                tracing::info!(config = %config, "Loaded configuration");
            } else {
                tracing::info!("No config file found, using defaults");
            }

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                loaded.server.listen = addr;
            }

            bedrock_relay::proxy::run_server(loaded).await
        }

        Commands::Check { config } => {
            let (loaded, _) = load_config(&config)?;
            println!("Configuration OK");
            println!("  listen:  {}", loaded.server.listen);
            println!("  region:  {}", loaded.upstream.region);
            if let Some(endpoint) = &loaded.upstream.endpoint_url {
                println!("  endpoint: {}", endpoint);
            }
            println!(
                "  credentials: {}",
                if loaded.upstream.credentials.is_some() {
                    "static (config)"
                } else {
                    "default provider chain"
                }
            );
            println!("  model:   {}", loaded.model.id);
            println!(
                "  generation: max_tokens={} temperature={} top_p={} stop={:?}",
                loaded.model.max_token_count,
                loaded.model.temperature,
                loaded.model.top_p,
                loaded.model.stop_sequences
            );
            Ok(())
        }
    }
}
