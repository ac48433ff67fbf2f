//! prompt-relay - Streaming relay for a single chat-completion endpoint
//!
//! Accepts prompts over HTTP, forwards them upstream, and streams the answer
//! back as Server-Sent Events or a single text body.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prompt_relay::config::Config;
use prompt_relay::proxy::run_server;

#[derive(Parser)]
#[command(name = "prompt-relay")]
#[command(about = "Streaming relay for a single chat-completion endpoint")]
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
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("prompt_relay={},tower_http=info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let mut cfg = Config::from_file_with_env(&config)?;
            init_tracing(&cfg.logging.level);
            tracing::info!(config = %config, "Loaded configuration");

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                cfg.server.listen = addr;
            }

            run_server(cfg).await
        }

        Commands::Check { config } => {
            init_tracing("info");
            let cfg = Config::from_file_with_env(&config)?;

            println!("Configuration OK: {}", config);
            println!("  listen:          {}", cfg.server.listen);
            println!("  upstream:        {}", cfg.upstream.url);
            println!(
                "  timeouts:        connect {}s, read {}s",
                cfg.upstream.connect_timeout_secs, cfg.upstream.read_timeout_secs
            );
            println!("  pacing:          {}ms", cfg.upstream.pacing_ms);
            println!("  default mode:    {}", cfg.relay.mode.as_str());
            for header in &cfg.upstream.headers {
                println!("  header:          {} = {}", header.name, header.value);
            }
            Ok(())
        }
    }
}
