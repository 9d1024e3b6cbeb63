//! Fan-out LLM gateway binary.
//!
//! Loads the TOML configuration, builds the backend registry, starts the
//! metrics exporter and the config watcher, then serves until SIGINT/SIGTERM.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use fanout_gateway::config::loader::load_config;
use fanout_gateway::config::watcher::ConfigWatcher;
use fanout_gateway::config::GatewayConfig;
use fanout_gateway::lifecycle::signals::shutdown_signal;
use fanout_gateway::lifecycle::startup::{build_registry, load_secrets};
use fanout_gateway::observability::{logging, metrics};
use fanout_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "fanout-gateway")]
#[command(about = "Security-hardened gateway that fans one prompt out to many LLM backends", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fanout-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        rate_limit = config.rate_limit.max_requests,
        rate_window_secs = config.rate_limit.window_secs,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = build_registry(&config)?;
    let secrets = load_secrets(&config);

    // The watcher must stay alive for the lifetime of the process.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry, secrets);
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
