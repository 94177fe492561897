use std::sync::Arc;

use clap::Parser;
use reverie_core::ReverieConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use reverie_server::http::{self, AppState};
use reverie_server::startup;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "reverie.toml")]
    config: String,

    /// Check the store connection and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ReverieConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let store = match startup::open_store(&config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open {:?} store: {}", config.storage.backend, e);
            std::process::exit(1);
        }
    };

    if args.health {
        match store.health().await {
            Ok(v) => println!("✅ {} store connected: {}", store.name(), v),
            Err(e) => {
                println!("❌ {} store check failed: {}", store.name(), e);
                std::process::exit(1);
            }
        }
        println!("✅ Reverie health check passed");
        return Ok(());
    }

    let agents = match startup::build_agents(&config.llm, std::env::var("OPENROUTER_API_KEY").ok()) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Failed to create LLM client: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        cheap = %config.llm.cheap_model,
        balanced = %config.llm.balanced_model,
        store = store.name(),
        "Reverie starting"
    );

    let state = Arc::new(AppState {
        store,
        agents,
        expose_errors: config.http.expose_errors,
    });

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
        }
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, &config.http, tx.subscribe()).await?;

    Ok(())
}
