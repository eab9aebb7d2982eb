use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atomic_ai::config::Config;
use atomic_ai::llm::OpenAICompatibleProvider;
use atomic_ai::server::{AppState, build_app};

#[derive(Parser)]
#[command(name = "atomic-ai", version, about = "ID card validation and banking assistant service")]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "atomic-ai.yaml")]
    config: PathBuf,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port (takes precedence over PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if config.llm.api_key.is_none() {
        tracing::warn!(
            env = %config.llm.api_key_env,
            "No LLM API key configured; upstream calls will be unauthenticated"
        );
    }

    let client = OpenAICompatibleProvider::build_client(
        Duration::from_secs(config.llm.connect_timeout_seconds),
        Duration::from_secs(config.llm.request_timeout_seconds),
    )?;
    let provider = OpenAICompatibleProvider::new(
        client,
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.auth_scheme,
    );

    let state = AppState::new(Arc::new(provider), &config);
    let app = build_app(
        state,
        config.server.request_timeout_seconds,
        config.server.max_upload_bytes,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        address = %addr,
        base_url = %config.llm.base_url,
        vision_model = %config.llm.vision_model,
        chat_model = %config.llm.chat_model,
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
