//! invest-llm - LLM API microservice
//!
//! Exposes document vectorization, search, chat and investment analysis over
//! HTTP for the approval application and other internal callers. Every route
//! except `/health` and `/info` requires the service API key.

use anyhow::{bail, Context, Result};
use clap::Parser;
use invest_common::api::generate_api_key;
use invest_common::config::{resolve_secret, CompiledDefaults, TomlConfig};
use std::net::{IpAddr, SocketAddr};
use tokio::signal;
use tracing::{error, info};

use invest_llm::{AppState, LlmServices, LlmSettings};

#[derive(Parser, Debug)]
#[command(name = "invest-llm")]
#[command(about = "LLM API microservice for investment approvals")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "INVEST_LLM_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "INVEST_LLM_BIND")]
    bind: IpAddr,

    /// Print a new service API key and exit
    #[arg(long)]
    generate_api_key: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_api_key {
        println!("{}", generate_api_key());
        return Ok(());
    }

    let toml_config = TomlConfig::load_or_default();
    invest_common::logging::init("invest_llm", &toml_config.logging)?;

    info!(
        "Starting invest-llm v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let Some(service_api_key) = resolve_secret(
        "Service API key",
        "INVEST_SERVICE_API_KEY",
        toml_config.service_api_key.as_ref(),
    ) else {
        bail!("No service API key configured. Set INVEST_SERVICE_API_KEY (create one with --generate-api-key)");
    };

    let Some(settings) = LlmSettings::resolve(&toml_config) else {
        bail!("No OpenAI API key configured. Set OPENAI_API_KEY or openai_api_key in config.toml");
    };
    info!(
        anthropic = settings.anthropic_api_key.is_some(),
        default_vector_store = settings.default_vector_store_id.as_deref().unwrap_or("none"),
        "Providers configured"
    );

    let services = LlmServices::from_settings(&settings).context("Failed to build LLM clients")?;
    let app = invest_llm::build_router(AppState::new(services, service_api_key));

    let port = args
        .port
        .or(toml_config.llm_port)
        .unwrap_or_else(|| CompiledDefaults::for_current_platform().llm_port);
    let addr = SocketAddr::new(args.bind, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
