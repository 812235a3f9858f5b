//! invest-app - Investment approval service
//!
//! Serves the approval REST API and runs the background document analysis
//! processor against the same SQLite database.

use anyhow::{Context, Result};
use clap::Parser;
use invest_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig};
use invest_common::events::EventBus;
use invest_llm::{DocumentIntelligence, LlmGateway, LlmServices, LlmSettings};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use invest_app::services::{bootstrap, JobProcessor};
use invest_app::{AppState, EVENT_BUS_CAPACITY};

#[derive(Parser, Debug)]
#[command(name = "invest-app")]
#[command(about = "Investment approval workflow service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "INVEST_APP_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "INVEST_APP_BIND")]
    bind: IpAddr,

    /// Root folder holding the database and uploads
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::load_or_default();
    invest_common::logging::init("invest_app", &toml_config.logging)?;

    info!(
        "Starting invest-app v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let root_folder = RootFolderResolver::new("invest-app")
        .with_cli_arg(args.root_folder)
        .with_toml(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = invest_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    bootstrap::ensure_admin(&db, toml_config.bootstrap_admin.as_ref())
        .await
        .context("Failed to create bootstrap administrator")?;
    let purged = invest_app::db::sessions::purge_expired_sessions(&db).await?;
    if purged > 0 {
        info!("Purged {} expired session(s)", purged);
    }

    let intelligence: Option<Arc<dyn DocumentIntelligence>> = match LlmSettings::resolve(&toml_config) {
        Some(settings) => {
            let services = LlmServices::from_settings(&settings).context("Failed to build LLM clients")?;
            if services.default_vector_store_id.is_none() {
                warn!("No default vector store configured; vectorizing will fail until DEFAULT_VECTOR_STORE_ID is set");
            }
            Some(Arc::new(LlmGateway::new(Arc::new(services))))
        }
        None => {
            warn!("No OpenAI API key configured; document analysis disabled and jobs stay pending");
            None
        }
    };

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let state = AppState::new(
        db.clone(),
        event_bus.clone(),
        initializer.uploads_path(),
        intelligence.clone(),
    );

    let cancel = CancellationToken::new();
    let worker = intelligence.map(|intelligence| {
        let processor = JobProcessor::new(db.clone(), event_bus, intelligence, state.job_wakeup.clone());
        tokio::spawn(processor.run(cancel.clone()))
    });

    let app = invest_app::build_router(state);

    let port = args
        .port
        .or(toml_config.port)
        .unwrap_or_else(|| CompiledDefaults::for_current_platform().port);
    let addr = SocketAddr::new(args.bind, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Some(worker) = worker {
        info!("Waiting for the job processor to finish");
        if let Err(e) = worker.await {
            error!("Job processor task failed: {}", e);
        }
    }

    db.close().await;
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
