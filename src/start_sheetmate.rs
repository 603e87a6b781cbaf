//! Startup helpers for the SheetMate agent server.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::core::config::AssistantConfig;
use crate::core::errors::AssistantResult;
use crate::llm::OllamaClient;
use crate::server::{self, AppState};

/// How long startup waits for Ollama before serving anyway.
const OLLAMA_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Install the global tracing subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}

/// Run the server (used by the `sheetmate-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();

    info!("Starting SheetMate agent v{}", env!("CARGO_PKG_VERSION"));

    let config = AssistantConfig::from_env();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        return ExitCode::from(1);
    }

    let state = match initialize(&config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let served = rt.block_on(async {
        probe_ollama(&config).await;
        server::run_server_with_shutdown(state, config.server.port, shutdown_signal()).await
    });
    if let Err(e) = served {
        error!("Server error: {e}");
        return ExitCode::from(1);
    }

    info!("SheetMate agent stopped");
    ExitCode::SUCCESS
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if state creation fails.
pub fn initialize(config: &AssistantConfig) -> AssistantResult<Arc<AppState>> {
    info!(endpoint = %config.llm.base_url, model = %config.llm.model, "using Ollama");
    AppState::new(config)
}

async fn probe_ollama(config: &AssistantConfig) {
    let ollama = match OllamaClient::new(&config.llm) {
        Ok(ollama) => ollama,
        Err(e) => {
            warn!("Cannot probe Ollama: {e}");
            return;
        }
    };
    if !ollama.wait_until_ready(OLLAMA_READY_TIMEOUT).await {
        warn!(
            endpoint = %config.llm.base_url,
            "Ollama is not answering yet, requests will fail until it is up"
        );
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
