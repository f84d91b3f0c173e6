//! authlinkd - HTTP daemon for the authlink credential service.

use authlink::codes::{self, CodeStore, MemoryCodeStore, RedbCodeStore};
use authlink::config::{self, CodeStoreBackend, Config, PasswordAlgorithm};
use authlink::db::Database;
use authlink::http::{self, AppState};
use authlink::service::AuthService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        listen = %config.server.listen,
        database = %config.database.path,
        code_store = ?config.code_store.backend,
        "Starting authlinkd"
    );

    if config.server.metrics {
        authlink::metrics::init();
    }

    let db = Database::new(&config.database.path).await?;

    let code_store: Arc<dyn CodeStore> = match config.code_store.backend {
        CodeStoreBackend::Memory => {
            info!("Using in-memory code store; pending codes are lost on restart");
            Arc::new(MemoryCodeStore::new())
        }
        CodeStoreBackend::Redb => {
            info!(path = %config.code_store.path, "Opening redb code store");
            Arc::new(RedbCodeStore::open(&config.code_store.path)?)
        }
    };

    if config.password.algorithm == PasswordAlgorithm::Bcrypt {
        info!(cost = config.password.bcrypt_cost, "Hashing new passwords with bcrypt");
    }

    let service = AuthService::new(
        Arc::new(db),
        Arc::clone(&code_store),
        config.password.hasher(),
        config.auth_code.settings(),
    );

    let shutdown = CancellationToken::new();
    let reaper = codes::spawn_prune_task(
        code_store,
        config.code_store.prune_interval(),
        shutdown.clone(),
    );

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            shutdown.cancel();
        });
    }

    let state = AppState {
        service,
        request_timeout: config.server.request_timeout(),
        shutdown: shutdown.clone(),
    };
    let app = http::router(state, config.server.metrics);
    let listener = tokio::net::TcpListener::bind(config.server.listen).await?;

    http::serve(listener, app, shutdown.clone()).await?;

    shutdown.cancel();
    if let Err(e) = reaper.await {
        error!(error = %e, "Code reaper task failed");
    }
    info!("authlinkd stopped");
    Ok(())
}
