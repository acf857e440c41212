use anyhow::Error as AnyhowError;
use server::{DeploymentImpl, deployment::DeploymentError, file_logging, routes};
use services::services::config::{ConfigError, ServerConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), KanbanError> {
    dotenvy::dotenv().ok();

    // Held until exit so buffered file logs are flushed.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _file_log_guard = file_logging::init_logging(&log_level);

    let config = ServerConfig::from_env()?;
    tracing::info!(
        database = %config.database_path.display(),
        audience = %config.token_audience,
        push_enabled = config.push_enabled,
        "Starting kanban server"
    );

    let deployment = DeploymentImpl::new(config).await?;
    let app_router = routes::router(deployment.clone());

    let listener = tokio::net::TcpListener::bind(deployment.config().bind_address()).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Server running on http://{local_addr}");

    axum::serve(listener, app_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    perform_cleanup_actions(&deployment).await;
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

/// Let in-flight push deliveries finish, then checkpoint and close the pool.
pub async fn perform_cleanup_actions(deployment: &DeploymentImpl) {
    tracing::info!("Waiting for pending push deliveries...");
    deployment.notifier().flush_deliveries().await;

    tracing::info!("Closing database...");
    deployment.db().close().await;
    tracing::info!("Database closed");
}
