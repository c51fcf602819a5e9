pub mod access;
pub mod api;
pub mod clinical;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod gateway; // Patient QR / biometric lookup
pub mod identity;
pub mod models;
pub mod qr;
pub mod seed;
pub mod validation;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError};
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
    #[error("Seeding failed: {0}")]
    Seed(#[from] identity::IdentityError),
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// configured filter.
pub fn init_tracing(config: &AppConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();
}

/// Prepare storage and insert the reference data.
pub fn seed_database(config: AppConfig) -> Result<seed::SeedReport, AppError> {
    let core = CoreState::new(config);
    core.init_storage()?;
    let conn = core.open_db()?;
    let report = seed::seed(&conn, &core.config)?;
    tracing::info!(
        services = report.services_created,
        accounts = report.accounts_created,
        "Seed complete"
    );
    Ok(report)
}

/// Serve the API until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let core = Arc::new(CoreState::new(config));
    core.init_storage()?;

    let mut server = api::start_server(core).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {e}");
    }
    server.shutdown();
    server.wait().await?;
    Ok(())
}
