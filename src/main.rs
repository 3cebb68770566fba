//! QrMark daemon
//!
//! Boots configuration, logging and the database, then keeps event statuses
//! and reminders current until interrupted.

use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};

use qrmark::{
    config::Settings,
    utils::logging,
    database::{DatabaseService, PoolConfig, create_pool, run_migrations},
    services::ServiceFactory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("loading configuration")?;
    settings.validate().context("validating configuration")?;

    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", qrmark::info());

    // Initialize database connection
    info!("Connecting to database...");
    let db_pool = create_pool(&PoolConfig::from(&settings.database))
        .await
        .context("connecting to database")?;
    run_migrations(&db_pool).await?;

    let database_service = Arc::new(DatabaseService::new(db_pool));

    // Initialize services
    info!("Initializing services...");
    let services = ServiceFactory::from_settings(&settings, database_service)?;

    let health = services.health_check().await;
    if !health.is_healthy() {
        warn!(issues = ?health.get_issues(), "Starting with unhealthy services");
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    services.scheduler.clone().run(shutdown).await;

    services.notification_service.flush().await;
    info!("QrMark has been shut down.");

    Ok(())
}
