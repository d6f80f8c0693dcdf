//! Clinic server.
//!
//! Connects the configured storage backend, provisions every index and keeps
//! the services running until interrupted.

use std::sync::Arc;

use clap::Parser;
use clinic_persistence::backends::memory::MemoryBackend;
use clinic_persistence::core::{Backend, DeletionStore, TransactionProvider, UserDirectory};
use clinic_persistence::services::ClinicServices;
use clinic_persistence::sharecode::RandomShareCodeGenerator;
use clinic_persistence::summary::SummaryStore;
use clinic_persistence::{BackendKind, OperationContext};
use clinic_server::{ServerConfig, StaticUserDirectory, init_logging};
use tracing::info;

/// Builds the services over `backend`, provisions indexes and waits for
/// shutdown.
async fn run<B>(
    backend: B,
    directory: Arc<dyn UserDirectory>,
    config: &ServerConfig,
) -> anyhow::Result<()>
where
    B: Backend + TransactionProvider + SummaryStore + DeletionStore + 'static,
{
    let services = ClinicServices::new(
        Arc::new(backend),
        directory,
        Arc::new(RandomShareCodeGenerator::new()),
        config.clinic_manager_config(),
    );

    let ctx = OperationContext::new()
        .with_timeout(config.startup_timeout())
        .with_correlation_id("startup");
    services.backend().health_check().await?;
    services.initialize(&ctx).await?;

    info!(backend = services.backend().name(), "Clinic server ready");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}

/// Starts the server on the in-memory backend.
async fn start_memory(directory: Arc<dyn UserDirectory>, config: &ServerConfig) -> anyhow::Result<()> {
    run(MemoryBackend::new(), directory, config).await
}

/// Starts the server on MongoDB.
#[cfg(feature = "mongodb")]
async fn start_mongodb(directory: Arc<dyn UserDirectory>, config: &ServerConfig) -> anyhow::Result<()> {
    use clinic_persistence::backends::mongodb::MongoBackend;

    let backend_config = config.backend_config();
    info!(
        database = %backend_config.database_name,
        "Connecting to MongoDB"
    );
    let backend = MongoBackend::connect(backend_config).await?;
    run(backend, directory, config).await
}

/// Fallback when the mongodb feature is not enabled.
#[cfg(not(feature = "mongodb"))]
async fn start_mongodb(_directory: Arc<dyn UserDirectory>, _config: &ServerConfig) -> anyhow::Result<()> {
    anyhow::bail!(
        "The mongodb backend requires the 'mongodb' feature. \
         Build with: cargo build -p clinic-server --features mongodb"
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let backend_kind = config
        .backend_kind()
        .map_err(|e| anyhow::anyhow!("Invalid storage backend configuration: {}", e))?;

    let directory = match &config.user_directory_file {
        Some(path) => StaticUserDirectory::load(path)?,
        None => StaticUserDirectory::empty(),
    };
    info!(
        storage_backend = %backend_kind,
        users = directory.user_count(),
        demo_patient = config.demo_patient_user_id.as_deref().unwrap_or("none"),
        "Starting clinic server"
    );
    let directory: Arc<dyn UserDirectory> = Arc::new(directory);

    match backend_kind {
        BackendKind::Memory => start_memory(directory, &config).await,
        BackendKind::MongoDB => start_mongodb(directory, &config).await,
    }
}
