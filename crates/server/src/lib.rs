//! Clinic service host.
//!
//! Reads [`ServerConfig`], installs logging, connects the configured storage
//! backend and builds [`ClinicServices`](clinic_persistence::ClinicServices)
//! over it.

pub mod config;
pub mod directory;

pub use config::ServerConfig;
pub use directory::StaticUserDirectory;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "clinic_server={},clinic_persistence={}",
            level, level
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
