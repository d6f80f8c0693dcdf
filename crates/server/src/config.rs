//! Server configuration.
//!
//! Every setting can be given on the command line or through the environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CLINIC_STORAGE_BACKEND` | memory | `memory` or `mongodb` |
//! | `CLINIC_DATABASE_URL` | mongodb://127.0.0.1:27017 | Connection string |
//! | `CLINIC_DATABASE_NAME` | clinic | Database name |
//! | `CLINIC_CONNECT_TIMEOUT_MS` | 5000 | Connection timeout (ms) |
//! | `CLINIC_LOG_LEVEL` | info | Log level |
//! | `CLINIC_DEMO_PATIENT_USER_ID` | (none) | User copied into new clinics as demo patient |
//! | `CLINIC_USER_DIRECTORY_FILE` | (none) | JSON file with the users the service knows |
//! | `CLINIC_STARTUP_TIMEOUT` | 30 | Startup deadline (seconds) |

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clinic_persistence::BackendKind;
use clinic_persistence::core::BackendConfig;
use clinic_persistence::services::ClinicManagerConfig;

/// Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "clinic-server")]
#[command(about = "Clinic management persistence service")]
pub struct ServerConfig {
    /// Storage backend (memory, mongodb).
    #[arg(long, env = "CLINIC_STORAGE_BACKEND", default_value = "memory")]
    pub storage_backend: String,

    /// Database connection string.
    #[arg(
        long,
        env = "CLINIC_DATABASE_URL",
        default_value = "mongodb://127.0.0.1:27017"
    )]
    pub database_url: String,

    /// Database name.
    #[arg(long, env = "CLINIC_DATABASE_NAME", default_value = "clinic")]
    pub database_name: String,

    /// Connection timeout in milliseconds.
    #[arg(long, env = "CLINIC_CONNECT_TIMEOUT_MS", default_value = "5000")]
    pub connect_timeout_ms: u64,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "CLINIC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// User whose data is copied into new clinics as a demo patient.
    #[arg(long, env = "CLINIC_DEMO_PATIENT_USER_ID")]
    pub demo_patient_user_id: Option<String>,

    /// JSON file listing the users, profiles and patient records known to
    /// the service.
    #[arg(long, env = "CLINIC_USER_DIRECTORY_FILE")]
    pub user_directory_file: Option<PathBuf>,

    /// Deadline for connecting and provisioning indexes, in seconds.
    #[arg(long, env = "CLINIC_STARTUP_TIMEOUT", default_value = "30")]
    pub startup_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            storage_backend: "memory".to_string(),
            database_url: "mongodb://127.0.0.1:27017".to_string(),
            database_name: "clinic".to_string(),
            connect_timeout_ms: 5000,
            log_level: "info".to_string(),
            demo_patient_user_id: None,
            user_directory_file: None,
            startup_timeout: 30,
        }
    }
}

impl ServerConfig {
    /// Parses the configured storage backend.
    pub fn backend_kind(&self) -> Result<BackendKind, String> {
        self.storage_backend.parse()
    }

    /// Connection settings for networked backends.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::new(&self.database_url)
            .with_database_name(&self.database_name)
            .with_connect_timeout_ms(self.connect_timeout_ms)
    }

    /// Settings of the clinic manager.
    pub fn clinic_manager_config(&self) -> ClinicManagerConfig {
        match &self.demo_patient_user_id {
            Some(user_id) => ClinicManagerConfig::default().with_demo_patient_user_id(user_id),
            None => ClinicManagerConfig::default(),
        }
    }

    /// Startup deadline.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.backend_kind() {
            errors.push(e);
        }

        if self.database_name.trim().is_empty() {
            errors.push("Database name cannot be empty".to_string());
        }

        if self.connect_timeout_ms == 0 {
            errors.push("Connect timeout cannot be 0".to_string());
        }

        if self.startup_timeout == 0 {
            errors.push("Startup timeout cannot be 0".to_string());
        }

        if let Some(path) = &self.user_directory_file {
            if !path.is_file() {
                errors.push(format!(
                    "User directory file not found: {}",
                    path.display()
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
