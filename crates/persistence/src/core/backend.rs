//! Backend abstraction for database drivers.
//!
//! Each backend implements [`Backend`] for lifecycle concerns (health checks
//! and startup index provisioning) together with the storage traits in this
//! module: [`TransactionProvider`](super::TransactionProvider),
//! [`IndexProvisioner`](super::IndexProvisioner), and the summary and deletion
//! stores.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Identifies the type of database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process store, used for tests and local development.
    Memory,
    /// MongoDB (document store, replica set required for transactions).
    MongoDB,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::MongoDB => write!(f, "mongodb"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "mongodb" | "mongo" => Ok(BackendKind::MongoDB),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Connection settings shared by networked backends.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Connection string (e.g. `mongodb://localhost:27017/?replicaSet=rs0`).
    pub connection_string: String,
    /// Database name.
    pub database_name: String,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            connection_string: "mongodb://127.0.0.1:27017".to_string(),
            database_name: "clinic".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

impl BackendConfig {
    /// Creates a new configuration with the given connection string.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Sets the database name.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Sets the connection timeout.
    pub fn with_connect_timeout_ms(mut self, timeout: u64) -> Self {
        self.connect_timeout_ms = timeout;
        self
    }
}

/// Lifecycle operations of a storage backend.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Verifies the backend is reachable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Provisions the indexes of the clinic, clinician and patient
    /// collections. Safe to call repeatedly.
    async fn initialize(&self) -> StorageResult<()>;
}
