//! Database backend implementations.
//!
//! This module contains implementations of the storage traits for the
//! supported stores. Networked backends are gated behind a feature flag.
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (always) | Process-local store for tests and local development |
//! | MongoDB | `mongodb` | Document store; replica set required for transactions |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "mongodb")]
//! use clinic_persistence::backends::mongodb::MongoBackend;
//! # #[cfg(feature = "mongodb")]
//! use clinic_persistence::core::BackendConfig;
//!
//! # #[cfg(feature = "mongodb")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Connect to a replica set
//! let backend = MongoBackend::connect(BackendConfig::new("mongodb://localhost:27017")).await?;
//!
//! // Or use the in-memory store
//! let backend = clinic_persistence::backends::memory::MemoryBackend::new();
//! # Ok(())
//! # }
//! ```

pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongodb;
