//! Transactional services built on the storage traits.
//!
//! [`ClinicServices`] wires every service to one backend and provisions the
//! indexes they rely on. Construct it once at startup, call
//! [`ClinicServices::initialize`], then share it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clinic_persistence::OperationContext;
//! use clinic_persistence::backends::memory::MemoryBackend;
//! use clinic_persistence::core::UserDirectory;
//! use clinic_persistence::services::{ClinicManagerConfig, ClinicServices, CreateClinic};
//! use clinic_persistence::sharecode::RandomShareCodeGenerator;
//! use clinic_persistence::types::Clinic;
//!
//! # async fn example(directory: Arc<dyn UserDirectory>) -> Result<(), Box<dyn std::error::Error>> {
//! let services = ClinicServices::new(
//!     Arc::new(MemoryBackend::new()),
//!     directory,
//!     Arc::new(RandomShareCodeGenerator::new()),
//!     ClinicManagerConfig::default(),
//! );
//! let ctx = OperationContext::new();
//! services.initialize(&ctx).await?;
//!
//! let clinic = services
//!     .clinics()
//!     .create_clinic(&ctx, CreateClinic::new(Clinic::new("Riverside"), "user-1"))
//!     .await?;
//! println!("share code {:?}", clinic.canonical_share_code);
//! # Ok(())
//! # }
//! ```

mod clinic_manager;
mod role_sync;

pub use clinic_manager::{
    ClinicManager, ClinicManagerConfig, CreateClinic, SHARE_CODE_RETRY_ATTEMPTS,
    clinic_deletion_log, clinician_deletion_log, patient_deletion_log,
};
pub use role_sync::ClinicianRoleSync;

use std::sync::Arc;

use tracing::info;

use crate::context::OperationContext;
use crate::core::{Backend, DeletionStore, TransactionProvider, UserDirectory};
use crate::error::StorageResult;
use crate::sharecode::ShareCodeGenerator;
use crate::summary::{BgmPeriod, CgmPeriod, SummaryRepository, SummaryStore};

/// Every service of the crate, bound to one backend.
pub struct ClinicServices<B> {
    backend: Arc<B>,
    role_sync: ClinicianRoleSync<B>,
    clinics: ClinicManager<B>,
    cgm_summaries: SummaryRepository<CgmPeriod>,
    bgm_summaries: SummaryRepository<BgmPeriod>,
}

impl<B: Backend> std::fmt::Debug for ClinicServices<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicServices")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl<B> ClinicServices<B>
where
    B: Backend + TransactionProvider + SummaryStore + DeletionStore + 'static,
{
    /// Builds the services over `backend`.
    pub fn new(
        backend: Arc<B>,
        directory: Arc<dyn UserDirectory>,
        share_codes: Arc<dyn ShareCodeGenerator>,
        config: ClinicManagerConfig,
    ) -> Self {
        let summaries: Arc<dyn SummaryStore> = backend.clone();
        let deletions: Arc<dyn DeletionStore> = backend.clone();

        Self {
            role_sync: ClinicianRoleSync::new(Arc::clone(&backend)),
            clinics: ClinicManager::new(
                Arc::clone(&backend),
                deletions,
                directory,
                share_codes,
                config,
            ),
            cgm_summaries: SummaryRepository::new(Arc::clone(&summaries)),
            bgm_summaries: SummaryRepository::new(summaries),
            backend,
        }
    }

    /// Provisions every collection's indexes. Safe to call repeatedly.
    pub async fn initialize(&self, ctx: &OperationContext) -> StorageResult<()> {
        self.backend.initialize().await?;
        // Both summary types share one collection.
        self.cgm_summaries.initialize(ctx).await?;
        self.clinics.initialize(ctx).await?;
        info!(backend = self.backend.name(), "Clinic services initialized");
        Ok(())
    }

    /// The backend the services run on.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Clinician updates with admin mirroring.
    pub fn role_sync(&self) -> &ClinicianRoleSync<B> {
        &self.role_sync
    }

    /// Clinic creation and deletion.
    pub fn clinics(&self) -> &ClinicManager<B> {
        &self.clinics
    }

    /// CGM summaries.
    pub fn cgm_summaries(&self) -> &SummaryRepository<CgmPeriod> {
        &self.cgm_summaries
    }

    /// BGM summaries.
    pub fn bgm_summaries(&self) -> &SummaryRepository<BgmPeriod> {
        &self.bgm_summaries
    }
}
