//! Patient statistics summaries.
//!
//! A summary holds one user's glucose statistics for one device class
//! ([`CgmPeriod`] or [`BgmPeriod`]) together with per-clinic projections of
//! the patient. Clinic dashboards list summaries filtered by clinic, search
//! text, upload date and statistic thresholds.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clinic_persistence::OperationContext;
//! use clinic_persistence::backends::memory::MemoryBackend;
//! use clinic_persistence::summary::{CgmPeriod, Filter, SummaryRepository};
//! use clinic_persistence::types::{Pagination, Sort};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(MemoryBackend::new());
//! let summaries = SummaryRepository::<CgmPeriod>::new(backend);
//!
//! let page = summaries
//!     .list(
//!         &OperationContext::new(),
//!         &Filter::for_clinic("clinic-1").with_search("smith"),
//!         Pagination::new(0, 25),
//!         &[Sort::parse("-dates.lastUploadDate")],
//!     )
//!     .await?;
//! println!("{} of {}", page.len(), page.total);
//! # Ok(())
//! # }
//! ```

mod filter;
mod model;
mod period;
pub mod query;
mod repository;
mod store;

pub use filter::{Comparator, Filter, StatField, Threshold, is_zero_instant};
pub use model::{EmbeddedPatient, Summary, SummaryConfig, SummaryDates};
pub use period::{AverageGlucose, BgmPeriod, CgmPeriod, Period, SummaryType};
pub use query::{Clause, SortKey, SummaryQuery};
pub use repository::SummaryRepository;
pub use store::{SUMMARY_COLLECTION, SummaryKey, SummaryStore, UpsertOutcome, summary_indexes};
