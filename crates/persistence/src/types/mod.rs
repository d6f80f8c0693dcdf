//! Core types for the persistence layer.
//!
//! This module provides the documents and value types shared by every
//! repository and backend:
//!
//! - [`Clinic`], [`Clinician`], [`Patient`] - Stored documents
//! - [`User`], [`UserProfile`] - Records returned by the user directory
//! - [`Pagination`], [`Sort`], [`Page`] - List windows and results
//! - [`IndexSpec`] - Declared indexes
//!
//! # Examples
//!
//! ```
//! use clinic_persistence::types::{Clinic, Clinician, ROLE_CLINIC_ADMIN};
//!
//! let mut clinic = Clinic::new("Riverside Endocrinology");
//! clinic.add_admin("user-1");
//!
//! let clinician = Clinician::new("clinic-1", "user-1").with_roles([ROLE_CLINIC_ADMIN]);
//! assert!(clinician.is_admin());
//! assert!(clinic.is_admin("user-1"));
//! ```

mod clinic;
mod clinician;
mod index;
mod pagination;
mod patient;
pub mod timestamp;
mod user;

pub use clinic::{Clinic, ClinicFilter, PhoneNumber};
pub use clinician::{Clinician, ROLE_CLINIC_ADMIN, ROLE_CLINIC_MEMBER};
pub use index::{
    IndexOrder, IndexSpec, clinic_indexes, clinician_indexes, patient_indexes,
};
pub use pagination::{DEFAULT_LIMIT, Page, Pagination, Sort, SortDirection};
pub use patient::{Patient, PatientPermissions};
pub use user::{User, UserProfile};
