//! User directory interface.
//!
//! The directory is owned by another service; this crate only consumes it.

use async_trait::async_trait;

use crate::context::OperationContext;
use crate::error::StorageResult;
use crate::types::{Patient, User, UserProfile};

/// Lookup of platform users and their profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the user, or `None` if no such user exists.
    async fn get_user(&self, ctx: &OperationContext, user_id: &str) -> StorageResult<Option<User>>;

    /// Returns the user's profile, or `None` if the user has none.
    async fn get_user_profile(
        &self,
        ctx: &OperationContext,
        user_id: &str,
    ) -> StorageResult<Option<UserProfile>>;

    /// Builds a patient record populated from an existing user's profile.
    async fn get_patient_from_existing_user(
        &self,
        ctx: &OperationContext,
        user_id: &str,
    ) -> StorageResult<Patient>;
}
