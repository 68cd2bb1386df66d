//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entity::user::{NewUser, User, UserPatch};
use crate::domain::value_object::{email::Email, user_id::UserId, user_name::UserName};
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Create a new user and return the stored row
    async fn create(&self, user: &NewUser) -> AuthResult<User>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;

    /// Find user by email
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// Find user by user name (canonical form)
    async fn find_by_user_name(&self, user_name: &UserName) -> AuthResult<Option<User>>;

    /// Find user holding this password reset token digest
    async fn find_by_reset_token(&self, token_digest: &str) -> AuthResult<Option<User>>;

    /// Find user holding this email verification token digest
    async fn find_by_verification_token(&self, token_digest: &str) -> AuthResult<Option<User>>;

    /// Apply a partial update. Returns the updated row, or `None` if the user is gone.
    async fn update(&self, user_id: UserId, patch: &UserPatch) -> AuthResult<Option<User>>;

    /// Remove one stored backup code entry. Returns `false` when the entry was
    /// already consumed by a concurrent attempt.
    async fn remove_backup_code(&self, user_id: UserId, stored_entry: &str) -> AuthResult<bool>;

    /// Check if email exists
    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool>;

    /// Check if user name exists
    async fn exists_by_user_name(&self, user_name: &UserName) -> AuthResult<bool>;

    /// List users ordered by creation time, newest first
    async fn list(&self, offset: i64, limit: i64) -> AuthResult<Vec<User>>;

    /// Total number of users
    async fn count(&self) -> AuthResult<i64>;
}
