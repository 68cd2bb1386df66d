//! Admin User Management Use Case
//!
//! Listing, provisioning and account administration. Every operation
//! here sits behind the admin-role middleware; the only self-targeting
//! rule enforced at this layer is that administrators cannot deactivate
//! their own account.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::entity::user::{NewUser, User, UserPatch};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email,
    user_id::UserId,
    user_name::UserName,
    user_password::{RawPassword, UserPassword},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// Provisioning input
///
/// Password is optional: without one the hash stays NULL and the owner
/// sets a password through the reset flow. The email counts as verified
/// because an administrator vouched for it.
pub struct ProvisionUserInput {
    pub user_name: String,
    pub email: String,
    pub password: Option<String>,
    pub user_role: UserRole,
}

/// One page of the user listing
///
/// Carries the effective page/per-page values after clamping so the
/// response reflects what was actually queried.
pub struct UserListPage {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Admin user management use case
pub struct AdminUserUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> AdminUserUseCase<R>
where
    R: UserRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    /// Paginated listing, newest first
    pub async fn list(&self, page: i64, per_page: i64) -> AuthResult<UserListPage> {
        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);
        let offset = (page - 1) * per_page;

        let users = self.repo.list(offset, per_page).await?;
        let total = self.repo.count().await?;

        Ok(UserListPage {
            users,
            total,
            page,
            per_page,
        })
    }

    /// Create an account on a client's behalf
    pub async fn provision(&self, input: ProvisionUserInput) -> AuthResult<User> {
        let user_name = UserName::new(input.user_name.as_str())
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        let email = Email::new(input.email)?;

        if self.repo.exists_by_email(&email).await? {
            return Err(AuthError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        if self.repo.exists_by_user_name(&user_name).await? {
            return Err(AuthError::Conflict(
                "This username is already taken".to_string(),
            ));
        }

        let password_hash = match input.password {
            Some(password) => {
                let raw = RawPassword::new(password)?;
                Some(UserPassword::from_raw(
                    &raw,
                    self.config.pepper(),
                    self.config.hashing_cost,
                )?)
            }
            None => None,
        };

        let new_user = NewUser {
            user_name,
            email,
            password_hash,
            user_role: input.user_role,
            email_verified: true,
            email_verification_token: None,
            email_verification_expires_at: None,
        };

        let user = self.repo.create(&new_user).await?;

        tracing::info!(
            user_id = %user.user_id,
            role = %user.user_role,
            "User provisioned"
        );

        Ok(user)
    }

    /// Change a user's role
    pub async fn change_role(&self, target_id: UserId, role: UserRole) -> AuthResult<User> {
        let patch = UserPatch {
            user_role: Some(role),
            ..Default::default()
        };
        let user = self
            .repo
            .update(target_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, role = %user.user_role, "User role changed");

        Ok(user)
    }

    /// Deactivate an account (soft delete)
    pub async fn deactivate(&self, acting_admin: UserId, target_id: UserId) -> AuthResult<User> {
        if acting_admin == target_id {
            return Err(AuthError::Validation(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let patch = UserPatch {
            is_active: Some(false),
            ..Default::default()
        };
        let user = self
            .repo
            .update(target_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "User deactivated");

        Ok(user)
    }

    /// Reactivate a previously deactivated account
    pub async fn reactivate(&self, target_id: UserId) -> AuthResult<User> {
        let patch = UserPatch {
            is_active: Some(true),
            ..Default::default()
        };
        let user = self
            .repo
            .update(target_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "User reactivated");

        Ok(user)
    }
}
