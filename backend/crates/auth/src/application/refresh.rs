//! Refresh Use Case
//!
//! Rotates the token pair behind a valid refresh cookie. Authorization
//! is re-derived from the store on every refresh so role changes and
//! deactivations take effect without waiting out the refresh lifetime.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::session::{SessionBundle, issue_session};
use crate::domain::repository::UserRepository;
use crate::domain::token::TokenIssuer;
use crate::domain::value_object::user_id::UserId;
use crate::error::{AuthError, AuthResult};

/// Refresh use case
pub struct RefreshUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    tokens: TokenIssuer,
}

impl<R> RefreshUseCase<R>
where
    R: UserRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        let tokens = config.token_issuer();
        Self { repo, tokens }
    }

    pub async fn execute(&self, refresh_token: &str) -> AuthResult<SessionBundle> {
        // Expired and malformed tokens get the same canonical response
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .repo
            .find_by_id(UserId::from_i64(claims.user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        tracing::debug!(user_id = %user.user_id, "Session refreshed");

        issue_session(&self.tokens, user)
    }
}
