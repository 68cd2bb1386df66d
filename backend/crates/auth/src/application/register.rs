//! Registration Use Case
//!
//! Creates a client account and dispatches the verification email. No
//! session is issued until the address is verified.

use std::sync::Arc;

use chrono::{Duration, Utc};
use platform::mail::{MailMessage, Mailer};

use crate::application::config::AuthConfig;
use crate::domain::entity::user::{NewUser, User};
use crate::domain::repository::UserRepository;
use crate::domain::token::OpaqueToken;
use crate::domain::value_object::{
    email::Email,
    user_name::UserName,
    user_password::{RawPassword, UserPassword},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// Registration input
pub struct RegisterInput {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// Registration use case
pub struct RegisterUseCase<R, M>
where
    R: UserRepository,
    M: Mailer,
{
    repo: Arc<R>,
    mailer: Arc<M>,
    config: Arc<AuthConfig>,
}

impl<R, M> RegisterUseCase<R, M>
where
    R: UserRepository,
    M: Mailer + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, mailer: Arc<M>, config: Arc<AuthConfig>) -> Self {
        Self {
            repo,
            mailer,
            config,
        }
    }

    pub async fn execute(&self, input: RegisterInput) -> AuthResult<User> {
        let user_name = UserName::new(input.user_name.as_str())
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        let email = Email::new(input.email)?;
        let raw_password = RawPassword::new(input.password)?;

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

        let password_hash =
            UserPassword::from_raw(&raw_password, self.config.pepper(), self.config.hashing_cost)?;

        let verification = OpaqueToken::generate();
        let expires_at = Utc::now()
            + Duration::seconds(self.config.verification_token_ttl.as_secs() as i64);

        let new_user = NewUser {
            user_name,
            email,
            password_hash: Some(password_hash),
            user_role: UserRole::Client,
            email_verified: false,
            email_verification_token: Some(verification.digest.clone()),
            email_verification_expires_at: Some(expires_at),
        };

        let user = self.repo.create(&new_user).await?;

        self.send_verification_email(&user, verification.raw);

        tracing::info!(
            user_id = %user.user_id,
            user_name = %user.user_name,
            "User registered"
        );

        Ok(user)
    }

    /// Dispatch in the background; the response does not wait on or
    /// reveal the outcome of mail delivery.
    fn send_verification_email(&self, user: &User, token: String) {
        let link = format!(
            "{}/verify-email?token={}",
            self.config.frontend_base_url, token
        );
        let message = MailMessage {
            to: user.email.as_str().to_string(),
            to_name: user.user_name.original().to_string(),
            subject: "Verify your email address".to_string(),
            text_body: format!(
                "Welcome to the client portal.\n\n\
                 Please confirm your email address within 24 hours by following this link:\n\n\
                 {}\n\n\
                 If you did not create this account, you can ignore this message.",
                link
            ),
        };

        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&message).await {
                tracing::warn!(error = %e, "Verification email dispatch failed");
            }
        });
    }
}
