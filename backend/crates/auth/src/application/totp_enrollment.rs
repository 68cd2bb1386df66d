//! TOTP Enrollment Use Case
//!
//! Staged enrollment for an authenticated user: setup stages a secret,
//! confirm proves possession of the authenticator and activates 2FA
//! together with a fresh set of backup codes. Disable and backup-code
//! regeneration also require proving possession.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::entity::user::{User, UserPatch};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{backup_codes, totp_secret::TotpSecret, user_id::UserId};
use crate::error::{AuthError, AuthResult};

/// Provisioning data returned by setup
pub struct TotpEnrollmentOutput {
    /// Base32 secret for manual entry
    pub secret_base32: String,
    /// otpauth:// URL
    pub otpauth_url: String,
    /// QR code as base64-encoded PNG
    pub qr_code_base64: String,
}

/// TOTP enrollment use case
pub struct TotpEnrollmentUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> TotpEnrollmentUseCase<R>
where
    R: UserRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    /// Generate and stage a new secret; 2FA stays off until confirmed
    pub async fn setup(&self, user_id: UserId) -> AuthResult<TotpEnrollmentOutput> {
        let user = self.fetch(user_id).await?;

        if user.two_factor_enabled {
            return Err(AuthError::Conflict(
                "Two-factor authentication is already enabled".to_string(),
            ));
        }

        let secret = TotpSecret::generate();

        let patch = UserPatch {
            two_factor_secret: Some(Some(secret.clone())),
            ..Default::default()
        };
        self.repo
            .update(user.user_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let issuer = &self.config.totp_issuer;
        let account = user.email.as_str();

        let output = TotpEnrollmentOutput {
            secret_base32: secret.as_base32().to_string(),
            otpauth_url: secret.get_otpauth_url(issuer, account)?,
            qr_code_base64: secret.generate_qr_code(issuer, account)?,
        };

        tracing::info!(user_id = %user.user_id, "TOTP enrollment started");

        Ok(output)
    }

    /// Verify a first code from the staged secret and activate 2FA
    ///
    /// Returns the plaintext backup codes; they are shown exactly once.
    pub async fn confirm(&self, user_id: UserId, code: &str) -> AuthResult<Vec<String>> {
        let user = self.fetch(user_id).await?;

        if user.two_factor_enabled {
            return Err(AuthError::Conflict(
                "Two-factor authentication is already enabled".to_string(),
            ));
        }

        let secret = user.two_factor_secret.as_ref().ok_or_else(|| {
            AuthError::Validation("Two-factor setup has not been started".to_string())
        })?;

        let valid = secret.verify(code.trim(), &self.config.totp_issuer, user.email.as_str())?;
        if !valid {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        let codes = backup_codes::generate();

        let patch = UserPatch {
            two_factor_enabled: Some(true),
            two_factor_backup_codes: Some(codes.hashed),
            ..Default::default()
        };
        self.repo
            .update(user.user_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "TOTP enabled");

        Ok(codes.display)
    }

    /// Turn 2FA off after a valid TOTP or backup code
    pub async fn disable(&self, user_id: UserId, code: &str) -> AuthResult<()> {
        let user = self.fetch(user_id).await?;

        if !user.has_two_factor() {
            return Err(AuthError::TwoFactorNotEnabled);
        }

        self.verify_totp_or_backup(&user, code).await?;

        let patch = UserPatch {
            two_factor_enabled: Some(false),
            two_factor_secret: Some(None),
            two_factor_backup_codes: Some(Vec::new()),
            ..Default::default()
        };
        self.repo
            .update(user.user_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "TOTP disabled");

        Ok(())
    }

    /// Replace the backup-code list after a valid TOTP code
    ///
    /// Backup codes themselves cannot authorize regeneration; only a
    /// current authenticator code can.
    pub async fn regenerate_backup_codes(
        &self,
        user_id: UserId,
        code: &str,
    ) -> AuthResult<Vec<String>> {
        let user = self.fetch(user_id).await?;

        if !user.has_two_factor() {
            return Err(AuthError::TwoFactorNotEnabled);
        }

        let secret = user
            .two_factor_secret
            .as_ref()
            .ok_or(AuthError::TwoFactorNotEnabled)?;

        let valid = secret.verify(code.trim(), &self.config.totp_issuer, user.email.as_str())?;
        if !valid {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        let codes = backup_codes::generate();

        let patch = UserPatch {
            two_factor_backup_codes: Some(codes.hashed),
            ..Default::default()
        };
        self.repo
            .update(user.user_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "Backup codes regenerated");

        Ok(codes.display)
    }

    async fn fetch(&self, user_id: UserId) -> AuthResult<User> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Accept a current TOTP code or consume a backup code
    async fn verify_totp_or_backup(&self, user: &User, code: &str) -> AuthResult<()> {
        let code = code.trim();
        let secret = user
            .two_factor_secret
            .as_ref()
            .ok_or(AuthError::TwoFactorNotEnabled)?;

        if secret.verify(code, &self.config.totp_issuer, user.email.as_str())? {
            return Ok(());
        }

        let Some(matched) = backup_codes::find_match(code, &user.two_factor_backup_codes) else {
            return Err(AuthError::InvalidTwoFactorCode);
        };

        if !self.repo.remove_backup_code(user.user_id, &matched).await? {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        Ok(())
    }
}
