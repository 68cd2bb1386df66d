//! User Entity
//!
//! The single account record for the portal. Identity, credential
//! state, 2FA material, and the verification/reset token pairs all
//! live here; the credential store owns persistence.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{
    email::Email, totp_secret::TotpSecret, user_id::UserId, user_name::UserName,
    user_password::UserPassword, user_role::UserRole,
};

/// User entity
///
/// # Invariants
/// - `two_factor_enabled` implies `two_factor_secret` is present
/// - a consumed reset/verification token is nulled together with its
///   expiry in the same update
/// - accounts are soft-deleted via `is_active`, never hard-deleted
#[derive(Debug, Clone)]
pub struct User {
    /// Store-assigned numeric identifier
    pub user_id: UserId,
    /// User name (unique, usable for login)
    pub user_name: UserName,
    /// Email (unique, usable for login)
    pub email: Email,
    /// Role (Client, Admin)
    pub user_role: UserRole,
    /// Argon2id hash; absent only for admin-provisioned accounts that
    /// have not set a password yet
    pub password_hash: Option<UserPassword>,
    /// Soft-delete flag
    pub is_active: bool,
    /// Whether the emailed verification link was followed
    pub email_verified: bool,
    /// Whether TOTP 2FA is active
    pub two_factor_enabled: bool,
    /// Base32 TOTP secret, present iff 2FA is enabled or mid-enrollment
    pub two_factor_secret: Option<TotpSecret>,
    /// Hashed single-use backup codes
    pub two_factor_backup_codes: Vec<String>,
    /// Digest of the outstanding email-verification token
    pub email_verification_token: Option<String>,
    pub email_verification_expires_at: Option<DateTime<Utc>>,
    /// Digest of the outstanding password-reset token
    pub password_reset_token: Option<String>,
    pub password_reset_expires_at: Option<DateTime<Utc>>,
    /// Last successful login time
    pub last_login_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check whether a 2FA challenge must follow a password check
    pub fn has_two_factor(&self) -> bool {
        self.two_factor_enabled && self.two_factor_secret.is_some()
    }

    /// Check whether the outstanding reset token is past its expiry
    ///
    /// A missing expiry counts as expired; tokens are only usable while
    /// both halves of the pair are present.
    pub fn reset_token_expired(&self, now: DateTime<Utc>) -> bool {
        match self.password_reset_expires_at {
            Some(expires_at) => now > expires_at,
            None => true,
        }
    }

    /// Check whether the outstanding verification token is past its expiry
    pub fn verification_token_expired(&self, now: DateTime<Utc>) -> bool {
        match self.email_verification_expires_at {
            Some(expires_at) => now > expires_at,
            None => true,
        }
    }
}

/// Fields for inserting a new user
///
/// The store assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: UserName,
    pub email: Email,
    pub password_hash: Option<UserPassword>,
    pub user_role: UserRole,
    pub email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_verification_expires_at: Option<DateTime<Utc>>,
}

/// Partial update with patch semantics
///
/// `None` leaves a column untouched. Nullable columns use a nested
/// Option: `Some(None)` writes NULL, `Some(Some(v))` writes a value.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub user_name: Option<UserName>,
    pub email: Option<Email>,
    pub user_role: Option<UserRole>,
    pub password_hash: Option<UserPassword>,
    pub is_active: Option<bool>,
    pub email_verified: Option<bool>,
    pub two_factor_enabled: Option<bool>,
    pub two_factor_secret: Option<Option<TotpSecret>>,
    pub two_factor_backup_codes: Option<Vec<String>>,
    pub email_verification_token: Option<Option<String>>,
    pub email_verification_expires_at: Option<Option<DateTime<Utc>>>,
    pub password_reset_token: Option<Option<String>>,
    pub password_reset_expires_at: Option<Option<DateTime<Utc>>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserPatch {
    /// Patch that records a successful login
    pub fn record_login(now: DateTime<Utc>) -> Self {
        Self {
            last_login_at: Some(now),
            ..Default::default()
        }
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.user_name.is_none()
            && self.email.is_none()
            && self.user_role.is_none()
            && self.password_hash.is_none()
            && self.is_active.is_none()
            && self.email_verified.is_none()
            && self.two_factor_enabled.is_none()
            && self.two_factor_secret.is_none()
            && self.two_factor_backup_codes.is_none()
            && self.email_verification_token.is_none()
            && self.email_verification_expires_at.is_none()
            && self.password_reset_token.is_none()
            && self.password_reset_expires_at.is_none()
            && self.last_login_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            user_id: UserId::from_i64(1),
            user_name: UserName::new("mwhitfield").unwrap(),
            email: Email::new("m.whitfield@example.com").unwrap(),
            user_role: UserRole::Client,
            password_hash: None,
            is_active: true,
            email_verified: true,
            two_factor_enabled: false,
            two_factor_secret: None,
            two_factor_backup_codes: Vec::new(),
            email_verification_token: None,
            email_verification_expires_at: None,
            password_reset_token: None,
            password_reset_expires_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_has_two_factor_requires_secret() {
        let mut user = sample_user();
        assert!(!user.has_two_factor());

        // Flag without secret does not count
        user.two_factor_enabled = true;
        assert!(!user.has_two_factor());

        user.two_factor_secret = Some(TotpSecret::generate());
        assert!(user.has_two_factor());
    }

    #[test]
    fn test_reset_token_expiry() {
        let now = Utc::now();
        let mut user = sample_user();

        // No expiry stored: counts as expired
        assert!(user.reset_token_expired(now));

        user.password_reset_expires_at = Some(now + Duration::hours(1));
        assert!(!user.reset_token_expired(now));

        user.password_reset_expires_at = Some(now - Duration::seconds(1));
        assert!(user.reset_token_expired(now));
    }

    #[test]
    fn test_verification_token_expiry() {
        let now = Utc::now();
        let mut user = sample_user();

        assert!(user.verification_token_expired(now));

        user.email_verification_expires_at = Some(now + Duration::hours(24));
        assert!(!user.verification_token_expired(now));
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(UserPatch::default().is_empty());
        assert!(!UserPatch::record_login(Utc::now()).is_empty());
    }
}
