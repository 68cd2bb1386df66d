//! API DTOs (Data Transfer Objects)

use serde::{Deserialize, Serialize};

use crate::domain::entity::user::User;

// ============================================================================
// User
// ============================================================================

/// Sanitized user representation
///
/// The only user shape handlers return. Password hashes, TOTP secrets,
/// backup codes and token digests never leave the backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub user_name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    pub last_login_at: Option<i64>,
    pub created_at: i64,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id.value(),
            user_name: user.user_name.original().to_string(),
            email: user.email.as_str().to_string(),
            role: user.user_role.code().to_string(),
            is_active: user.is_active,
            email_verified: user.email_verified,
            two_factor_enabled: user.two_factor_enabled,
            last_login_at: user.last_login_at.map(|t| t.timestamp_millis()),
            created_at: user.created_at.timestamp_millis(),
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Registration request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// Registration response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

// ============================================================================
// Login
// ============================================================================

/// Login request
///
/// Exactly one of `email` / `username` must be present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

/// Login response
///
/// Two shapes behind one struct: full success carries `user` +
/// `accessToken`, a pending-2FA result carries `tempToken` + `userId`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(rename = "requires2FA")]
    pub requires_2fa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

// ============================================================================
// Two-Factor Verification
// ============================================================================

/// 2FA verification request (second step of login)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorVerifyRequest {
    pub user_id: i64,
    pub code: String,
    #[serde(default)]
    pub is_backup_code: bool,
}

/// Shared response for flows that end in token issuance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserResponse,
    pub access_token: String,
}

// ============================================================================
// Refresh
// ============================================================================

/// Refresh response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

// ============================================================================
// Password Reset
// ============================================================================

/// Password reset request (request phase)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Password reset confirmation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

// ============================================================================
// Email Verification
// ============================================================================

/// Email verification request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Verification resend request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    pub email: String,
}

// ============================================================================
// TOTP Enrollment
// ============================================================================

/// TOTP setup response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpSetupResponse {
    /// Secret for manual entry
    pub secret: String,
    /// otpauth:// URL
    pub otpauth_url: String,
    /// QR code as base64-encoded PNG
    pub qr_code: String,
}

/// TOTP confirmation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpConfirmRequest {
    pub code: String,
}

/// TOTP disable request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpDisableRequest {
    /// Current TOTP or backup code to confirm disable
    pub code: String,
}

/// Backup code regeneration request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateBackupCodesRequest {
    /// Current TOTP code; backup codes cannot authorize this
    pub code: String,
}

/// Backup codes, shown exactly once
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
}

// ============================================================================
// Admin User Management
// ============================================================================

/// User listing query parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// User listing response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Account provisioning request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionUserRequest {
    pub user_name: String,
    pub email: String,
    /// Omitted for accounts whose owner will set a password through the
    /// reset flow
    pub password: Option<String>,
    /// "client" when omitted
    pub role: Option<String>,
}

/// Role change request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleRequest {
    pub role: String,
}

// ============================================================================
// Generic
// ============================================================================

/// Response carrying only a human-readable message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}
