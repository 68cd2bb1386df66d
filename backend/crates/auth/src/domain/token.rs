//! Access and Refresh Token Issuance
//!
//! Stateless session tokens. Access tokens are short-lived and carry
//! the user's identity claims; refresh tokens are long-lived, travel
//! only in an HTTP-only cookie, and are accepted solely by the refresh
//! operation. The two kinds are signed with distinct secrets so a
//! compromise or rotation of one never invalidates the other, and the
//! refresh payload carries an explicit marker flag so a same-shaped
//! payload can never pass as the other kind.

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind as JwtErrorKind,
};
use kernel::error::app_error::{AppError, AppResult};
use platform::crypto::{random_bytes, sha256, to_base64, to_base64_url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value_object::user_role::UserRole;

/// Role value carried between a successful password check and the 2FA
/// challenge. Tokens bearing it are only valid for the 2FA verify
/// operation; the auth middleware rejects them everywhere else.
pub const PENDING_2FA_ROLE: &str = "2fa-pending";

/// Token verification failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

/// One-shot emailed token for password reset and email verification
///
/// The raw form goes out by email; only the digest is persisted, so a
/// database leak does not yield usable tokens. Lookups hash the
/// submitted raw form and match on the digest column.
#[derive(Debug, Clone)]
pub struct OpaqueToken {
    pub raw: String,
    pub digest: String,
}

impl OpaqueToken {
    /// Generate a fresh token from 32 random bytes
    pub fn generate() -> Self {
        let raw = to_base64_url(&random_bytes(32));
        let digest = Self::digest_of(&raw);
        Self { raw, digest }
    }

    /// Digest of a submitted raw token, for store lookups
    pub fn digest_of(raw: &str) -> String {
        to_base64(&sha256(raw.as_bytes()))
    }
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: i64,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token
///
/// `is_refresh_token` defaults to false on deserialization so a token
/// minted without the marker is rejected by [`TokenIssuer::verify_refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub user_id: i64,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub is_refresh_token: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and validates access/refresh token pairs
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Refresh token lifetime, used for the cookie Max-Age
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    /// Issue a full-privilege access token
    pub fn issue_access(&self, user_id: i64, email: &str, role: UserRole) -> AppResult<String> {
        self.issue_access_at(user_id, email, role.code(), Utc::now().timestamp())
    }

    /// Issue a transitional token for an open 2FA challenge
    ///
    /// Same shape as an access token but tagged with [`PENDING_2FA_ROLE`]
    /// instead of a real role. Correlates the pending state to the
    /// follow-up verification call without server-side session storage.
    pub fn issue_pending_2fa(&self, user_id: i64, email: &str) -> AppResult<String> {
        self.issue_access_at(user_id, email, PENDING_2FA_ROLE, Utc::now().timestamp())
    }

    /// Issue a refresh token
    pub fn issue_refresh(&self, user_id: i64, email: &str, role: UserRole) -> AppResult<String> {
        let iat = Utc::now().timestamp();
        let claims = RefreshClaims {
            user_id,
            email: email.to_string(),
            role: role.code().to_string(),
            is_refresh_token: true,
            iat,
            exp: iat + self.refresh_ttl_secs,
        };

        encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| AppError::internal(format!("Failed to sign refresh token: {}", e)))
    }

    /// Verify an access token and return its claims
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<AccessClaims>(token, &self.access_decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Verify a refresh token and return its claims
    ///
    /// Beyond signature and expiry, the marker flag must be present and
    /// true. An access token presented here fails the signature check
    /// already (different secret), but the flag also rejects any
    /// same-secret payload that merely looks alike.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);

        let claims = decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        if !claims.is_refresh_token {
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }

    fn issue_access_at(
        &self,
        user_id: i64,
        email: &str,
        role_code: &str,
        iat: i64,
    ) -> AppResult<String> {
        let claims = AccessClaims {
            user_id,
            email: email.to_string(),
            role: role_code.to_string(),
            iat,
            exp: iat + self.access_ttl_secs,
        };

        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| AppError::internal(format!("Failed to sign access token: {}", e)))
    }

    /// Issue an access token with a past issued-at (for expiry tests)
    #[cfg(test)]
    pub fn issue_access_with_iat(
        &self,
        user_id: i64,
        email: &str,
        role: UserRole,
        iat: i64,
    ) -> AppResult<String> {
        self.issue_access_at(user_id, email, role.code(), iat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abc";
    const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789ab";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(ACCESS_SECRET, REFRESH_SECRET, 900, 604800)
    }

    #[test]
    fn test_access_roundtrip() {
        let issuer = issuer();
        let token = issuer
            .issue_access(42, "client@example.com", UserRole::Client)
            .unwrap();

        let claims = issuer.verify_access(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.email, "client@example.com");
        assert_eq!(claims.role, "client");
    }

    #[test]
    fn test_refresh_roundtrip() {
        let issuer = issuer();
        let token = issuer
            .issue_refresh(42, "client@example.com", UserRole::Admin)
            .unwrap();

        let claims = issuer.verify_refresh(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, "admin");
        assert!(claims.is_refresh_token);
    }

    #[test]
    fn test_expired_access_token() {
        let issuer = issuer();

        // Issued two hours ago with a 15 minute lifetime, well past the
        // verifier's clock leeway
        let iat = Utc::now().timestamp() - 7200;
        let token = issuer
            .issue_access_with_iat(1, "client@example.com", UserRole::Client, iat)
            .unwrap();

        assert_eq!(issuer.verify_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_access_token_rejected_by_refresh_verifier() {
        let issuer = issuer();
        let token = issuer
            .issue_access(1, "client@example.com", UserRole::Client)
            .unwrap();

        assert_eq!(issuer.verify_refresh(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_refresh_token_rejected_by_access_verifier() {
        let issuer = issuer();
        let token = issuer
            .issue_refresh(1, "client@example.com", UserRole::Client)
            .unwrap();

        assert_eq!(issuer.verify_access(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_refresh_flag_required_even_with_right_secret() {
        let issuer = issuer();

        // Mint a refresh-keyed token whose payload lacks the marker flag
        let iat = Utc::now().timestamp();
        let claims = AccessClaims {
            user_id: 1,
            email: "client@example.com".to_string(),
            role: "client".to_string(),
            iat,
            exp: iat + 900,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(REFRESH_SECRET),
        )
        .unwrap();

        assert_eq!(issuer.verify_refresh(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_garbage_token_invalid() {
        let issuer = issuer();
        assert_eq!(
            issuer.verify_access("not.a.token"),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            issuer.verify_refresh("not.a.token"),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_pending_role_claims() {
        let issuer = issuer();
        let token = issuer.issue_pending_2fa(9, "client@example.com").unwrap();

        let claims = issuer.verify_access(&token).unwrap();
        assert_eq!(claims.role, PENDING_2FA_ROLE);
    }

    #[test]
    fn test_tampered_token_invalid() {
        let issuer = issuer();
        let token = issuer
            .issue_access(1, "client@example.com", UserRole::Client)
            .unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        assert_eq!(issuer.verify_access(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn test_opaque_token_digest_lookup() {
        let token = OpaqueToken::generate();
        assert_ne!(token.raw, token.digest);
        assert_eq!(OpaqueToken::digest_of(&token.raw), token.digest);

        let other = OpaqueToken::generate();
        assert_ne!(token.digest, other.digest);
    }
}
