//! Auth Middleware
//!
//! Middleware for requiring a valid access token on protected routes.
//! Verification is stateless: the token's embedded claims are trusted
//! for its short lifetime, so no store round-trip happens here.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::token::{PENDING_2FA_ROLE, TokenError};
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthError;

/// Middleware state
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub config: Arc<AuthConfig>,
}

/// Authenticated caller, stored in request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Middleware that requires a full-privilege access token
///
/// A token carrying the pending-2FA sentinel role is rejected like any
/// other invalid token: it only exists to correlate the follow-up 2FA
/// verification call and must not open any other endpoint.
pub async fn require_auth(
    state: AuthMiddlewareState,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = match bearer_token(req.headers()) {
        Some(token) => token,
        None => return Err(unauthorized(AuthError::InvalidAccessToken)),
    };

    let issuer = state.config.token_issuer();

    let claims = match issuer.verify_access(&token) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => return Err(unauthorized(AuthError::TokenExpired)),
        Err(_) => return Err(unauthorized(AuthError::InvalidAccessToken)),
    };

    if claims.role == PENDING_2FA_ROLE {
        return Err(unauthorized(AuthError::InvalidAccessToken));
    }

    let Some(role) = UserRole::from_code(&claims.role) else {
        return Err(unauthorized(AuthError::InvalidAccessToken));
    };

    req.extensions_mut().insert(CurrentUser {
        user_id: claims.user_id,
        email: claims.email,
        role,
    });

    Ok(next.run(req).await)
}

/// Middleware that requires the admin role
///
/// Must be layered inside [`require_auth`]; it reads the caller that
/// middleware stored.
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, Response> {
    let is_admin = req
        .extensions()
        .get::<CurrentUser>()
        .map(CurrentUser::is_admin)
        .unwrap_or(false);

    if !is_admin {
        return Err(AuthError::Forbidden.into_response());
    }

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

/// 401 with the marker header the frontend watches to trigger a refresh
fn unauthorized(error: AuthError) -> Response {
    let mut response = error.into_response();
    response
        .headers_mut()
        .insert("X-Auth-Required", HeaderValue::from_static("true"));
    response
}
