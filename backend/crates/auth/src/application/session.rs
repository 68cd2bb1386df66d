//! Session Issuance
//!
//! Shared terminal step of the login, 2FA-verify and email-verification
//! flows: mint the access + refresh pair for a fully authenticated user.
//! Neither token is persisted; session state lives entirely in the
//! refresh cookie.

use crate::domain::entity::user::User;
use crate::domain::token::TokenIssuer;
use crate::error::AuthResult;

/// A freshly issued session: token pair plus the user it belongs to
pub struct SessionBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Issue an access + refresh pair for an authenticated user
pub(crate) fn issue_session(tokens: &TokenIssuer, user: User) -> AuthResult<SessionBundle> {
    let access_token =
        tokens.issue_access(user.user_id.value(), user.email.as_str(), user.user_role)?;
    let refresh_token =
        tokens.issue_refresh(user.user_id.value(), user.email.as_str(), user.user_role)?;

    Ok(SessionBundle {
        access_token,
        refresh_token,
        user,
    })
}
