//! HTTP Handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use platform::client::extract_client_ip;
use platform::cookie::CookieConfig;
use platform::mail::Mailer;
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::application::{
    AdminUserUseCase, EmailVerificationUseCase, PasswordResetUseCase, ProvisionUserInput,
    RefreshUseCase, RegisterInput, RegisterUseCase, SignInInput, SignInOutcome, SignInUseCase,
    TotpEnrollmentUseCase, TwoFactorVerifyInput, TwoFactorVerifyUseCase,
};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    BackupCodesResponse, ChangeRoleRequest, ForgotPasswordRequest, ListUsersQuery, LoginRequest,
    LoginResponse, MessageResponse, ProvisionUserRequest, RefreshResponse, RegenerateBackupCodesRequest,
    RegisterRequest, RegisterResponse, ResendVerificationRequest, ResetPasswordRequest,
    SessionResponse, TotpConfirmRequest, TotpDisableRequest, TotpSetupResponse,
    TwoFactorVerifyRequest, UserListResponse, UserResponse, VerifyEmailRequest,
};
use crate::presentation::middleware::CurrentUser;

/// Shared state for auth handlers
pub struct AuthAppState<R, L, M>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub limiter: Arc<L>,
    pub mailer: Arc<M>,
    pub config: Arc<AuthConfig>,
}

// Manual impl: a derive would also demand Clone of the store and
// mailer types, but only the Arc handles are cloned.
impl<R, L, M> Clone for AuthAppState<R, L, M>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            limiter: Arc::clone(&self.limiter),
            mailer: Arc::clone(&self.mailer),
            config: Arc::clone(&self.config),
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

/// POST /api/auth/register
pub async fn register<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = RegisterUseCase::new(
        state.repo.clone(),
        state.mailer.clone(),
        state.config.clone(),
    );

    let input = RegisterInput {
        user_name: req.user_name,
        email: req.email,
        password: req.password,
    };

    let user = use_case.execute(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please check your email to verify your account."
                .to_string(),
            user: UserResponse::from(&user),
        }),
    ))
}

// ============================================================================
// Login
// ============================================================================

/// POST /api/auth/login
pub async fn login<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    headers: HeaderMap,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let client_ip = extract_client_ip(&headers, Some(addr.ip()));

    let identifier = match (req.email, req.username) {
        (Some(email), None) => email,
        (None, Some(username)) => username,
        _ => {
            return Err(AuthError::Validation(
                "Provide exactly one of email or username".to_string(),
            ));
        }
    };

    let use_case = SignInUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.config.clone(),
    );

    let input = SignInInput {
        identifier,
        password: req.password,
    };

    match use_case.execute(input, client_ip).await? {
        SignInOutcome::TwoFactorRequired {
            temp_token,
            user_id,
        } => {
            // 2FA pending - no refresh cookie yet
            Ok((
                StatusCode::OK,
                Json(LoginResponse {
                    requires_2fa: true,
                    user: None,
                    access_token: None,
                    temp_token: Some(temp_token),
                    user_id: Some(user_id),
                }),
            )
                .into_response())
        }
        SignInOutcome::Authenticated(session) => {
            let cookie = state
                .config
                .refresh_cookie()
                .build_set_cookie(&session.refresh_token);

            Ok((
                StatusCode::OK,
                [(header::SET_COOKIE, cookie)],
                Json(LoginResponse {
                    requires_2fa: false,
                    user: Some(UserResponse::from(&session.user)),
                    access_token: Some(session.access_token),
                    temp_token: None,
                    user_id: None,
                }),
            )
                .into_response())
        }
    }
}

// ============================================================================
// Two-Factor Verification
// ============================================================================

/// POST /api/auth/2fa/verify
pub async fn two_factor_verify<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    headers: HeaderMap,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    Json(req): Json<TwoFactorVerifyRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let client_ip = extract_client_ip(&headers, Some(addr.ip()));

    let use_case = TwoFactorVerifyUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.config.clone(),
    );

    let input = TwoFactorVerifyInput {
        user_id: req.user_id,
        code: req.code,
        is_backup_code: req.is_backup_code,
    };

    let session = use_case.execute(input, client_ip).await?;

    let cookie = state
        .config
        .refresh_cookie()
        .build_set_cookie(&session.refresh_token);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse {
            user: UserResponse::from(&session.user),
            access_token: session.access_token,
        }),
    ))
}

// ============================================================================
// Refresh
// ============================================================================

/// POST /api/auth/refresh
///
/// Every failure path clears the cookie so the client cannot keep
/// replaying a token the server already rejected.
pub async fn refresh<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    headers: HeaderMap,
) -> Response
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let cookie_config = state.config.refresh_cookie();

    let token =
        match platform::cookie::extract_cookie(&headers, &state.config.refresh_cookie_name) {
            Some(token) => token,
            None => {
                return with_cleared_cookie(
                    &cookie_config,
                    AuthError::InvalidRefreshToken.into_response(),
                );
            }
        };

    let use_case = RefreshUseCase::new(state.repo.clone(), state.config.clone());

    match use_case.execute(&token).await {
        Ok(session) => {
            let cookie = cookie_config.build_set_cookie(&session.refresh_token);

            (
                StatusCode::OK,
                [(header::SET_COOKIE, cookie)],
                Json(RefreshResponse {
                    access_token: session.access_token,
                }),
            )
                .into_response()
        }
        Err(e) => with_cleared_cookie(&cookie_config, e.into_response()),
    }
}

// ============================================================================
// Logout
// ============================================================================

/// POST /api/auth/logout
///
/// Stateless: nothing to revoke server-side, always succeeds.
pub async fn logout<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let cookie = state.config.refresh_cookie().build_delete_cookie();

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

// ============================================================================
// Password Reset
// ============================================================================

/// POST /api/auth/forgot-password
///
/// The response body is identical whether or not the account exists.
pub async fn forgot_password<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    headers: HeaderMap,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let client_ip = extract_client_ip(&headers, Some(addr.ip()));

    let use_case = PasswordResetUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.mailer.clone(),
        state.config.clone(),
    );

    use_case.request(req.email, client_ip).await?;

    Ok(Json(MessageResponse {
        message: "If an account exists for that email, a password reset link has been sent."
            .to_string(),
    }))
}

/// POST /api/auth/reset-password
pub async fn reset_password<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = PasswordResetUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.mailer.clone(),
        state.config.clone(),
    );

    use_case.confirm(&req.token, req.new_password).await?;

    Ok(Json(MessageResponse {
        message: "Your password has been reset. You can now log in.".to_string(),
    }))
}

// ============================================================================
// Email Verification
// ============================================================================

/// POST /api/auth/verify-email
///
/// Verification doubles as a first login: a full session comes back.
pub async fn verify_email<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Json(req): Json<VerifyEmailRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = EmailVerificationUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.mailer.clone(),
        state.config.clone(),
    );

    let session = use_case.verify(&req.token).await?;

    let cookie = state
        .config
        .refresh_cookie()
        .build_set_cookie(&session.refresh_token);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse {
            user: UserResponse::from(&session.user),
            access_token: session.access_token,
        }),
    ))
}

/// POST /api/auth/resend-verification
///
/// Same non-revealing 200 regardless of account state.
pub async fn resend_verification<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    headers: HeaderMap,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    Json(req): Json<ResendVerificationRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let client_ip = extract_client_ip(&headers, Some(addr.ip()));

    let use_case = EmailVerificationUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.mailer.clone(),
        state.config.clone(),
    );

    use_case.resend(req.email, client_ip).await?;

    Ok(Json(MessageResponse {
        message: "If an account exists for that email and is not yet verified, a new verification link has been sent."
            .to_string(),
    }))
}

// ============================================================================
// Current User (requires authentication)
// ============================================================================

/// GET /api/auth/me
///
/// Re-reads the store rather than echoing token claims, so role and
/// activation changes show up within one access-token lifetime.
pub async fn me<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Extension(current): Extension<CurrentUser>,
) -> AuthResult<Json<UserResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let user = state
        .repo
        .find_by_id(UserId::from_i64(current.user_id))
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(UserResponse::from(&user)))
}

// ============================================================================
// TOTP Enrollment (requires authentication)
// ============================================================================

/// POST /api/auth/2fa/setup
pub async fn totp_setup<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Extension(current): Extension<CurrentUser>,
) -> AuthResult<Json<TotpSetupResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = TotpEnrollmentUseCase::new(state.repo.clone(), state.config.clone());

    let output = use_case.setup(UserId::from_i64(current.user_id)).await?;

    Ok(Json(TotpSetupResponse {
        secret: output.secret_base32,
        otpauth_url: output.otpauth_url,
        qr_code: output.qr_code_base64,
    }))
}

/// POST /api/auth/2fa/confirm
pub async fn totp_confirm<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<TotpConfirmRequest>,
) -> AuthResult<Json<BackupCodesResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = TotpEnrollmentUseCase::new(state.repo.clone(), state.config.clone());

    let backup_codes = use_case
        .confirm(UserId::from_i64(current.user_id), &req.code)
        .await?;

    Ok(Json(BackupCodesResponse { backup_codes }))
}

/// POST /api/auth/2fa/disable
pub async fn totp_disable<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<TotpDisableRequest>,
) -> AuthResult<StatusCode>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = TotpEnrollmentUseCase::new(state.repo.clone(), state.config.clone());

    use_case
        .disable(UserId::from_i64(current.user_id), &req.code)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/2fa/backup-codes
pub async fn regenerate_backup_codes<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<RegenerateBackupCodesRequest>,
) -> AuthResult<Json<BackupCodesResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = TotpEnrollmentUseCase::new(state.repo.clone(), state.config.clone());

    let backup_codes = use_case
        .regenerate_backup_codes(UserId::from_i64(current.user_id), &req.code)
        .await?;

    Ok(Json(BackupCodesResponse { backup_codes }))
}

// ============================================================================
// Admin User Management (requires admin role)
// ============================================================================

/// GET /api/admin/users
pub async fn list_users<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Query(query): Query<ListUsersQuery>,
) -> AuthResult<Json<UserListResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = AdminUserUseCase::new(state.repo.clone(), state.config.clone());

    let page = use_case
        .list(query.page.unwrap_or(1), query.per_page.unwrap_or(20))
        .await?;

    Ok(Json(UserListResponse {
        users: page.users.iter().map(UserResponse::from).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// POST /api/admin/users
pub async fn provision_user<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Json(req): Json<ProvisionUserRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let user_role = parse_role(req.role.as_deref())?;

    let use_case = AdminUserUseCase::new(state.repo.clone(), state.config.clone());

    let input = ProvisionUserInput {
        user_name: req.user_name,
        email: req.email,
        password: req.password,
        user_role,
    };

    let user = use_case.provision(input).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// PATCH /api/admin/users/{id}/role
pub async fn change_role<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Path(user_id): Path<i64>,
    Json(req): Json<ChangeRoleRequest>,
) -> AuthResult<Json<UserResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let user_role = parse_role(Some(&req.role))?;

    let use_case = AdminUserUseCase::new(state.repo.clone(), state.config.clone());

    let user = use_case
        .change_role(UserId::from_i64(user_id), user_role)
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// POST /api/admin/users/{id}/deactivate
pub async fn deactivate_user<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> AuthResult<Json<UserResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = AdminUserUseCase::new(state.repo.clone(), state.config.clone());

    let user = use_case
        .deactivate(UserId::from_i64(current.user_id), UserId::from_i64(user_id))
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// POST /api/admin/users/{id}/reactivate
pub async fn reactivate_user<R, L, M>(
    State(state): State<AuthAppState<R, L, M>>,
    Path(user_id): Path<i64>,
) -> AuthResult<Json<UserResponse>>
where
    R: UserRepository + Clone + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = AdminUserUseCase::new(state.repo.clone(), state.config.clone());

    let user = use_case.reactivate(UserId::from_i64(user_id)).await?;

    Ok(Json(UserResponse::from(&user)))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_role(code: Option<&str>) -> AuthResult<UserRole> {
    match code {
        None => Ok(UserRole::Client),
        Some(code) => UserRole::from_code(code)
            .ok_or_else(|| AuthError::Validation(format!("Unknown role: {code}"))),
    }
}

/// Attach a delete-cookie header to an already-built response
fn with_cleared_cookie(config: &CookieConfig, mut response: Response) -> Response {
    if let Ok(value) = header::HeaderValue::from_str(&config.build_delete_cookie()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}
