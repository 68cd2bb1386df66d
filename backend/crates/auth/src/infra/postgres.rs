//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use platform::rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStore, window_start};

use crate::domain::entity::user::{NewUser, User, UserPatch};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email, totp_secret::TotpSecret, user_id::UserId, user_name::UserName,
    user_password::UserPassword, user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// Rate-limit rows older than the longest configured window are dead
const RATE_LIMIT_RETENTION_MS: i64 = 3600_000; // 1 hour

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn create(&self, user: &NewUser) -> AuthResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                email_verified,
                email_verification_token,
                email_verification_expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id,
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                is_active,
                email_verified,
                two_factor_enabled,
                two_factor_secret,
                two_factor_backup_codes,
                email_verification_token,
                email_verification_expires_at,
                password_reset_token,
                password_reset_expires_at,
                last_login_at,
                created_at,
                updated_at
            "#,
        )
        .bind(user.user_name.original())
        .bind(user.user_name.canonical())
        .bind(user.email.as_str())
        .bind(user.user_role.id())
        .bind(user.password_hash.as_ref().map(|h| h.as_phc_string()))
        .bind(user.email_verified)
        .bind(user.email_verification_token.as_deref())
        .bind(user.email_verification_expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        row.into_user()
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                is_active,
                email_verified,
                two_factor_enabled,
                two_factor_secret,
                two_factor_backup_codes,
                email_verification_token,
                email_verification_expires_at,
                password_reset_token,
                password_reset_expires_at,
                last_login_at,
                created_at,
                updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                is_active,
                email_verified,
                two_factor_enabled,
                two_factor_secret,
                two_factor_backup_codes,
                email_verification_token,
                email_verification_expires_at,
                password_reset_token,
                password_reset_expires_at,
                last_login_at,
                created_at,
                updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_user_name(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                is_active,
                email_verified,
                two_factor_enabled,
                two_factor_secret,
                two_factor_backup_codes,
                email_verification_token,
                email_verification_expires_at,
                password_reset_token,
                password_reset_expires_at,
                last_login_at,
                created_at,
                updated_at
            FROM users
            WHERE user_name_canonical = $1
            "#,
        )
        .bind(user_name.canonical())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_reset_token(&self, token_digest: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                is_active,
                email_verified,
                two_factor_enabled,
                two_factor_secret,
                two_factor_backup_codes,
                email_verification_token,
                email_verification_expires_at,
                password_reset_token,
                password_reset_expires_at,
                last_login_at,
                created_at,
                updated_at
            FROM users
            WHERE password_reset_token = $1
            "#,
        )
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_verification_token(&self, token_digest: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                is_active,
                email_verified,
                two_factor_enabled,
                two_factor_secret,
                two_factor_backup_codes,
                email_verification_token,
                email_verification_expires_at,
                password_reset_token,
                password_reset_expires_at,
                last_login_at,
                created_at,
                updated_at
            FROM users
            WHERE email_verification_token = $1
            "#,
        )
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn update(&self, user_id: UserId, patch: &UserPatch) -> AuthResult<Option<User>> {
        if patch.is_empty() {
            return self.find_by_id(user_id).await;
        }

        let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new("UPDATE users SET ");
        let mut set = builder.separated(", ");

        if let Some(user_name) = &patch.user_name {
            set.push("user_name = ");
            set.push_bind_unseparated(user_name.original());
            set.push("user_name_canonical = ");
            set.push_bind_unseparated(user_name.canonical());
        }
        if let Some(email) = &patch.email {
            set.push("email = ");
            set.push_bind_unseparated(email.as_str());
        }
        if let Some(user_role) = &patch.user_role {
            set.push("user_role = ");
            set.push_bind_unseparated(user_role.id());
        }
        if let Some(password_hash) = &patch.password_hash {
            set.push("password_hash = ");
            set.push_bind_unseparated(password_hash.as_phc_string());
        }
        if let Some(is_active) = patch.is_active {
            set.push("is_active = ");
            set.push_bind_unseparated(is_active);
        }
        if let Some(email_verified) = patch.email_verified {
            set.push("email_verified = ");
            set.push_bind_unseparated(email_verified);
        }
        if let Some(two_factor_enabled) = patch.two_factor_enabled {
            set.push("two_factor_enabled = ");
            set.push_bind_unseparated(two_factor_enabled);
        }
        if let Some(two_factor_secret) = &patch.two_factor_secret {
            set.push("two_factor_secret = ");
            set.push_bind_unseparated(
                two_factor_secret
                    .as_ref()
                    .map(|s| s.as_base32().to_string()),
            );
        }
        if let Some(two_factor_backup_codes) = &patch.two_factor_backup_codes {
            set.push("two_factor_backup_codes = ");
            set.push_bind_unseparated(two_factor_backup_codes.as_slice());
        }
        if let Some(email_verification_token) = &patch.email_verification_token {
            set.push("email_verification_token = ");
            set.push_bind_unseparated(email_verification_token.as_deref());
        }
        if let Some(email_verification_expires_at) = patch.email_verification_expires_at {
            set.push("email_verification_expires_at = ");
            set.push_bind_unseparated(email_verification_expires_at);
        }
        if let Some(password_reset_token) = &patch.password_reset_token {
            set.push("password_reset_token = ");
            set.push_bind_unseparated(password_reset_token.as_deref());
        }
        if let Some(password_reset_expires_at) = patch.password_reset_expires_at {
            set.push("password_reset_expires_at = ");
            set.push_bind_unseparated(password_reset_expires_at);
        }
        if let Some(last_login_at) = patch.last_login_at {
            set.push("last_login_at = ");
            set.push_bind_unseparated(last_login_at);
        }
        set.push("updated_at = NOW()");

        builder.push(" WHERE id = ");
        builder.push_bind(user_id.value());
        builder.push(
            r#"
            RETURNING
                id,
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                is_active,
                email_verified,
                two_factor_enabled,
                two_factor_secret,
                two_factor_backup_codes,
                email_verification_token,
                email_verification_expires_at,
                password_reset_token,
                password_reset_expires_at,
                last_login_at,
                created_at,
                updated_at
            "#,
        );

        let row = builder
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique_violation)?;

        row.map(|r| r.into_user()).transpose()
    }

    /// Conditional removal: the WHERE clause re-checks membership under
    /// the row lock, so two requests racing to spend the same code leave
    /// exactly one winner.
    async fn remove_backup_code(&self, user_id: UserId, stored_entry: &str) -> AuthResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET two_factor_backup_codes = array_remove(two_factor_backup_codes, $2),
                updated_at = NOW()
            WHERE id = $1 AND $2 = ANY(two_factor_backup_codes)
            "#,
        )
        .bind(user_id.value())
        .bind(stored_entry)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn exists_by_user_name(&self, user_name: &UserName) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_name_canonical = $1)",
        )
        .bind(user_name.canonical())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn list(&self, offset: i64, limit: i64) -> AuthResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                user_name,
                user_name_canonical,
                email,
                user_role,
                password_hash,
                is_active,
                email_verified,
                two_factor_enabled,
                two_factor_secret,
                two_factor_backup_codes,
                email_verification_token,
                email_verification_expires_at,
                password_reset_token,
                password_reset_expires_at,
                last_login_at,
                created_at,
                updated_at
            FROM users
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_user()).collect()
    }

    async fn count(&self) -> AuthResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// ============================================================================
// Rate Limit Store Implementation
// ============================================================================

/// PostgreSQL-backed fixed-window counter
///
/// One row per (key, window); the upsert returns the post-increment
/// count so check and increment are a single round trip.
#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete rows from windows that can no longer be current
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let cutoff_ms = Utc::now().timestamp_millis() - RATE_LIMIT_RETENTION_MS;

        let deleted = sqlx::query("DELETE FROM auth_rate_limits WHERE window_start_ms < $1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(rows_deleted = deleted, "Cleaned up expired rate-limit windows");

        Ok(deleted)
    }
}

impl RateLimitStore for PgRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, Box<dyn std::error::Error + Send + Sync>> {
        let now_ms = Utc::now().timestamp_millis();
        let window_ms = config.window_ms();
        let window_start_ms = window_start(now_ms, window_ms);

        let count = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO auth_rate_limits (rate_key, window_start_ms, request_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (rate_key, window_start_ms)
            DO UPDATE SET request_count = auth_rate_limits.request_count + 1
            RETURNING request_count
            "#,
        )
        .bind(key)
        .bind(window_start_ms)
        .fetch_one(&self.pool)
        .await?;

        let count = count as u32;

        Ok(RateLimitResult {
            allowed: count <= config.max_requests,
            remaining: config.max_requests.saturating_sub(count),
            reset_at_ms: window_start_ms + window_ms,
        })
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    user_name: String,
    #[allow(dead_code)]
    user_name_canonical: String,
    email: String,
    user_role: i16,
    password_hash: Option<String>,
    is_active: bool,
    email_verified: bool,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    two_factor_backup_codes: Vec<String>,
    email_verification_token: Option<String>,
    email_verification_expires_at: Option<DateTime<Utc>>,
    password_reset_token: Option<String>,
    password_reset_expires_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let user_name = UserName::from_db(&self.user_name)
            .map_err(|e| AuthError::Internal(format!("Invalid user_name: {}", e)))?;

        let user_role = UserRole::from_id(self.user_role)
            .ok_or_else(|| AuthError::Internal(format!("Invalid user_role: {}", self.user_role)))?;

        let password_hash = self
            .password_hash
            .map(UserPassword::from_phc_string)
            .transpose()
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

        let two_factor_secret = self
            .two_factor_secret
            .map(TotpSecret::from_base32)
            .transpose()
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {}", e)))?;

        Ok(User {
            user_id: UserId::from_i64(self.id),
            user_name,
            email: Email::from_db(self.email),
            user_role,
            password_hash,
            is_active: self.is_active,
            email_verified: self.email_verified,
            two_factor_enabled: self.two_factor_enabled,
            two_factor_secret,
            two_factor_backup_codes: self.two_factor_backup_codes,
            email_verification_token: self.email_verification_token,
            email_verification_expires_at: self.email_verification_expires_at,
            password_reset_token: self.password_reset_token,
            password_reset_expires_at: self.password_reset_expires_at,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Translate a unique-constraint violation into the conflict message the
/// pre-insert existence checks would have produced
fn map_unique_violation(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(ref db) = e {
        if db.code().as_deref() == Some("23505") {
            let constraint = db.constraint().unwrap_or_default();
            if constraint.contains("email") {
                return AuthError::Conflict(
                    "An account with this email already exists".to_string(),
                );
            }
            if constraint.contains("user_name") {
                return AuthError::Conflict("This username is already taken".to_string());
            }
        }
    }
    AuthError::from(e)
}
