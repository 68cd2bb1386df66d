//! Application Layer
//!
//! Use cases and application services.

pub mod admin;
pub mod config;
pub mod email_verification;
pub mod password_reset;
pub mod refresh;
pub mod register;
pub mod session;
pub mod sign_in;
pub mod totp_enrollment;
pub mod two_factor;

// Re-exports
pub use admin::{AdminUserUseCase, ProvisionUserInput, UserListPage};
pub use config::AuthConfig;
pub use email_verification::EmailVerificationUseCase;
pub use password_reset::PasswordResetUseCase;
pub use refresh::RefreshUseCase;
pub use register::{RegisterInput, RegisterUseCase};
pub use session::SessionBundle;
pub use sign_in::{SignInInput, SignInOutcome, SignInUseCase};
pub use totp_enrollment::{TotpEnrollmentOutput, TotpEnrollmentUseCase};
pub use two_factor::{TwoFactorVerifyInput, TwoFactorVerifyUseCase};
