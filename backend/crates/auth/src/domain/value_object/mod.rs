//! Value Object Module

pub mod backup_codes;
pub mod email;
pub mod totp_secret;
pub mod user_id;
pub mod user_name;
pub mod user_password;
pub mod user_role;
