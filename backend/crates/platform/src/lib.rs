//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256, Base64, hex)
//! - Password policy and hashing (Argon2id, NIST SP 800-63B compliant)
//! - Cookie management
//! - Client identification
//! - Rate limiting infrastructure
//! - Outbound email dispatch
//!
//! Nothing here knows about users, invoices or any other domain concept:
//! this crate provides mechanisms, the feature crates provide policy.

pub mod client;
pub mod cookie;
pub mod crypto;
pub mod mail;
pub mod password;
pub mod rate_limit;
