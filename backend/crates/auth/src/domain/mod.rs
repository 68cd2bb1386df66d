//! Domain Layer
//!
//! Contains entities, value objects, the token issuer, and repository
//! traits.

pub mod entity;
pub mod repository;
pub mod token;
pub mod value_object;

// Re-exports
pub use entity::user::{NewUser, User, UserPatch};
pub use repository::UserRepository;
pub use token::TokenIssuer;
