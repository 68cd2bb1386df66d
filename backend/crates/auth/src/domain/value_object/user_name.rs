//! User Name Value Object
//!
//! The user name is the public handle that identifies an account inside
//! the portal: a login identifier, an admin search key, and the fallback
//! display name on outgoing mail.
//!
//! ## Design
//! - ASCII only (a-z, 0-9, `_` `.` `-` `+`)
//! - Uppercase input is accepted; the canonical form is lowercase
//! - Processing order: NFKC normalization, validation, lowercasing
//! - Reserved words are a fixed list guarding route segments and
//!   operational account names
//!
//! ## Invariants
//! - Length 3 to 30 characters after normalization
//! - First and last character alphanumeric or `_`
//! - No consecutive dots (`..`)
//! - At least one alphanumeric character
//! - No whitespace

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Constants
// ============================================================================

/// Minimum length for user name (in characters)
pub const USER_NAME_MIN_LENGTH: usize = 3;

/// Maximum length for user name (in characters)
pub const USER_NAME_MAX_LENGTH: usize = 30;

/// Allowed special characters in user name
const ALLOWED_SPECIAL_CHARS: &[char] = &['_', '.', '-', '+'];

/// Reserved words that cannot be used as user names
///
/// Covers route segments, operational accounts, and portal resource
/// names that would collide with a user handle.
const RESERVED_WORDS: &[&str] = &[
    // System/Admin
    "admin",
    "administrator",
    "root",
    "system",
    "superuser",
    "staff",
    "support",
    "help",
    // API/Routing
    "api",
    "webhook",
    "webhooks",
    "auth",
    "login",
    "logout",
    "register",
    "password",
    "reset",
    "verify",
    "confirm",
    "refresh",
    "me",
    // Portal resources
    "portal",
    "client",
    "clients",
    "user",
    "users",
    "account",
    "accounts",
    "profile",
    "settings",
    "dashboard",
    "documents",
    "messages",
    "invoices",
    "billing",
    "payments",
    // Common reserved
    "www",
    "mail",
    "email",
    "test",
    "demo",
    "null",
    "undefined",
    "anonymous",
    "guest",
    "public",
    "private",
];

// ============================================================================
// Error Types
// ============================================================================

/// Error returned when user name validation fails
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserNameError {
    /// User name is empty after normalization
    #[error("User name cannot be empty")]
    Empty,

    /// User name is too short (minimum: USER_NAME_MIN_LENGTH)
    #[error("User name is too short ({length} chars, minimum {min})")]
    TooShort { length: usize, min: usize },

    /// User name is too long (maximum: USER_NAME_MAX_LENGTH)
    #[error("User name is too long ({length} chars, maximum {max})")]
    TooLong { length: usize, max: usize },

    /// User name contains invalid character
    #[error(
        "Invalid character '{char}' at position {position}. Only a-z, 0-9, _, ., -, + are allowed"
    )]
    InvalidCharacter { char: char, position: usize },

    /// User name starts with invalid character (must be alphanumeric or _)
    #[error("User name cannot start with '{char}'. Must start with a-z, 0-9, or _")]
    InvalidStart { char: char },

    /// User name ends with invalid character (must be alphanumeric or _)
    #[error("User name cannot end with '{char}'. Must end with a-z, 0-9, or _")]
    InvalidEnd { char: char },

    /// User name contains consecutive dots (..)
    #[error("User name cannot contain consecutive dots (..)")]
    ConsecutiveDots,

    /// User name contains no alphanumeric characters
    #[error("User name must contain at least one letter or digit")]
    NoAlphanumeric,

    /// User name contains whitespace in the middle
    #[error("User name cannot contain whitespace")]
    ContainsWhitespace,

    /// User name is a reserved word
    #[error("'{word}' is a reserved user name")]
    Reserved { word: String },
}

// ============================================================================
// UserName Value Object
// ============================================================================

/// Validated, normalized user name
///
/// # Invariants
/// - Non-empty after normalization
/// - Length between USER_NAME_MIN_LENGTH and USER_NAME_MAX_LENGTH
/// - Contains only ASCII alphanumeric and allowed special characters
/// - Starts and ends with alphanumeric or underscore
/// - No consecutive dots
/// - Contains at least one alphanumeric character
/// - Not a reserved word
///
/// # Storage
/// - `original`: The user's input (trimmed, NFKC normalized, preserves case)
/// - `canonical`: Lowercase form for uniqueness checks
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserName {
    /// Original user input (preserves case)
    original: String,
    /// Canonical form (lowercase) for uniqueness
    canonical: String,
}

impl UserName {
    /// Create a new UserName from raw input
    ///
    /// Applies normalization (NFKC, trim) and validates.
    /// Preserves case in original, stores lowercase in canonical.
    pub fn new(input: impl AsRef<str>) -> Result<Self, UserNameError> {
        let original = Self::normalize_original(input.as_ref());
        let canonical = original.to_lowercase();
        Self::validate(&canonical)?;
        Ok(Self {
            original,
            canonical,
        })
    }

    /// Get the original user name (preserves case)
    #[inline]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Get the canonical (normalized, lowercase) user name
    #[inline]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Alias for canonical() for compatibility
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Create from database values (assumes already validated)
    pub fn from_db(original: &str) -> Result<Self, UserNameError> {
        let canonical = original.to_lowercase();
        Ok(Self {
            original: original.to_string(),
            canonical,
        })
    }

    /// Normalize input string (trim and NFKC, preserve case)
    fn normalize_original(input: &str) -> String {
        input.nfkc().collect::<String>().trim().to_string()
    }

    /// Validate the normalized user name
    fn validate(canonical: &str) -> Result<(), UserNameError> {
        if canonical.is_empty() {
            return Err(UserNameError::Empty);
        }

        let length = canonical.chars().count();
        if length < USER_NAME_MIN_LENGTH {
            return Err(UserNameError::TooShort {
                length,
                min: USER_NAME_MIN_LENGTH,
            });
        }
        if length > USER_NAME_MAX_LENGTH {
            return Err(UserNameError::TooLong {
                length,
                max: USER_NAME_MAX_LENGTH,
            });
        }

        if canonical.chars().any(|c| c.is_whitespace()) {
            return Err(UserNameError::ContainsWhitespace);
        }

        for (pos, ch) in canonical.chars().enumerate() {
            if !Self::is_valid_char(ch) {
                return Err(UserNameError::InvalidCharacter {
                    char: ch,
                    position: pos,
                });
            }
        }

        // validate() is only called on non-empty strings, so first/last exist
        let first_char = canonical.chars().next().unwrap_or('_');
        if !Self::is_valid_start_end_char(first_char) {
            return Err(UserNameError::InvalidStart { char: first_char });
        }

        let last_char = canonical.chars().next_back().unwrap_or('_');
        if !Self::is_valid_start_end_char(last_char) {
            return Err(UserNameError::InvalidEnd { char: last_char });
        }

        if canonical.contains("..") {
            return Err(UserNameError::ConsecutiveDots);
        }

        if !canonical.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(UserNameError::NoAlphanumeric);
        }

        if RESERVED_WORDS.iter().any(|&w| w == canonical) {
            return Err(UserNameError::Reserved {
                word: canonical.to_string(),
            });
        }

        Ok(())
    }

    /// Check if character is valid in a user name
    #[inline]
    fn is_valid_char(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || ALLOWED_SPECIAL_CHARS.contains(&c)
    }

    /// Check if character is valid at start or end of user name
    #[inline]
    fn is_valid_start_end_char(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
    }
}

impl fmt::Debug for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserName")
            .field("original", &self.original)
            .field("canonical", &self.canonical)
            .finish()
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl AsRef<str> for UserName {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

impl TryFrom<String> for UserName {
    type Error = UserNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for UserName {
    type Error = UserNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserName> for String {
    fn from(name: UserName) -> Self {
        name.original
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod normalization {
        use super::*;

        #[test]
        fn test_trim_whitespace() {
            let name = UserName::new("  mwhitfield  ").unwrap();
            assert_eq!(name.as_str(), "mwhitfield");
        }

        #[test]
        fn test_lowercase() {
            let name = UserName::new("MWhitfield").unwrap();
            assert_eq!(name.as_str(), "mwhitfield");
        }

        #[test]
        fn test_original_case_preserved() {
            let name = UserName::new("MWhitfield_123").unwrap();
            assert_eq!(name.original(), "MWhitfield_123");
            assert_eq!(name.canonical(), "mwhitfield_123");
        }

        #[test]
        fn test_nfkc_normalization() {
            // Full-width 'Ａ' (U+FF21) should normalize to 'a' (lowercase)
            let name = UserName::new("Ａlice");
            assert!(name.is_ok());
            assert_eq!(name.unwrap().as_str(), "alice");
        }

        #[test]
        fn test_idempotent() {
            let input = "  AlIcE_123  ";
            let first = UserName::new(input).unwrap();
            let second = UserName::new(first.as_str()).unwrap();
            assert_eq!(first.canonical(), second.canonical());
        }
    }

    mod length_validation {
        use super::*;

        #[test]
        fn test_empty_fails() {
            assert!(matches!(UserName::new(""), Err(UserNameError::Empty)));
        }

        #[test]
        fn test_whitespace_only_fails() {
            assert!(matches!(UserName::new("   "), Err(UserNameError::Empty)));
        }

        #[test]
        fn test_too_short() {
            assert!(matches!(
                UserName::new("ab"),
                Err(UserNameError::TooShort { length: 2, min: 3 })
            ));
        }

        #[test]
        fn test_boundaries() {
            assert!(UserName::new("abc").is_ok());
            assert!(UserName::new("a".repeat(USER_NAME_MAX_LENGTH)).is_ok());
            assert!(matches!(
                UserName::new("a".repeat(USER_NAME_MAX_LENGTH + 1)),
                Err(UserNameError::TooLong { .. })
            ));
        }
    }

    mod character_validation {
        use super::*;

        #[test]
        fn test_valid_characters() {
            assert!(UserName::new("alice123").is_ok());
            assert!(UserName::new("alice_bob").is_ok());
            assert!(UserName::new("alice.bob").is_ok());
            assert!(UserName::new("alice-bob").is_ok());
            assert!(UserName::new("alice+tag").is_ok());
        }

        #[test]
        fn test_invalid_special_char() {
            assert!(matches!(
                UserName::new("alice@bob"),
                Err(UserNameError::InvalidCharacter { char: '@', .. })
            ));
        }

        #[test]
        fn test_invalid_unicode() {
            // Japanese characters are not allowed
            assert!(matches!(
                UserName::new("日本語"),
                Err(UserNameError::InvalidCharacter { .. })
            ));
        }

        #[test]
        fn test_invalid_emoji() {
            assert!(matches!(
                UserName::new("alice🎉"),
                Err(UserNameError::InvalidCharacter { .. })
            ));
        }
    }

    mod position_validation {
        use super::*;

        #[test]
        fn test_valid_starts() {
            assert!(UserName::new("alice").is_ok());
            assert!(UserName::new("123alice").is_ok());
            assert!(UserName::new("_alice").is_ok());
        }

        #[test]
        fn test_invalid_starts() {
            assert!(matches!(
                UserName::new(".alice"),
                Err(UserNameError::InvalidStart { char: '.' })
            ));
            assert!(matches!(
                UserName::new("-alice"),
                Err(UserNameError::InvalidStart { char: '-' })
            ));
            assert!(matches!(
                UserName::new("+alice"),
                Err(UserNameError::InvalidStart { char: '+' })
            ));
        }

        #[test]
        fn test_valid_ends() {
            assert!(UserName::new("alice123").is_ok());
            assert!(UserName::new("alice_").is_ok());
        }

        #[test]
        fn test_invalid_ends() {
            assert!(matches!(
                UserName::new("alice."),
                Err(UserNameError::InvalidEnd { char: '.' })
            ));
            assert!(matches!(
                UserName::new("alice-"),
                Err(UserNameError::InvalidEnd { char: '-' })
            ));
            assert!(matches!(
                UserName::new("alice+"),
                Err(UserNameError::InvalidEnd { char: '+' })
            ));
        }
    }

    mod pattern_validation {
        use super::*;

        #[test]
        fn test_consecutive_dots_fails() {
            assert!(matches!(
                UserName::new("alice..bob"),
                Err(UserNameError::ConsecutiveDots)
            ));
        }

        #[test]
        fn test_single_dots_ok() {
            assert!(UserName::new("alice.bob.charlie").is_ok());
        }

        #[test]
        fn test_symbols_only_fails() {
            assert!(matches!(
                UserName::new("___"),
                Err(UserNameError::NoAlphanumeric)
            ));
        }

        #[test]
        fn test_whitespace_in_middle_fails() {
            let result = UserName::new("alice bob");
            assert!(matches!(
                result,
                Err(UserNameError::ContainsWhitespace)
                    | Err(UserNameError::InvalidCharacter { .. })
            ));
        }
    }

    mod reserved_words {
        use super::*;

        #[test]
        fn test_reserved_admin() {
            assert!(matches!(
                UserName::new("admin"),
                Err(UserNameError::Reserved { word }) if word == "admin"
            ));
        }

        #[test]
        fn test_reserved_case_insensitive() {
            assert!(matches!(
                UserName::new("ADMIN"),
                Err(UserNameError::Reserved { word }) if word == "admin"
            ));
        }

        #[test]
        fn test_reserved_route_segments() {
            assert!(matches!(
                UserName::new("api"),
                Err(UserNameError::Reserved { .. })
            ));
            assert!(matches!(
                UserName::new("billing"),
                Err(UserNameError::Reserved { .. })
            ));
            assert!(matches!(
                UserName::new("portal"),
                Err(UserNameError::Reserved { .. })
            ));
        }
    }

    mod serialization {
        use super::*;

        #[test]
        fn test_serialize() {
            let name = UserName::new("alice").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, "\"alice\"");
        }

        #[test]
        fn test_serialize_preserves_original_case() {
            let name = UserName::new("Alice").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, "\"Alice\"");
        }

        #[test]
        fn test_deserialize_with_normalization() {
            let json = "\"ALICE\"";
            let name: UserName = serde_json::from_str(json).unwrap();
            assert_eq!(name.as_str(), "alice");
        }

        #[test]
        fn test_deserialize_invalid() {
            let json = "\"ab\""; // too short
            let result: Result<UserName, _> = serde_json::from_str(json);
            assert!(result.is_err());
        }
    }

    mod display_and_conversions {
        use super::*;

        #[test]
        fn test_display_shows_original() {
            let name = UserName::new("Alice").unwrap();
            assert_eq!(format!("{}", name), "Alice");
        }

        #[test]
        fn test_debug() {
            let name = UserName::new("alice").unwrap();
            let debug = format!("{:?}", name);
            assert!(debug.contains("UserName"));
            assert!(debug.contains("alice"));
        }

        #[test]
        fn test_try_from() {
            let name: Result<UserName, _> = "alice".to_string().try_into();
            assert!(name.is_ok());
            let name: Result<UserName, _> = "alice".try_into();
            assert!(name.is_ok());
        }

        #[test]
        fn test_into_string() {
            let name = UserName::new("Alice").unwrap();
            let s: String = name.into();
            assert_eq!(s, "Alice");
        }
    }

    mod error_messages {
        use super::*;

        #[test]
        fn test_error_display() {
            let err = UserNameError::TooShort { length: 2, min: 3 };
            let msg = err.to_string();
            assert!(msg.contains("2") && msg.contains("3"));
        }
    }
}
