//! Password Hashing and Verification
//!
//! NIST SP 800-63B compliant password handling with:
//! - Argon2id hashing (memory-hard, recommended by OWASP)
//! - Zeroization of sensitive data
//! - Constant-time comparison
//! - Configurable cost factor with rehash detection
//!
//! ## Security Features
//! - Memory-hard hashing prevents GPU/ASIC attacks
//! - Zeroization prevents memory inspection attacks
//! - Pepper support for additional security layer
//! - Policy validation reports every violation at once so clients can
//!   show the full list instead of fixing one rule per round trip

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants (NIST SP 800-63B compliant)
// ============================================================================

/// Minimum password length (NIST: SHALL be at least 8)
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (NIST: SHOULD permit at least 64)
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Shortest digit run treated as a sequential pattern
const SEQUENTIAL_RUN_MIN: usize = 4;

// ============================================================================
// Error Types
// ============================================================================

/// Password policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    /// Password is too short
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    /// Password is too long
    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    /// Password contains only whitespace
    #[error("Password cannot be empty or contain only whitespace")]
    EmptyOrWhitespace,

    /// Password contains invalid characters (control characters)
    #[error("Password contains invalid control characters")]
    InvalidCharacter,

    /// Password matches common patterns (sequential, repeated)
    #[error("Password is too common or follows a predictable pattern")]
    CommonPattern,
}

/// Password hashing/verification errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    /// Hashing operation failed
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Invalid hash format
    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Hashing Cost
// ============================================================================

/// Argon2id cost parameters
///
/// The defaults follow the OWASP recommendation (m=19456 KiB, t=2, p=1).
/// Raising the cost increases compute per verification attempt at the
/// price of login latency; [`HashedPassword::needs_rehash`] reports when
/// a stored hash was produced under different parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingCost {
    /// Memory size in KiB
    pub memory_kib: u32,
    /// Number of iterations
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashingCost {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashingCost {
    fn hasher(self) -> Result<Argon2<'static>, PasswordHashError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// This type ensures that password data is securely erased from memory
/// when the value is dropped, preventing memory inspection attacks.
///
/// ## Security
/// - Implements `Zeroize` and `ZeroizeOnDrop`
/// - Does not implement `Clone` to prevent accidental copies
/// - Debug output is redacted
///
/// ## Examples
/// ```rust
/// use platform::password::ClearTextPassword;
///
/// let password = ClearTextPassword::new("Passw0rd!123".to_string());
/// assert!(password.is_ok());
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Create a new clear text password with validation
    ///
    /// Validates against NIST SP 800-63B requirements:
    /// - Minimum 8 characters
    /// - Maximum 128 characters
    /// - No control characters
    /// - Not empty/whitespace only
    /// - No predictable patterns (keyboard walks, sequential digit runs,
    ///   single repeated character, well-known passwords)
    ///
    /// Unicode is normalized using NFKC before validation. Every violated
    /// rule is collected; the error carries the complete list.
    pub fn new(raw: String) -> Result<Self, Vec<PasswordPolicyError>> {
        // NIST: Unicode NFKC normalization before processing
        let normalized: String = raw.nfkc().collect();

        let mut errors = Vec::new();

        // Check for empty or whitespace-only
        if normalized.trim().is_empty() {
            errors.push(PasswordPolicyError::EmptyOrWhitespace);
        }

        // NIST: Count Unicode code points (not bytes)
        let char_count = normalized.chars().count();

        // NIST: SHALL be at least [`MIN_PASSWORD_LENGTH`] characters
        if char_count < MIN_PASSWORD_LENGTH {
            errors.push(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        // NIST: SHOULD permit at least [`MAX_PASSWORD_LENGTH`] characters
        if char_count > MAX_PASSWORD_LENGTH {
            errors.push(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        // Check for control characters (except space, tab, newline)
        if normalized
            .chars()
            .any(|ch| ch.is_control() && ch != ' ' && ch != '\t' && ch != '\n')
        {
            errors.push(PasswordPolicyError::InvalidCharacter);
        }

        // Check for common weak patterns
        if is_common_pattern(&normalized) {
            errors.push(PasswordPolicyError::CommonPattern);
        }

        if errors.is_empty() {
            Ok(Self(normalized))
        } else {
            Err(errors)
        }
    }

    /// Create for verification against a stored hash, skipping policy checks
    ///
    /// Login must accept passwords that predate the current policy. The same
    /// NFKC normalization as [`ClearTextPassword::new`] is applied so the
    /// bytes match what was hashed.
    pub fn for_verification(raw: String) -> Self {
        Self(raw.nfkc().collect())
    }

    /// Create without validation (for testing or trusted input)
    ///
    /// ## Safety
    /// Only use this for testing or when password has already been validated
    #[cfg(test)]
    pub fn new_unchecked(raw: String) -> Self {
        Self(raw)
    }

    /// Get the password as bytes for hashing
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Hash the password using Argon2id
    ///
    /// ## Arguments
    /// * `pepper` - Optional application-wide secret for additional security
    /// * `cost` - Argon2id cost parameters
    ///
    /// ## Returns
    /// PHC-formatted hash string wrapped in `HashedPassword`
    pub fn hash(
        &self,
        pepper: Option<&[u8]>,
        cost: HashingCost,
    ) -> Result<HashedPassword, PasswordHashError> {
        // Combine password with pepper if provided
        let password_bytes = match pepper {
            Some(p) => {
                let mut combined = self.as_bytes().to_vec();
                combined.extend_from_slice(p);
                combined
            }
            None => self.as_bytes().to_vec(),
        };

        // Generate random salt (128 bits = 16 bytes)
        let salt = SaltString::generate(OsRng);

        let argon2 = cost.hasher()?;

        let hash = argon2
            .hash_password(&password_bytes, &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Hashed password in PHC string format
///
/// This type stores the Argon2id hash in PHC format, which includes:
/// - Algorithm identifier
/// - Version
/// - Parameters (memory, iterations, parallelism)
/// - Salt
/// - Hash
///
/// ## Examples
/// ```rust
/// use platform::password::{ClearTextPassword, HashingCost};
///
/// let password = ClearTextPassword::new("Passw0rd!123".to_string()).unwrap();
/// let hashed = password.hash(None, HashingCost::default()).unwrap();
/// assert!(hashed.verify(&password, None));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from PHC string (e.g., from database)
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();

        // Validate it's a valid PHC string
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;

        Ok(Self { hash })
    }

    /// Get the PHC string for storage
    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash
    ///
    /// Uses constant-time comparison to prevent timing attacks. Cost
    /// parameters are read from the PHC string, so hashes produced under
    /// older settings keep verifying.
    ///
    /// ## Arguments
    /// * `password` - The clear text password to verify
    /// * `pepper` - Optional pepper (must match the one used during hashing)
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let password_bytes = match pepper {
            Some(p) => {
                let mut combined = password.as_bytes().to_vec();
                combined.extend_from_slice(p);
                combined
            }
            None => password.as_bytes().to_vec(),
        };

        let parsed_hash = match PasswordHash::new(&self.hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        let argon2 = Argon2::default();

        // Argon2 uses constant-time comparison internally
        argon2
            .verify_password(&password_bytes, &parsed_hash)
            .is_ok()
    }

    /// Check if the hash needs to be rehashed
    ///
    /// Returns true if the hash uses an algorithm or cost parameters
    /// different from the configured ones. Callers re-hash on the next
    /// successful login, when the plaintext is available.
    pub fn needs_rehash(&self, cost: HashingCost) -> bool {
        let parsed_hash = match PasswordHash::new(&self.hash) {
            Ok(h) => h,
            Err(_) => return true,
        };

        if parsed_hash.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }

        let params = match Params::try_from(&parsed_hash) {
            Ok(p) => p,
            Err(_) => return true,
        };

        params.m_cost() != cost.memory_kib
            || params.t_cost() != cost.iterations
            || params.p_cost() != cost.parallelism
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Check for common weak patterns
fn is_common_pattern(password: &str) -> bool {
    let lower = password.to_lowercase();

    // Check for all same character (e.g., "aaaaaaaa")
    let chars: Vec<char> = lower.chars().collect();
    if let Some(first) = chars.first() {
        if chars.len() >= 3 && chars.iter().all(|c| c == first) {
            return true;
        }
    }

    // Check for sequential digit runs (e.g., "12345678")
    if has_sequential_digit_run(&lower) {
        return true;
    }

    // Check for keyboard patterns
    const KEYBOARD_PATTERNS: &[&str] = &[
        "qwerty",
        "qwertyuiop",
        "asdfgh",
        "asdfghjkl",
        "zxcvbn",
        "qazwsx",
        "1qaz2wsx",
    ];

    for pattern in KEYBOARD_PATTERNS {
        if lower.contains(pattern) {
            return true;
        }
    }

    // Check for extremely common passwords
    const COMMON_PASSWORDS: &[&str] = &[
        "password",
        "password1",
        "password123",
        "12345678",
        "123456789",
        "1234567890",
        "abcdefgh",
        "letmein",
        "welcome",
        "admin123",
        "iloveyou",
        "sunshine",
        "princess",
        "football",
        "monkey",
        "shadow",
        "master",
        "dragon",
        "baseball",
        "michael",
        "trustno1",
    ];

    COMMON_PASSWORDS.contains(&lower.as_str())
}

/// Check for runs of sequential digits
///
/// Only contiguous digit runs count. Digits separated by letters or
/// symbols are independent, so "Passw0rd!123" (runs "0" and "123") is
/// fine while "abc45678" is not.
fn has_sequential_digit_run(s: &str) -> bool {
    let mut run: Vec<u32> = Vec::new();

    for ch in s.chars() {
        match ch.to_digit(10) {
            Some(d) => run.push(d),
            None => {
                if run.len() >= SEQUENTIAL_RUN_MIN && is_sequential(&run) {
                    return true;
                }
                run.clear();
            }
        }
    }

    run.len() >= SEQUENTIAL_RUN_MIN && is_sequential(&run)
}

/// Check if digits ascend or descend by one, with 9/0 wraparound
fn is_sequential(digits: &[u32]) -> bool {
    let is_ascending = digits
        .windows(2)
        .all(|w| w[1] == w[0] + 1 || (w[0] == 9 && w[1] == 0));

    let is_descending = digits
        .windows(2)
        .all(|w| w[0] == w[1] + 1 || (w[0] == 0 && w[1] == 9));

    is_ascending || is_descending
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_too_short() {
        let result = ClearTextPassword::new("short".to_string());
        let errors = result.unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, PasswordPolicyError::TooShort { .. }))
        );
    }

    #[test]
    fn test_password_too_long() {
        let long_password = "aB3$".repeat((MAX_PASSWORD_LENGTH / 4) + 1);
        let result = ClearTextPassword::new(long_password);
        let errors = result.unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, PasswordPolicyError::TooLong { .. }))
        );
    }

    #[test]
    fn test_password_empty() {
        let result = ClearTextPassword::new("".to_string());
        let errors = result.unwrap_err();
        assert!(errors.contains(&PasswordPolicyError::EmptyOrWhitespace));
    }

    #[test]
    fn test_password_whitespace_only() {
        let result = ClearTextPassword::new("        ".to_string());
        let errors = result.unwrap_err();
        assert!(errors.contains(&PasswordPolicyError::EmptyOrWhitespace));
    }

    #[test]
    fn test_password_common_pattern() {
        for weak in ["password123", "qwertyuiop", "12345678"] {
            let errors = ClearTextPassword::new(weak.to_string()).unwrap_err();
            assert!(
                errors.contains(&PasswordPolicyError::CommonPattern),
                "expected CommonPattern for {weak:?}"
            );
        }
    }

    #[test]
    fn test_multiple_violations_reported_together() {
        // Short AND a keyboard pattern
        let errors = ClearTextPassword::new("qwerty".to_string()).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, PasswordPolicyError::TooShort { .. }))
        );
        assert!(errors.contains(&PasswordPolicyError::CommonPattern));
        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_valid_password() {
        let result = ClearTextPassword::new("MySecure#Pass2024!".to_string());
        assert!(result.is_ok());
    }

    #[test]
    fn test_split_digit_runs_are_not_sequential() {
        // "0" and "123" are separate runs, neither long enough to count
        let result = ClearTextPassword::new("Passw0rd!123".to_string());
        assert!(result.is_ok());
    }

    #[test]
    fn test_contiguous_sequential_run_rejected() {
        let errors = ClearTextPassword::new("abc456789xyz".to_string()).unwrap_err();
        assert!(errors.contains(&PasswordPolicyError::CommonPattern));

        // Descending runs count too
        let errors = ClearTextPassword::new("abc98765xyz".to_string()).unwrap_err();
        assert!(errors.contains(&PasswordPolicyError::CommonPattern));
    }

    #[test]
    fn test_unicode_password() {
        // Unicode passwords should work
        let result = ClearTextPassword::new("パスワード安全です!".to_string());
        assert!(result.is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let password = ClearTextPassword::new_unchecked("TestPassword823!".to_string());
        let hashed = password.hash(None, HashingCost::default()).unwrap();

        // Correct password should verify
        assert!(hashed.verify(&password, None));

        // Wrong password should not verify
        let wrong_password = ClearTextPassword::new_unchecked("WrongPassword823!".to_string());
        assert!(!hashed.verify(&wrong_password, None));
    }

    #[test]
    fn test_hash_with_pepper() {
        let password = ClearTextPassword::new_unchecked("TestPassword823!".to_string());
        let pepper = b"my_secret_pepper";
        let hashed = password.hash(Some(pepper), HashingCost::default()).unwrap();

        // Correct password with correct pepper
        assert!(hashed.verify(&password, Some(pepper)));

        // Correct password without pepper should fail
        assert!(!hashed.verify(&password, None));

        // Correct password with wrong pepper should fail
        assert!(!hashed.verify(&password, Some(b"wrong_pepper")));
    }

    #[test]
    fn test_phc_string_roundtrip() {
        let password = ClearTextPassword::new_unchecked("TestPassword823!".to_string());
        let hashed = password.hash(None, HashingCost::default()).unwrap();

        let phc_string = hashed.as_phc_string().to_string();
        let restored = HashedPassword::from_phc_string(phc_string).unwrap();

        assert!(restored.verify(&password, None));
    }

    #[test]
    fn test_invalid_phc_string() {
        let result = HashedPassword::from_phc_string("not_a_valid_hash");
        assert!(result.is_err());
    }

    #[test]
    fn test_needs_rehash_on_cost_change() {
        let password = ClearTextPassword::new_unchecked("TestPassword823!".to_string());

        let low_cost = HashingCost {
            memory_kib: 8192,
            iterations: 1,
            parallelism: 1,
        };
        let hashed = password.hash(None, low_cost).unwrap();

        assert!(!hashed.needs_rehash(low_cost));
        assert!(hashed.needs_rehash(HashingCost::default()));
    }

    #[test]
    fn test_debug_redaction() {
        let password = ClearTextPassword::new_unchecked("secret".to_string());
        let debug_output = format!("{:?}", password);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("secret"));
    }
}
