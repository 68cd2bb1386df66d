//! Backup Code Value Object
//!
//! Single-use recovery codes for accounts with two-factor
//! authentication. Plaintext codes are shown to the user exactly once
//! at generation; only SHA-256 digests are persisted. Each code is
//! consumable exactly once, and consumption removes exactly the
//! matched entry from the stored list.

use platform::crypto::{constant_time_eq, sha256, to_base64};
use rand::Rng;

/// Number of codes issued per generation
pub const BACKUP_CODE_COUNT: usize = 10;

/// Length of a code in characters, before display formatting
pub const BACKUP_CODE_LENGTH: usize = 8;

/// Code alphabet. Excludes I, O, 0 and 1 to keep codes unambiguous
/// when read aloud or typed from paper.
const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Result of a backup-code generation
///
/// `display` holds the one-time plaintext presentation; `hashed` is
/// what gets stored on the user record.
#[derive(Debug, Clone)]
pub struct GeneratedBackupCodes {
    pub display: Vec<String>,
    pub hashed: Vec<String>,
}

/// Generate a fresh set of backup codes
pub fn generate() -> GeneratedBackupCodes {
    let mut rng = rand::rng();
    let mut display = Vec::with_capacity(BACKUP_CODE_COUNT);
    let mut hashed = Vec::with_capacity(BACKUP_CODE_COUNT);

    for _ in 0..BACKUP_CODE_COUNT {
        let code: String = (0..BACKUP_CODE_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..BACKUP_CODE_ALPHABET.len());
                BACKUP_CODE_ALPHABET[idx] as char
            })
            .collect();

        hashed.push(hash_code(&code));
        display.push(format_for_display(&code));
    }

    GeneratedBackupCodes { display, hashed }
}

/// Normalize a submitted code
///
/// Users type codes back with or without the display hyphen, in any
/// case. Strip separators and uppercase before hashing.
pub fn normalize(code: &str) -> String {
    code.chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect::<String>()
        .to_uppercase()
}

/// Hash a code for storage or comparison
pub fn hash_code(code: &str) -> String {
    let digest = sha256(normalize(code).as_bytes());
    to_base64(&digest)
}

/// Format a raw code as "XXXX-XXXX" for one-time display
fn format_for_display(code: &str) -> String {
    let (head, tail) = code.split_at(BACKUP_CODE_LENGTH / 2);
    format!("{}-{}", head, tail)
}

/// Find the stored entry matching a submitted code
///
/// Hashes the submission once, then runs a constant-time comparison
/// against every stored digest. Returns the matched stored entry so
/// the caller can remove exactly that one.
pub fn find_match(submitted: &str, hashed_list: &[String]) -> Option<String> {
    let submitted_hash = hash_code(submitted);

    hashed_list
        .iter()
        .find(|stored| constant_time_eq(submitted_hash.as_bytes(), stored.as_bytes()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let codes = generate();
        assert_eq!(codes.display.len(), BACKUP_CODE_COUNT);
        assert_eq!(codes.hashed.len(), BACKUP_CODE_COUNT);

        for display in &codes.display {
            // "XXXX-XXXX"
            assert_eq!(display.len(), BACKUP_CODE_LENGTH + 1);
            assert_eq!(display.chars().nth(4), Some('-'));
            assert!(
                display
                    .chars()
                    .filter(|c| *c != '-')
                    .all(|c| BACKUP_CODE_ALPHABET.contains(&(c as u8)))
            );
        }
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = generate();
        let mut hashed = codes.hashed.clone();
        hashed.sort();
        hashed.dedup();
        assert_eq!(hashed.len(), BACKUP_CODE_COUNT);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("abcd-efgh"), "ABCDEFGH");
        assert_eq!(normalize("ABCD EFGH"), "ABCDEFGH");
        assert_eq!(normalize("AbCdEfGh"), "ABCDEFGH");
    }

    #[test]
    fn test_display_code_matches_its_hash() {
        let codes = generate();

        // The displayed form (with hyphen) must hash to the stored entry
        for (display, stored) in codes.display.iter().zip(&codes.hashed) {
            assert_eq!(&hash_code(display), stored);
        }
    }

    #[test]
    fn test_find_match_returns_exact_entry() {
        let codes = generate();
        let submitted = codes.display[3].clone();

        let matched = find_match(&submitted, &codes.hashed);
        assert_eq!(matched.as_deref(), Some(codes.hashed[3].as_str()));
    }

    #[test]
    fn test_find_match_rejects_unknown_code() {
        let codes = generate();
        assert!(find_match("ZZZZ-ZZZZ", &codes.hashed).is_none());
    }
}
