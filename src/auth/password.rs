/// Credential Hasher
///
/// Password strength policy, bcrypt hashing/verification, and random
/// password generation for administrative resets. The bcrypt hash string is
/// self-describing (algorithm tag, cost, salt and digest in one string), so
/// the cost factor can be tuned without breaking stored hashes.

use bcrypt::{hash, verify};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

use crate::configuration::PasswordSettings;
use crate::error::AppError;

const MAX_PASSWORD_LENGTH: usize = 128;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}";

/// Result of a password policy check. `errors` lists every violated rule so
/// a client can show all problems at once.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PasswordCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Check a candidate password against the strength policy.
pub fn validate_password(candidate: &str, settings: &PasswordSettings) -> PasswordCheck {
    let mut errors = Vec::new();

    if candidate.len() < settings.min_length {
        errors.push(format!(
            "must be at least {} characters long",
            settings.min_length
        ));
    }
    if candidate.len() > MAX_PASSWORD_LENGTH {
        errors.push(format!(
            "must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        ));
    }
    if !candidate.chars().any(|c| c.is_uppercase()) {
        errors.push("must contain at least one uppercase letter".to_string());
    }
    if !candidate.chars().any(|c| c.is_lowercase()) {
        errors.push("must contain at least one lowercase letter".to_string());
    }
    if !candidate.chars().any(|c| c.is_numeric()) {
        errors.push("must contain at least one digit".to_string());
    }
    if !candidate
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        errors.push("must contain at least one symbol".to_string());
    }

    PasswordCheck {
        valid: errors.is_empty(),
        errors,
    }
}

/// Hash a password with bcrypt at the configured cost.
///
/// # Errors
/// Hashing failure is surfaced to the caller; it indicates broken
/// configuration, not bad input.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored bcrypt hash.
///
/// Malformed hash input yields `false`, never an error; the caller sees the
/// same outcome as a wrong password.
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

/// Generate a random password that satisfies every strength rule.
/// Used for administrative resets. Lengths below 8 are raised to 8.
pub fn generate_random_password(length: usize) -> String {
    let length = length.max(8);
    let mut rng = thread_rng();

    // One guaranteed character per required class, the rest drawn from all.
    let mut chars: Vec<char> = vec![
        UPPERCASE[rng.gen_range(0..UPPERCASE.len())] as char,
        LOWERCASE[rng.gen_range(0..LOWERCASE.len())] as char,
        DIGITS[rng.gen_range(0..DIGITS.len())] as char,
        SYMBOLS[rng.gen_range(0..SYMBOLS.len())] as char,
    ];

    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS].concat();
    for _ in chars.len()..length {
        chars.push(all[rng.gen_range(0..all.len())] as char);
    }
    chars.shuffle(&mut rng);

    chars.into_iter().collect()
}
