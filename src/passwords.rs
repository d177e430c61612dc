/*!
Argon2 password hashing and the registration strength policy.

Hashes are stored as PHC strings, which carry their own salt and parameters.
*/
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::{ServiceError, ServiceResult};

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "passw0rd",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "welcome1",
    "letmein1",
    "trustno1",
    "admin123",
    "abc12345",
    "superman",
    "starwars",
    "whatever",
    "computer",
    "internet",
    "students",
    "attendance",
];

pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Hashing(e.to_string()))
}

/// False for a wrong password and for a stored hash that does not parse.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(h) => h,
        Err(e) => {
            log::warn!("Stored password hash is unreadable: {}", &e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Returns one message per violated rule; an empty list means the password
/// is acceptable.
pub fn strength_violations(password: &str, username: &str, min_length: usize) -> Vec<String> {
    let mut out = Vec::new();

    if password.chars().count() < min_length {
        out.push(format!(
            "This password is too short. It must contain at least {} characters.",
            min_length
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        out.push("This password is entirely numeric.".to_string());
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        out.push("This password is too common.".to_string());
    }
    let uname = username.trim().to_lowercase();
    if uname.chars().count() >= 3
        && !lowered.is_empty()
        && (lowered.contains(&uname) || uname.contains(&lowered))
    {
        out.push("The password is too similar to the username.".to_string());
    }

    out
}
