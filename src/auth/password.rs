use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use tracing::error;

lazy_static! {
    static ref DUMMY_HASH: String = unusable_hash().unwrap_or_default();
}

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Length rule for new passwords, counted in characters.
pub fn check_length(plain: &str) -> Result<(), &'static str> {
    let len = plain.chars().count();
    if len < MIN_PASSWORD_LEN {
        Err("Password must be at least 8 characters")
    } else if len > MAX_PASSWORD_LEN {
        Err("Password is too long (max 128 characters)")
    } else {
        Ok(())
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Argon2 verification; the digest comparison is constant-time.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Hash of a random secret nobody keeps, for accounts that must never
/// pass a password check.
pub fn unusable_hash() -> anyhow::Result<String> {
    let mut secret = [0u8; 16];
    OsRng.fill_bytes(&mut secret);
    hash_password(&to_hex(&secret))
}

/// Spend one Argon2 verification on a hash nobody can match, so a login
/// for an unknown or guest account costs as much as a wrong password.
pub fn verify_dummy(plain: &str) -> bool {
    verify_password(plain, &DUMMY_HASH).unwrap_or(false)
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
