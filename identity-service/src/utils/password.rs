use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Cleartext credential. The `Debug` impl redacts, so a stray log line
/// can't leak it.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Stored credential digest in PHC string form.
#[derive(Debug, Clone)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub fn new(digest: String) -> Self {
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Derive an Argon2id digest with a fresh random salt.
///
/// The salt and cost parameters travel inside the PHC string, so verification
/// needs no out-of-band state.
pub fn hash_password(password: &Password) -> Result<PasswordDigest, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(PasswordDigest::new(digest.to_string()))
}

/// Check a password against a stored digest.
///
/// The comparison inside argon2 is constant-time. A digest that does not
/// parse counts as a failed verification rather than an error: every
/// negative outcome looks the same to callers.
pub fn verify_password(password: &Password, digest: &PasswordDigest) -> bool {
    let Ok(parsed) = PasswordHash::new(digest.as_str()) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed)
        .is_ok()
}
