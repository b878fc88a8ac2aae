//! Credentials: password policy, Argon2id password hashing, signed session
//! tokens and password-reset tokens.
//!
//! Session token layout:
//!
//! ```text
//! base64url("<user_id>.<expires_at_secs>") "." base64url(HMAC-SHA256(secret, first part))
//! ```

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Characters a password may contain besides ASCII letters and digits.
const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// Minimum password length.
const MIN_PASSWORD_LEN: usize = 8;

/// Random bytes in a password-reset token (hex-encoded → 40 chars).
const RESET_TOKEN_BYTES: usize = 20;

// ── Password Policy ───────────────────────────────────────────────────────────

/// Check a password against the policy: at least 8 characters drawn from
/// letters, digits and `@$!%*?&`, with at least one lowercase letter, one
/// uppercase letter, one digit and one special character.
pub fn validate_password(password: &str) -> Result<()> {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));

    let ok = allowed
        && password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if ok {
        Ok(())
    } else {
        Err(Error::WeakPassword)
    }
}

// ── Password Hashing ──────────────────────────────────────────────────────────

/// Hash a password with Argon2id and a random salt. Returns a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| Error::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Fresh password-reset token.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ── Session Tokens ────────────────────────────────────────────────────────────

/// Issues and verifies HMAC-signed session tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
        }
    }

    /// Signer with a random per-process secret. Tokens do not survive a
    /// restart.
    pub fn with_random_secret(ttl_secs: i64) -> Self {
        let mut secret = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self::new(secret, ttl_secs)
    }

    /// Issue a token for `user_id`, valid for the configured TTL.
    pub fn issue(&self, user_id: &str) -> Result<String> {
        self.issue_at(user_id, chrono::Utc::now().timestamp())
    }

    fn issue_at(&self, user_id: &str, now_secs: i64) -> Result<String> {
        let expires_at = now_secs + self.ttl_secs;
        let payload = URL_SAFE_NO_PAD.encode(format!("{}.{}", user_id, expires_at));
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes())?);
        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify a token and return the user ID it was issued to.
    pub fn verify(&self, token: &str) -> Result<String> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now_secs: i64) -> Result<String> {
        let (payload, signature) = token.split_once('.').ok_or(Error::InvalidToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| Error::InvalidToken)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::InvalidToken)?;

        let decoded = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| Error::InvalidToken)?;
        let decoded = String::from_utf8(decoded).map_err(|_| Error::InvalidToken)?;
        let (user_id, expires_at) = decoded.rsplit_once('.').ok_or(Error::InvalidToken)?;
        let expires_at: i64 = expires_at.parse().map_err(|_| Error::InvalidToken)?;

        if expires_at <= now_secs || user_id.is_empty() {
            return Err(Error::InvalidToken);
        }

        Ok(user_id.to_string())
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| Error::Internal(e.to_string()))
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
