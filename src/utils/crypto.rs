// Sealing primitive for session cookies and random nonce generation

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use thiserror::Error;

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Encryption key size for AES-256 (256 bits)
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Per-token salt size used to derive the sealing key
pub const SALT_SIZE: usize = 16;

/// Byte length of OIDC nonces issued on login
pub const LOGIN_NONCE_SIZE: usize = 32;

/// Version prefix of sealed tokens
pub const SEAL_VERSION: &str = "sc1";

type HmacSha256 = Hmac<Sha256>;

/// Failures reported by [`seal_data`] and [`unseal_data`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SealError {
    #[error("sealing secret must not be empty")]
    EmptySecret,
    #[error("sealed token is malformed")]
    Malformed,
    #[error("unsupported seal version: {0}")]
    UnsupportedVersion(String),
    #[error("sealed token has expired")]
    Expired,
    #[error("sealed token failed integrity check")]
    Tampered,
    #[error("failed to serialize sealed payload: {0}")]
    Serialization(String),
    #[error("encryption failed")]
    Encryption,
    #[error("expiry is out of range")]
    ExpiryOutOfRange,
}

/// Generate a cryptographically secure nonce of specified byte length
///
/// # Returns
///
/// A base64url-encoded string representing the specified bytes of random data
#[must_use]
pub fn generate_nonce(length: usize) -> String {
    let mut nonce = vec![0u8; length];
    rand::rng().fill_bytes(&mut nonce);
    general_purpose::URL_SAFE_NO_PAD.encode(nonce)
}

/// Generate the nonce bound to a single login attempt
#[must_use]
pub fn generate_login_nonce() -> String {
    generate_nonce(LOGIN_NONCE_SIZE)
}

/// Seal any serializable payload into an encrypted, expiring token
///
/// The token layout is `sc1.<salt>.<expires_ms>.<nonce+ciphertext>`. The key is
/// derived from the secret and a random salt, and the header is bound to the
/// ciphertext as associated data so the expiry cannot be altered.
///
/// A `ttl` of `None` produces a token that never expires.
///
/// # Errors
///
/// Returns an error if:
/// - The secret is empty
/// - Serialization fails
/// - AES encryption fails
/// - `now + ttl` is not a representable date
pub fn seal_data<T: Serialize>(
    data: &T,
    secret: &str,
    ttl: Option<Duration>,
) -> Result<String, SealError> {
    let expires_at_ms = match ttl {
        Some(ttl) => Utc::now()
            .checked_add_signed(ttl)
            .ok_or(SealError::ExpiryOutOfRange)?
            .timestamp_millis(),
        None => 0,
    };
    seal_data_until(data, secret, expires_at_ms)
}

/// Seal a payload with an absolute expiry in milliseconds since epoch (`0` = never)
///
/// # Errors
///
/// Returns the same errors as [`seal_data`]
pub fn seal_data_until<T: Serialize>(
    data: &T,
    secret: &str,
    expires_at_ms: i64,
) -> Result<String, SealError> {
    if secret.is_empty() {
        return Err(SealError::EmptySecret);
    }

    let json_data =
        serde_json::to_vec(data).map_err(|e| SealError::Serialization(e.to_string()))?;

    let mut salt = [0u8; SALT_SIZE];
    rand::rng().fill_bytes(&mut salt);
    let salt_b64 = general_purpose::URL_SAFE_NO_PAD.encode(salt);
    let header = format!("{SEAL_VERSION}.{salt_b64}.{expires_at_ms}");

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let key = derive_sealing_key(secret, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &json_data,
                aad: header.as_bytes(),
            },
        )
        .map_err(|_| SealError::Encryption)?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!(
        "{header}.{}",
        general_purpose::URL_SAFE_NO_PAD.encode(&combined)
    ))
}

/// Open a token produced by [`seal_data`] and deserialize its payload
///
/// # Errors
///
/// Returns an error if:
/// - The secret is empty
/// - The token is not in the sealed format or uses an unknown version
/// - The token was sealed with another secret or was modified
/// - The token's expiry has passed
/// - The payload does not deserialize into `T`
pub fn unseal_data<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, SealError> {
    if secret.is_empty() {
        return Err(SealError::EmptySecret);
    }

    let parts: Vec<&str> = token.split('.').collect();
    let [version, salt_b64, expires_str, sealed_b64] = parts.as_slice() else {
        return Err(SealError::Malformed);
    };

    if *version != SEAL_VERSION {
        return Err(SealError::UnsupportedVersion((*version).to_string()));
    }

    let salt = general_purpose::URL_SAFE_NO_PAD
        .decode(salt_b64)
        .map_err(|_| SealError::Malformed)?;
    let expires_at_ms: i64 = expires_str.parse().map_err(|_| SealError::Malformed)?;
    let combined = general_purpose::URL_SAFE_NO_PAD
        .decode(sealed_b64)
        .map_err(|_| SealError::Malformed)?;

    if combined.len() < NONCE_SIZE {
        return Err(SealError::Malformed);
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
    let header = format!("{version}.{salt_b64}.{expires_str}");

    let key = derive_sealing_key(secret, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: header.as_bytes(),
            },
        )
        .map_err(|_| SealError::Tampered)?;

    if expires_at_ms != 0 && expires_at_ms <= Utc::now().timestamp_millis() {
        return Err(SealError::Expired);
    }

    serde_json::from_slice(&plaintext).map_err(|e| SealError::Serialization(e.to_string()))
}

/// Derive the per-token AES-256 key as HMAC-SHA256(secret, salt)
fn derive_sealing_key(secret: &str, salt: &[u8]) -> Result<[u8; ENCRYPTION_KEY_SIZE], SealError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).map_err(|_| SealError::EmptySecret)?;
    mac.update(salt);

    let mut key = [0u8; ENCRYPTION_KEY_SIZE];
    key.copy_from_slice(&mac.finalize().into_bytes());
    Ok(key)
}
