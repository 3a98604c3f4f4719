//! Stateless, time-bound signed session tokens.
//!
//! Token layout: `username:timestamp.signature` where the signature is the
//! first 16 characters of Base32(SHA-256(secret ∥ payload)). There is no
//! server-side session table; invalidation is by cookie clearing only.

use std::time::{SystemTime, UNIX_EPOCH};

use data_encoding::BASE32;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::store::Error;

/// Tokens older than this are rejected.
const MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Length of the truncated signature.
const SIG_LEN: usize = 16;

static SECRET: OnceCell<String> = OnceCell::new();

/// Install the process-wide signing secret. Must be called once before the
/// first request; a second call fails with [`Error::SecretAlreadySet`].
pub fn init_secret(secret: impl Into<String>) -> Result<(), Error> {
    SECRET
        .set(secret.into())
        .map_err(|_| Error::SecretAlreadySet)
}

/// Sign a session token for `username` at the current time.
pub fn sign(username: &str) -> Result<String, Error> {
    sign_at(username, unix_now())
}

/// Verify a token's signature (in constant time) and age, returning the
/// embedded username.
pub fn verify(token: &str) -> Result<String, Error> {
    verify_at(token, unix_now())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

fn sign_at(username: &str, now: i64) -> Result<String, Error> {
    let payload = format!("{username}:{now}");
    let sig = signature(&payload)?;
    Ok(format!("{payload}.{sig}"))
}

fn verify_at(token: &str, now: i64) -> Result<String, Error> {
    let (payload, sig) = token.rsplit_once('.').ok_or(Error::Unauthenticated)?;
    let expected = signature(payload)?;
    if expected.as_bytes().ct_eq(sig.as_bytes()).unwrap_u8() != 1 {
        return Err(Error::Unauthenticated);
    }
    let (username, timestamp) = payload.rsplit_once(':').ok_or(Error::Unauthenticated)?;
    let timestamp: i64 = timestamp.parse().map_err(|_| Error::Unauthenticated)?;
    if now - timestamp > MAX_AGE_SECS {
        return Err(Error::Unauthenticated);
    }
    Ok(username.to_string())
}

fn signature(payload: &str) -> Result<String, Error> {
    let secret = SECRET.get().ok_or(Error::SecretNotSet)?;
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(payload.as_bytes());
    let digest = BASE32.encode(&hasher.finalize());
    Ok(digest[..SIG_LEN].to_string())
}
