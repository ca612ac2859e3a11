//! Request signing for the private exchange endpoints

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{EngineError, EngineResult};

type HmacSha256 = Hmac<Sha256>;

/// Seconds added to the clock when deriving a nonce
pub const NONCE_OFFSET_SECS: u64 = 300;

/// Exchange account credentials
#[derive(Clone)]
pub struct Credentials {
    pub user_id: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Load credentials from environment variables
    ///
    /// Expects:
    /// - `CEX_USER_ID` - account user id
    /// - `CEX_API_KEY` - API key
    /// - `CEX_API_SECRET` - API secret
    pub fn from_env() -> Result<Self> {
        let user_id = std::env::var("CEX_USER_ID").context("CEX_USER_ID environment variable not set")?;
        let api_key = std::env::var("CEX_API_KEY").context("CEX_API_KEY environment variable not set")?;
        let api_secret =
            std::env::var("CEX_API_SECRET").context("CEX_API_SECRET environment variable not set")?;
        Ok(Self {
            user_id,
            api_key,
            api_secret,
        })
    }

    /// Signature of `nonce` for these credentials
    pub fn sign_nonce(&self, nonce: u64) -> EngineResult<String> {
        let message = format!("{}{}{}", nonce, self.user_id, self.api_key);
        sign(&message, &self.api_secret)
    }
}

/// HMAC-SHA256 of `message` keyed by `secret`, as 64 uppercase hex characters
pub fn sign(message: &str, secret: &str) -> EngineResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| EngineError::logic(format!("signing key rejected: {e}")))?;
    mac.update(message.as_bytes());
    let digest = mac.finalize().into_bytes();

    let mut signature = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        signature.push_str(&format!("{:02X}", byte));
    }
    Ok(signature)
}

/// Strictly increasing nonces derived from the wall clock
#[derive(Debug, Default)]
pub struct NonceSource {
    last: AtomicU64,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unix seconds plus the offset, bumped past the previous nonce if needed
    pub fn next(&self) -> u64 {
        let now = chrono::Utc::now().timestamp().max(0) as u64 + NONCE_OFFSET_SECS;
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}
