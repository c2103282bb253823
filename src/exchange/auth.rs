//! API credentials and request signing for private exchange endpoints.
//!
//! Only the currency/network metadata endpoints of Bybit, OKX and MEXC are
//! signed. Every scheme is HMAC-SHA256 over an exchange-specific pre-hash
//! string; they differ in how the digest is encoded.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::AdapterError;

type HmacSha256 = Hmac<Sha256>;

/// `recvWindow` sent with Bybit and MEXC signed requests, in ms.
pub const RECV_WINDOW_MS: &str = "5000";

/// API key material for one exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
    /// OKX only.
    pub passphrase: Option<String>,
}

impl ApiCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }
}

// Keep secrets out of logs and `{:?}` dumps.
impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn digest(secret: &str, message: &str) -> Result<Vec<u8>, AdapterError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AdapterError::Unauthorized(format!("invalid secret: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Lowercase hex HMAC-SHA256, as Bybit and MEXC expect.
pub fn sign_hex(secret: &str, message: &str) -> Result<String, AdapterError> {
    Ok(hex::encode(digest(secret, message)?))
}

/// Base64 HMAC-SHA256, as OKX expects.
pub fn sign_base64(secret: &str, message: &str) -> Result<String, AdapterError> {
    Ok(STANDARD.encode(digest(secret, message)?))
}

/// Unix time in milliseconds.
pub fn timestamp_millis(at: OffsetDateTime) -> String {
    (at.unix_timestamp_nanos() / 1_000_000).to_string()
}

/// `OK-ACCESS-TIMESTAMP` value for `at`: ISO-8601 UTC with milliseconds.
pub fn okx_timestamp(at: OffsetDateTime) -> Result<String, AdapterError> {
    at.to_offset(time::UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
        .map_err(|e| AdapterError::Unauthorized(format!("timestamp: {}", e)))
}
