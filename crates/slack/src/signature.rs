//! Slack request signing (`X-Slack-Signature` / `X-Slack-Request-Timestamp`).

use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_VERSION: &str = "v0";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("request timestamp `{0}` is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("request timestamp is {skew_secs}s away from server time")]
    StaleTimestamp { skew_secs: i64 },
    #[error("request signature does not match")]
    SignatureMismatch,
    #[error("signing secret cannot be used as an hmac key")]
    InvalidSecret,
}

#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    signing_secret: SecretString,
    max_skew: Duration,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString, max_skew: Duration) -> Self {
        Self { signing_secret, max_skew }
    }

    /// Checks freshness first, then the HMAC. `now` is unix seconds.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<(), VerificationError> {
        // Slack signs the header exactly as sent; trimming is only for parsing.
        let timestamp = timestamp
            .filter(|value| !value.trim().is_empty())
            .ok_or(VerificationError::MissingHeader(TIMESTAMP_HEADER))?;
        let sent_at = timestamp
            .trim()
            .parse::<i64>()
            .map_err(|_| VerificationError::InvalidTimestamp(timestamp.to_owned()))?;

        let skew_secs = now.saturating_sub(sent_at).saturating_abs();
        let max_skew = i64::try_from(self.max_skew.as_secs()).unwrap_or(i64::MAX);
        if skew_secs > max_skew {
            return Err(VerificationError::StaleTimestamp { skew_secs });
        }

        let provided = signature
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(VerificationError::MissingHeader(SIGNATURE_HEADER))?;

        let expected = compute_signature(&self.signing_secret, timestamp, body)?;
        if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
            Ok(())
        } else {
            Err(VerificationError::SignatureMismatch)
        }
    }
}

/// Returns `v0=<hex hmac-sha256>` over `v0:{timestamp}:{body}`.
pub fn compute_signature(
    signing_secret: &SecretString,
    timestamp: &str,
    body: &[u8],
) -> Result<String, VerificationError> {
    let mut base = Vec::with_capacity(SIGNATURE_VERSION.len() + timestamp.len() + body.len() + 2);
    base.extend_from_slice(SIGNATURE_VERSION.as_bytes());
    base.push(b':');
    base.extend_from_slice(timestamp.as_bytes());
    base.push(b':');
    base.extend_from_slice(body);

    let mut mac = HmacSha256::new_from_slice(signing_secret.expose_secret().as_bytes())
        .map_err(|_| VerificationError::InvalidSecret)?;
    mac.update(&base);
    Ok(format!("{SIGNATURE_VERSION}={}", encode_hex(mac.finalize().into_bytes().as_slice())))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
