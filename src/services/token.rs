//! Proof-of-presence tokens.
//!
//! A token authorizes exactly one `(event, user, action)` triple. It carries
//! its payload in clear and an HMAC-SHA256 tag over the canonical JSON of
//! that payload:
//!
//! ```text
//! base64url( {"payload":{"eventId":..,"userId":..,"action":"CHECKIN","issuedAt":..},"signature":"<base64url mac>"} )
//! ```
//!
//! Verification recomputes the tag over the re-serialized payload, so any
//! change to the fields is caught even if the JSON around them is still
//! well formed. The codec never touches the store.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use crate::config::{validation::validate_token_config, TokenConfig};
use crate::models::ScanAction;
use crate::utils::clock::SharedClock;
use crate::utils::errors::{QrMarkError, Result, TokenError, TokenResult};

type HmacSha256 = Hmac<Sha256>;

/// Signed content of a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenPayload {
    pub event_id: i64,
    pub user_id: i64,
    pub action: ScanAction,
    /// Unix seconds
    pub issued_at: i64,
}

impl TokenPayload {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.issued_at, 0)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    payload: TokenPayload,
    signature: String,
}

#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
    ttl: Duration,
    max_skew: Duration,
    clock: SharedClock,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .field("max_skew", &self.max_skew)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: &TokenConfig, clock: SharedClock) -> Result<Self> {
        validate_token_config(config)?;

        let mac = HmacSha256::new_from_slice(config.secret.as_bytes())
            .map_err(|e| QrMarkError::Config(format!("Invalid token secret: {}", e)))?;

        Ok(Self {
            mac,
            ttl: Duration::seconds(config.ttl_seconds as i64),
            max_skew: Duration::seconds(config.max_clock_skew_seconds as i64),
            clock,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token stamped with the current time
    pub fn issue(&self, event_id: i64, user_id: i64, action: ScanAction) -> Result<String> {
        self.issue_at(event_id, user_id, action, self.clock.now())
    }

    pub fn issue_at(&self, event_id: i64, user_id: i64, action: ScanAction, now: DateTime<Utc>) -> Result<String> {
        let payload = TokenPayload {
            event_id,
            user_id,
            action,
            issued_at: now.timestamp(),
        };

        let signature = URL_SAFE_NO_PAD.encode(self.sign(&serde_json::to_vec(&payload)?));
        let envelope = serde_json::to_vec(&Envelope { payload, signature })?;

        debug!(event_id, user_id, action = %action, "Issued attendance token");
        Ok(URL_SAFE_NO_PAD.encode(envelope))
    }

    /// Verify a token against the current time
    pub fn verify(&self, token: &str) -> TokenResult<TokenPayload> {
        self.verify_at(token, self.clock.now())
    }

    /// Decode, authenticate and age-check a token. Pure and repeatable.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> TokenResult<TokenPayload> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| TokenError::Malformed(format!("invalid base64: {}", e)))?;
        let envelope: Envelope = serde_json::from_slice(&raw)
            .map_err(|e| TokenError::Malformed(format!("invalid token body: {}", e)))?;
        let presented = URL_SAFE_NO_PAD
            .decode(&envelope.signature)
            .map_err(|e| TokenError::Malformed(format!("invalid signature encoding: {}", e)))?;

        let canonical = serde_json::to_vec(&envelope.payload)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let expected = self.sign(&canonical);
        let authentic: bool = expected.as_slice().ct_eq(presented.as_slice()).into();
        if !authentic {
            return Err(TokenError::InvalidSignature);
        }

        let age = now.timestamp() - envelope.payload.issued_at;
        if age > self.ttl.num_seconds() || -age > self.max_skew.num_seconds() {
            return Err(TokenError::Expired {
                age_seconds: age,
                ttl_seconds: self.ttl.num_seconds(),
            });
        }

        Ok(envelope.payload)
    }

    fn sign(&self, bytes: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(bytes);
        mac.finalize().into_bytes().to_vec()
    }
}
