//! # Loyalty Card Tokens
//!
//! Signed tokens printed as QR codes on a customer's loyalty card.
//!
//! ## Token Format
//! ```text
//! v1.<business_id>.<customer_id>.<expires_unix>.<hex hmac-sha256>
//! └──────────────── signed payload ───────────┘
//! ```
//!
//! A staff scanner verifies the signature (constant time) and then the
//! expiry before the customer is trusted. The clock is passed in by the
//! caller so this module stays free of I/O.
//!
//! ## Usage
//! ```rust
//! use chrono::{Duration, Utc};
//! use perk_core::CardTokenSigner;
//!
//! let signer = CardTokenSigner::new(b"0123456789abcdef0123456789abcdef").unwrap();
//! let now = Utc::now();
//! let token = signer.issue("biz-1", "cust-9", Duration::days(30), now).unwrap();
//!
//! let claims = signer.verify(&token, now).unwrap();
//! assert_eq!(claims.customer_id, "cust-9");
//! ```

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use ts_rs::TS;

type HmacSha256 = Hmac<Sha256>;

/// Current token version prefix.
pub const TOKEN_VERSION: &str = "v1";

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

// =============================================================================
// Errors
// =============================================================================

/// Why a card token could not be issued or was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardTokenError {
    #[error("signing secret must be at least 32 bytes")]
    InvalidSecret,

    /// An id to embed is empty or contains the `.` separator.
    #[error("{field} cannot be embedded in a card token")]
    InvalidSegment { field: &'static str },

    /// `now + ttl` is not a representable time.
    #[error("card token lifetime is out of range")]
    InvalidTtl,

    #[error("malformed card token")]
    Malformed,

    #[error("card token signature does not match")]
    BadSignature,

    #[error("card token expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },
}

// =============================================================================
// Claims
// =============================================================================

/// Identity carried by a verified card token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CardClaims {
    pub business_id: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// Signer
// =============================================================================

/// Issues and verifies card tokens with one business-wide secret.
#[derive(Clone)]
pub struct CardTokenSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CardTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardTokenSigner").finish_non_exhaustive()
    }
}

impl CardTokenSigner {
    /// Creates a signer. Rejects secrets shorter than [`MIN_SECRET_LEN`].
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, CardTokenError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(CardTokenError::InvalidSecret);
        }
        Ok(CardTokenSigner {
            secret: secret.to_vec(),
        })
    }

    /// Issues a token for `customer_id` valid until `now + ttl`.
    pub fn issue(
        &self,
        business_id: &str,
        customer_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, CardTokenError> {
        check_segment("business_id", business_id)?;
        check_segment("customer_id", customer_id)?;

        let expires = now
            .checked_add_signed(ttl)
            .ok_or(CardTokenError::InvalidTtl)?
            .timestamp();
        let payload = format!("{TOKEN_VERSION}.{business_id}.{customer_id}.{expires}");
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Verifies a scanned token at time `now`.
    ///
    /// The signature is checked before the expiry, so a forged token never
    /// learns whether its timestamp would have been accepted.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<CardClaims, CardTokenError> {
        let (payload, signature_hex) = token.rsplit_once('.').ok_or(CardTokenError::Malformed)?;

        let parts: Vec<&str> = payload.split('.').collect();
        let [version, business_id, customer_id, expires] = parts[..] else {
            return Err(CardTokenError::Malformed);
        };
        if version != TOKEN_VERSION || business_id.is_empty() || customer_id.is_empty() {
            return Err(CardTokenError::Malformed);
        }

        let signature = hex::decode(signature_hex).map_err(|_| CardTokenError::Malformed)?;
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| CardTokenError::BadSignature)?;

        let expires_at = expires
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(CardTokenError::Malformed)?;
        if now >= expires_at {
            return Err(CardTokenError::Expired {
                expired_at: expires_at,
            });
        }

        Ok(CardClaims {
            business_id: business_id.to_string(),
            customer_id: customer_id.to_string(),
            expires_at,
        })
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, CardTokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| CardTokenError::InvalidSecret)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

fn check_segment(field: &'static str, value: &str) -> Result<(), CardTokenError> {
    if value.is_empty() || value.contains('.') {
        return Err(CardTokenError::InvalidSegment { field });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
