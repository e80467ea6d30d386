//! Compact signed-token codec.
//!
//! Self-contained HS256 JWT: `base64url(header) . base64url(claims) .
//! base64url(hmac_sha256(header . claims))`. No registry of claim types;
//! callers bring their own claims struct.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid secret")]
    InvalidSecret,
    #[error("invalid claims")]
    InvalidClaims,
}

/// Claim types carry their own fields; the codec only needs the timestamps.
pub trait TokenClaims {
    fn issued_at(&self) -> i64;
    fn expires_at(&self) -> i64;
    fn set_issued_at(&mut self, iat: i64);
    fn set_expires_at(&mut self, exp: i64);
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Stateless generate/validate over a shared HMAC secret.
#[derive(Clone, Debug)]
pub struct TokenCodec {
    secret: String,
}

impl TokenCodec {
    /// Fails on an empty secret; secrets are never defaulted.
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }
        Ok(Self {
            secret: secret.to_string(),
        })
    }

    /// Sign `claims` with the given lifetime. Sets `iat`/`exp` on the
    /// caller's claims so the caller sees exactly what was signed.
    pub fn generate<C>(&self, claims: &mut C, ttl: Duration) -> Result<String, TokenError>
    where
        C: TokenClaims + Serialize,
    {
        if ttl <= Duration::zero() {
            return Err(TokenError::InvalidClaims);
        }

        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };

        let now = Utc::now();
        claims.set_issued_at(now.timestamp());
        claims.set_expires_at((now + ttl).timestamp());

        let header_json = serde_json::to_vec(&header).map_err(|_| TokenError::InvalidClaims)?;
        let claims_json = serde_json::to_vec(claims).map_err(|_| TokenError::InvalidClaims)?;

        let message = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&message));

        Ok(format!("{}.{}", message, signature))
    }

    /// Verify signature and expiry, then decode the claims segment.
    pub fn validate<C>(&self, token: &str) -> Result<C, TokenError>
    where
        C: TokenClaims + DeserializeOwned,
    {
        if token.is_empty() {
            return Err(TokenError::InvalidToken);
        }

        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(TokenError::InvalidToken);
        }

        let message = format!("{}.{}", parts[0], parts[1]);
        let expected = URL_SAFE_NO_PAD.encode(self.sign(&message));

        // Signature check happens before any claims decoding, in constant time.
        let expected = expected.as_bytes();
        let presented = parts[2].as_bytes();
        if expected.len() != presented.len() || !bool::from(expected.ct_eq(presented)) {
            return Err(TokenError::InvalidSignature);
        }

        // Past the signature check, a bad claims segment is a claims
        // problem, whether the base64 or the JSON is at fault.
        let claims_json = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| TokenError::InvalidClaims)?;
        let claims: C =
            serde_json::from_slice(&claims_json).map_err(|_| TokenError::InvalidClaims)?;

        if Utc::now().timestamp() > claims.expires_at() {
            return Err(TokenError::TokenExpired);
        }

        Ok(claims)
    }

    fn sign(&self, message: &str) -> Vec<u8> {
        // Key length is unrestricted for HMAC; new_from_slice cannot fail.
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}
