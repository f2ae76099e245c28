use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::store::Identity;

// Compact JWS: base64url(header) "." base64url(claims) "." base64url(HMAC-SHA256)

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of an issued session token.
pub const TOKEN_TTL_SECS: i64 = 3600;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub role: String,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Reasons a token is invalid. Only ever logged; callers of the session
/// resolver see an anonymous context instead.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("unsupported algorithm: {0}")]
    Algorithm(String),
    #[error("signature mismatch")]
    Signature,
    #[error("token expired at {exp}")]
    Expired { exp: i64 },
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Issues and verifies HS256 session tokens with one process-wide secret.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now().timestamp())
    }

    /// Issue a token as if the current unix time were `now`.
    pub fn issue_at(&self, identity: &Identity, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            user_id: identity.id,
            role: identity.role.as_str().to_string(),
            exp: now + TOKEN_TTL_SECS,
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            general_purpose::URL_SAFE_NO_PAD.encode(header_json),
            general_purpose::URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.signature(signing_input.as_bytes());
        Ok(format!(
            "{}.{}",
            signing_input,
            general_purpose::URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify signature and expiry as if the current unix time were `now`.
    /// No other claim is checked.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed("expected three segments"));
        };

        let header_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Malformed("header encoding"))?;
        let header: Header = serde_json::from_slice(&header_bytes)
            .map_err(|_| TokenError::Malformed("header json"))?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Algorithm(header.alg));
        }

        let provided = general_purpose::URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed("signature encoding"))?;
        let signing_input_len = header_b64.len() + 1 + claims_b64.len();
        let expected = self.signature(&token.as_bytes()[..signing_input_len]);
        if provided.ct_eq(expected.as_slice()).unwrap_u8() != 1 {
            return Err(TokenError::Signature);
        }

        let claims_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::Malformed("claims encoding"))?;
        let claims: Claims = serde_json::from_slice(&claims_bytes)
            .map_err(|_| TokenError::Malformed("claims json"))?;

        if now > claims.exp {
            return Err(TokenError::Expired { exp: claims.exp });
        }
        Ok(claims)
    }

    fn signature(&self, input: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}
