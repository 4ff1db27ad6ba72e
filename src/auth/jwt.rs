//! Farmer session tokens
//!
//! HS256 JWTs whose `id` claim is the farmer's ObjectId in hex. Expiry
//! comes from `JWT_EXPIRY_SECONDS` (7 days by default).

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MIN_JWT_SECRET_LEN;
use crate::types::{FarmError, Result};

const DEV_SECRET: &str = "farmnet-development-secret-change-me-0001";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Farmer ObjectId (hex)
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and checks session tokens
#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: i64,
}

impl JwtValidator {
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(FarmError::Config(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }
        Ok(Self::with_secret(secret.as_bytes(), expiry_seconds))
    }

    /// Fixed secret for dev mode; tokens survive restarts
    pub fn new_dev(expiry_seconds: u64) -> Self {
        Self::with_secret(DEV_SECRET.as_bytes(), expiry_seconds)
    }

    fn with_secret(secret: &[u8], expiry_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiry_seconds: i64::try_from(expiry_seconds).unwrap_or(i64::MAX),
        }
    }

    pub fn generate_token(&self, farmer_id: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            id: farmer_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.expiry_seconds),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| FarmError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Decode a token; any failure is a 401 "Token is not valid"
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(kind = ?e.kind(), "Rejected bearer token");
                FarmError::from(e)
            })
    }
}

/// Token from an `Authorization` value: `Bearer <jwt>`, or a bare token
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?.trim_start();
    // Strip the scheme before trimming, so "Bearer " alone yields no token
    let token = match header.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(' ') => rest,
        _ => header,
    }
    .trim();
    (!token.is_empty() && !token.contains(' ')).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FARMER: &str = "65f0c2a1b2c3d4e5f6a7b8c9";

    fn validator(expiry: u64) -> JwtValidator {
        JwtValidator::new("a-farmnet-test-secret-of-32-chars!!".into(), expiry).unwrap()
    }

    #[test]
    fn test_token_carries_farmer_id() {
        let v = validator(3600);
        let claims = v.verify_token(&v.generate_token(FARMER).unwrap()).unwrap();
        assert_eq!(claims.id, FARMER);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_secret_length_enforced() {
        assert!(matches!(
            JwtValidator::new("short".into(), 60),
            Err(FarmError::Config(_))
        ));
    }

    #[test]
    fn test_foreign_and_garbage_tokens_rejected() {
        let token = validator(3600).generate_token(FARMER).unwrap();
        let dev = JwtValidator::new_dev(3600);

        let err = dev.verify_token(&token).unwrap_err();
        assert!(matches!(err, FarmError::Unauthorized(ref m) if m == "Token is not valid"));
        assert!(dev.verify_token("not.a.jwt").is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(Some("abc123")), Some("abc123"));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic a b")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn test_bearer_scheme_without_token() {
        assert_eq!(bearer_token(Some("Bearer")), None);
        assert_eq!(bearer_token(Some("  Bearer   ")), None);
        assert_eq!(bearer_token(Some("Bearer   abc123  ")), Some("abc123"));
        assert_eq!(bearer_token(Some("Bearerabc123")), Some("Bearerabc123"));
    }
}
