//! # JWT Signing Primitive
//!
//! Low-level HS256 JWT encode/decode used by the flow runtime's token
//! builder and validator ([`crate` consumers live in the `flow-runtime`
//! crate's `token` module]).
//!
//! Unlike a fixed-shape `Claims` struct, the flow runtime's access/refresh/
//! ID tokens carry a dynamic, scope- and app-config-driven claim set (see
//! the token builder design), so this module signs and verifies a plain
//! `serde_json::Map<String, Value>` rather than a single claims type.

use crate::errors::ApiError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

/// Signs and verifies JSON claim maps with a single HS256 key.
///
/// Constructed once per signing secret and shared (`Clone`) across the
/// token builder and validator.
#[derive(Clone)]
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Encodes an arbitrary claim map into a compact JWT.
    pub fn encode(&self, claims: &Map<String, Value>) -> Result<String, ApiError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|e| ApiError::InternalError {
            message: format!("failed to sign token: {e}"),
        })
    }

    /// Decodes and verifies a JWT's signature only — issuer, audience, and
    /// time-bound claim checks are the caller's responsibility (the token
    /// validator applies the app-specific trust rules on top of this).
    pub fn decode_unverified_claims(&self, token: &str) -> Result<Map<String, Value>, ApiError> {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                _ => ApiError::InvalidToken,
            },
        )?;

        Ok(data.claims)
    }
}

impl std::fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_a_claim_map() {
        let signer = JwtSigner::new("test_secret_key_minimum_32_chars_required");
        let mut claims = Map::new();
        claims.insert("sub".into(), json!("client-1"));
        claims.insert("exp".into(), json!(9_999_999_999i64));

        let token = signer.encode(&claims).unwrap();
        let decoded = signer.decode_unverified_claims(&token).unwrap();

        assert_eq!(decoded.get("sub"), Some(&json!("client-1")));
    }

    #[test]
    fn rejects_tampered_signature() {
        let signer = JwtSigner::new("test_secret_key_minimum_32_chars_required");
        let other = JwtSigner::new("different_secret_key_minimum_32_characters");
        let mut claims = Map::new();
        claims.insert("sub".into(), json!("client-1"));
        claims.insert("exp".into(), json!(9_999_999_999i64));

        let token = signer.encode(&claims).unwrap();
        assert!(matches!(
            other.decode_unverified_claims(&token),
            Err(ApiError::InvalidToken)
        ));
    }
}
