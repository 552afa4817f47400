//! # Token Validator (C9)

use chrono::Utc;
use serde_json::{Map, Value};
use shared::auth::JwtSigner;
use shared::errors::ApiError;
use std::collections::HashMap;

/// Claims excluded from user-attribute extraction — everything else in the
/// claim map is treated as a released user attribute.
const STANDARD_CLAIMS: &[&str] = &["sub", "iss", "aud", "exp", "nbf", "iat", "jti", "scope", "client_id", "act"];

#[derive(Debug, Clone)]
pub struct RefreshTokenClaims {
    pub access_token_sub: String,
    pub access_token_aud: String,
    pub grant_type: String,
    pub scopes: Vec<String>,
    pub user_attributes: HashMap<String, String>,
    pub issued_at: i64,
}

#[derive(Debug, Clone)]
pub struct SubjectTokenClaims {
    pub subject: String,
    pub audience: String,
    pub scopes: Vec<String>,
    pub user_attributes: HashMap<String, String>,
    pub actor: Option<Value>,
}

pub struct TokenValidator {
    signer: JwtSigner,
    global_issuer: String,
}

impl TokenValidator {
    pub fn new(signer: JwtSigner, global_issuer: impl Into<String>) -> Self {
        Self { signer, global_issuer: global_issuer.into() }
    }

    /// Verifies a refresh token's signature, binds it to the requesting
    /// client (`sub == requesting_client_id`), and checks its own `exp`.
    pub fn validate_refresh_token(
        &self,
        token: &str,
        requesting_client_id: &str,
    ) -> Result<RefreshTokenClaims, ApiError> {
        let claims = self.signer.decode_unverified_claims(token)?;
        check_exp(&claims)?;

        let sub = require_str(&claims, "sub")?;
        if sub != requesting_client_id {
            return Err(ApiError::InvalidToken);
        }

        Ok(RefreshTokenClaims {
            access_token_sub: require_str(&claims, "access_token_sub")?,
            access_token_aud: require_str(&claims, "access_token_aud")?,
            grant_type: require_str(&claims, "grant_type")?,
            scopes: scope_list(&claims),
            user_attributes: user_attributes(&claims),
            issued_at: claims.get("iat").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    /// Validates a subject token presented in an RFC 8693 token-exchange
    /// request. `trusted_issuer` is the app's configured token issuer
    /// (falling back to the global issuer) — the only issuer currently
    /// trusted for internal tokens; external-issuer support (JWKS lookup)
    /// is reserved for a future subject-token source.
    pub fn validate_subject_token(&self, token: &str, trusted_issuer: &str) -> Result<SubjectTokenClaims, ApiError> {
        let claims = self.signer.decode_unverified_claims(token)?;

        let iss = require_str(&claims, "iss")?;
        if iss != trusted_issuer && iss != self.global_issuer {
            return Err(ApiError::InvalidToken);
        }

        check_exp(&claims)?;
        check_nbf(&claims)?;

        Ok(SubjectTokenClaims {
            subject: require_str(&claims, "sub")?,
            audience: require_str(&claims, "aud")?,
            scopes: scope_list(&claims),
            user_attributes: user_attributes(&claims),
            actor: claims.get("act").cloned(),
        })
    }
}

fn require_str(claims: &Map<String, Value>, key: &str) -> Result<String, ApiError> {
    claims.get(key).and_then(Value::as_str).map(str::to_string).ok_or(ApiError::InvalidToken)
}

fn check_exp(claims: &Map<String, Value>) -> Result<(), ApiError> {
    let exp = claims.get("exp").and_then(Value::as_i64).ok_or(ApiError::InvalidToken)?;
    if exp <= Utc::now().timestamp() {
        return Err(ApiError::TokenExpired);
    }
    Ok(())
}

fn check_nbf(claims: &Map<String, Value>) -> Result<(), ApiError> {
    if let Some(nbf) = claims.get("nbf").and_then(Value::as_i64) {
        if nbf > Utc::now().timestamp() {
            return Err(ApiError::InvalidToken);
        }
    }
    Ok(())
}

fn scope_list(claims: &Map<String, Value>) -> Vec<String> {
    claims
        .get("scope")
        .and_then(Value::as_str)
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn user_attributes(claims: &Map<String, Value>) -> HashMap<String, String> {
    claims
        .iter()
        .filter(|(key, _)| !STANDARD_CLAIMS.contains(&key.as_str()))
        .filter_map(|(key, value)| value.as_str().map(|s| (key.clone(), s.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::builder::{AccessTokenRequest, AppTokenConfig, RefreshTokenRequest, TokenBuilder};

    fn signer() -> JwtSigner {
        JwtSigner::new("test_secret_key_minimum_32_chars_required")
    }

    #[test]
    fn refresh_token_must_be_bound_to_requesting_client() {
        let builder = TokenBuilder::new(signer(), "global-issuer", 900);
        let req = RefreshTokenRequest {
            client_id: "client-1".into(),
            scopes: vec!["openid".into()],
            grant_type: "authorization_code".into(),
            access_token_sub: "user-1".into(),
            access_token_aud: "app-1".into(),
            access_token_user_attributes: HashMap::new(),
        };
        let built = builder.build_refresh_token(&req, &AppTokenConfig::default()).unwrap();

        let validator = TokenValidator::new(signer(), "global-issuer");
        assert!(validator.validate_refresh_token(&built.token, "client-1").is_ok());
        assert!(matches!(
            validator.validate_refresh_token(&built.token, "someone-else"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn subject_token_rejects_untrusted_issuer() {
        let builder = TokenBuilder::new(signer(), "attacker-issuer", 900);
        let req = AccessTokenRequest {
            subject: "user-1".into(),
            audience: "app-1".into(),
            client_id: "client-1".into(),
            scopes: vec!["openid".into()],
            user_attributes: HashMap::new(),
            grant_type: "token-exchange".into(),
            actor: None,
        };
        let built = builder.build_access_token(&req, &AppTokenConfig::default()).unwrap();

        let validator = TokenValidator::new(signer(), "global-issuer");
        assert!(matches!(
            validator.validate_subject_token(&built.token, "app-trusted-issuer"),
            Err(ApiError::InvalidToken)
        ));
    }
}
