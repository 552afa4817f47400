//! # Token Builder (C8)
//!
//! Builds access, refresh, and ID tokens from a dynamic claim map (see
//! [`shared::auth::JwtSigner`]) rather than a fixed `Claims` struct, since
//! the claim set is driven per-scope and per-application config.

use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use shared::auth::JwtSigner;
use shared::errors::ApiError;
use std::collections::HashMap;
use uuid::Uuid;

/// Nested actor claim, supporting recursive delegation chains for token
/// exchange (RFC 8693 `act`).
#[derive(Debug, Clone)]
pub struct ActorClaims {
    pub sub: String,
    pub iss: String,
    pub act: Option<Box<ActorClaims>>,
}

fn actor_to_value(actor: &ActorClaims) -> Value {
    let mut map = Map::new();
    map.insert("sub".to_string(), Value::String(actor.sub.clone()));
    map.insert("iss".to_string(), Value::String(actor.iss.clone()));
    if let Some(nested) = &actor.act {
        map.insert("act".to_string(), actor_to_value(nested));
    }
    Value::Object(map)
}

/// Per-application override for one token type.
#[derive(Debug, Clone, Default)]
pub struct AppTokenTypeConfig {
    pub issuer: Option<String>,
    pub validity_period: Option<u64>,
    pub allowed_user_attributes: Option<Vec<String>>,
    /// ID-token-only: app-specific scope → claim-names projection, merged
    /// with the standard OIDC scope map.
    pub scope_claims: Option<HashMap<String, Vec<String>>>,
}

/// An application's full OAuth token configuration, consulted by every
/// build per §4.7's issuer/validity resolution order.
#[derive(Debug, Clone, Default)]
pub struct AppTokenConfig {
    pub issuer: Option<String>,
    pub access_token: AppTokenTypeConfig,
    pub refresh_token: AppTokenTypeConfig,
    pub id_token: AppTokenTypeConfig,
}

pub struct AccessTokenRequest {
    pub subject: String,
    pub audience: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub user_attributes: HashMap<String, String>,
    pub grant_type: String,
    pub actor: Option<ActorClaims>,
}

pub struct RefreshTokenRequest {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub grant_type: String,
    pub access_token_sub: String,
    pub access_token_aud: String,
    pub access_token_user_attributes: HashMap<String, String>,
}

pub struct IdTokenRequest {
    pub subject: String,
    pub audience: String,
    pub auth_time: Option<i64>,
    pub scopes: Vec<String>,
    pub user_attributes: HashMap<String, String>,
}

/// A minted token and the validity period (seconds) it was built with.
pub struct BuiltToken {
    pub token: String,
    pub expires_in: i64,
}

pub struct TokenBuilder {
    signer: JwtSigner,
    global_issuer: String,
    global_validity: u64,
}

impl TokenBuilder {
    pub fn new(signer: JwtSigner, global_issuer: impl Into<String>, global_validity: u64) -> Self {
        Self { signer, global_issuer: global_issuer.into(), global_validity }
    }

    pub fn build_access_token(&self, req: &AccessTokenRequest, app: &AppTokenConfig) -> Result<BuiltToken, ApiError> {
        let issuer = resolve_issuer(app.access_token.issuer.as_deref(), app.issuer.as_deref(), &self.global_issuer);
        let validity = app.access_token.validity_period.unwrap_or(self.global_validity);
        let now = Utc::now();

        let mut claims = standard_claims(&issuer, &req.subject, &req.audience, now, validity);
        if !req.scopes.is_empty() {
            claims.insert("scope".to_string(), Value::String(req.scopes.join(" ")));
        }
        if !req.client_id.is_empty() {
            claims.insert("client_id".to_string(), Value::String(req.client_id.clone()));
        }
        if !req.grant_type.is_empty() {
            claims.insert("grant_type".to_string(), Value::String(req.grant_type.clone()));
        }
        for (key, value) in &req.user_attributes {
            claims.insert(key.clone(), Value::String(value.clone()));
        }
        if let Some(actor) = &req.actor {
            claims.insert("act".to_string(), actor_to_value(actor));
        }

        let token = self.signer.encode(&claims)?;
        Ok(BuiltToken { token, expires_in: validity as i64 })
    }

    pub fn build_refresh_token(&self, req: &RefreshTokenRequest, app: &AppTokenConfig) -> Result<BuiltToken, ApiError> {
        let issuer = resolve_issuer(app.refresh_token.issuer.as_deref(), app.issuer.as_deref(), &self.global_issuer);
        let validity = app.refresh_token.validity_period.unwrap_or(self.global_validity);
        let now = Utc::now();

        // Per §4.7: the client id serves as both subject and audience.
        let mut claims = standard_claims(&issuer, &req.client_id, &req.client_id, now, validity);
        if !req.scopes.is_empty() {
            claims.insert("scope".to_string(), Value::String(req.scopes.join(" ")));
        }
        claims.insert("access_token_sub".to_string(), Value::String(req.access_token_sub.clone()));
        claims.insert("access_token_aud".to_string(), Value::String(req.access_token_aud.clone()));
        claims.insert("grant_type".to_string(), Value::String(req.grant_type.clone()));

        if let Some(allowed) = &app.access_token.allowed_user_attributes {
            let mut carried = Map::new();
            for name in allowed {
                if let Some(value) = req.access_token_user_attributes.get(name) {
                    carried.insert(name.clone(), Value::String(value.clone()));
                }
            }
            if !carried.is_empty() {
                claims.insert("access_token_user_attributes".to_string(), Value::Object(carried));
            }
        }

        let token = self.signer.encode(&claims)?;
        Ok(BuiltToken { token, expires_in: validity as i64 })
    }

    pub fn build_id_token(&self, req: &IdTokenRequest, app: &AppTokenConfig) -> Result<BuiltToken, ApiError> {
        let issuer = resolve_issuer(app.id_token.issuer.as_deref(), app.issuer.as_deref(), &self.global_issuer);
        let validity = app.id_token.validity_period.unwrap_or(self.global_validity);
        let now = Utc::now();

        let mut claims = standard_claims(&issuer, &req.subject, &req.audience, now, validity);
        if let Some(auth_time) = req.auth_time {
            if auth_time != 0 {
                claims.insert("auth_time".to_string(), Value::from(auth_time));
            }
        }

        let allowed: std::collections::HashSet<&str> = app
            .id_token
            .allowed_user_attributes
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(String::as_str)
            .collect();

        let mut released = std::collections::HashSet::new();
        for scope in &req.scopes {
            let mut claim_names: Vec<String> = app
                .id_token
                .scope_claims
                .as_ref()
                .and_then(|m| m.get(scope))
                .cloned()
                .unwrap_or_default();
            claim_names.extend(standard_oidc_scope_claims(scope).iter().map(|s| s.to_string()));

            for name in claim_names {
                if !released.insert(name.clone()) || !allowed.contains(name.as_str()) {
                    continue;
                }
                if let Some(value) = req.user_attributes.get(&name) {
                    claims.insert(name, Value::String(value.clone()));
                }
            }
        }

        let token = self.signer.encode(&claims)?;
        Ok(BuiltToken { token, expires_in: validity as i64 })
    }
}

fn resolve_issuer(type_issuer: Option<&str>, app_issuer: Option<&str>, global: &str) -> String {
    type_issuer.or(app_issuer).unwrap_or(global).to_string()
}

fn standard_claims(
    issuer: &str,
    subject: &str,
    audience: &str,
    now: chrono::DateTime<Utc>,
    validity_seconds: u64,
) -> Map<String, Value> {
    let exp = now + Duration::seconds(validity_seconds as i64);
    let mut claims = Map::new();
    claims.insert("iss".to_string(), Value::String(issuer.to_string()));
    claims.insert("sub".to_string(), Value::String(subject.to_string()));
    claims.insert("aud".to_string(), Value::String(audience.to_string()));
    claims.insert("iat".to_string(), Value::from(now.timestamp()));
    claims.insert("nbf".to_string(), Value::from(now.timestamp()));
    claims.insert("exp".to_string(), Value::from(exp.timestamp()));
    claims.insert("jti".to_string(), Value::String(Uuid::new_v4().to_string()));
    claims
}

/// The standard OIDC scope → claims projection (`openid` carries no claims
/// of its own — it only gates ID token issuance).
fn standard_oidc_scope_claims(scope: &str) -> &'static [&'static str] {
    match scope {
        "profile" => &[
            "name", "family_name", "given_name", "middle_name", "nickname", "preferred_username",
            "profile", "picture", "website", "gender", "birthdate", "zoneinfo", "locale", "updated_at",
        ],
        "email" => &["email", "email_verified"],
        "address" => &["address"],
        "phone" => &["phone_number", "phone_number_verified"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TokenBuilder {
        TokenBuilder::new(JwtSigner::new("test_secret_key_minimum_32_chars_required"), "global-issuer", 900)
    }

    #[test]
    fn access_token_omits_empty_scope_and_client_id() {
        let req = AccessTokenRequest {
            subject: "user-1".into(),
            audience: "app-1".into(),
            client_id: String::new(),
            scopes: vec![],
            user_attributes: HashMap::new(),
            grant_type: String::new(),
            actor: None,
        };
        let built = builder().build_access_token(&req, &AppTokenConfig::default()).unwrap();
        assert!(!built.token.is_empty());
        assert_eq!(built.expires_in, 900);
    }

    #[test]
    fn id_token_projects_only_allowed_profile_claims_for_requested_scope() {
        let mut user_attributes = HashMap::new();
        user_attributes.insert("name".to_string(), "Ada Lovelace".to_string());
        user_attributes.insert("ssn".to_string(), "000-00-0000".to_string());

        let req = IdTokenRequest {
            subject: "user-1".into(),
            audience: "app-1".into(),
            auth_time: Some(0),
            scopes: vec!["profile".to_string()],
            user_attributes,
        };
        let mut app = AppTokenConfig::default();
        app.id_token.allowed_user_attributes = Some(vec!["name".to_string()]);

        let signer = JwtSigner::new("test_secret_key_minimum_32_chars_required");
        let token_builder = TokenBuilder::new(signer.clone(), "global-issuer", 900);
        let built = token_builder.build_id_token(&req, &app).unwrap();

        let claims = signer.decode_unverified_claims(&built.token).unwrap();
        assert_eq!(claims.get("name").and_then(Value::as_str), Some("Ada Lovelace"));
        assert!(claims.get("ssn").is_none());
        assert!(claims.get("auth_time").is_none(), "zero auth_time must be omitted");
    }

    #[test]
    fn actor_claim_nests_recursively() {
        let req = AccessTokenRequest {
            subject: "user-1".into(),
            audience: "app-1".into(),
            client_id: "client-1".into(),
            scopes: vec!["openid".to_string()],
            user_attributes: HashMap::new(),
            grant_type: "token-exchange".into(),
            actor: Some(ActorClaims {
                sub: "service-a".into(),
                iss: "global-issuer".into(),
                act: Some(Box::new(ActorClaims { sub: "service-b".into(), iss: "global-issuer".into(), act: None })),
            }),
        };
        let built = builder().build_access_token(&req, &AppTokenConfig::default()).unwrap();
        assert!(!built.token.is_empty());
    }
}
