//! # Flow Engine Domain Entities
//!
//! Core data types for the graph-walking flow engine: the node/graph model,
//! the resumable engine context, transient node responses, the externally
//! visible flow step, authorization code/request records, and the
//! dual-store resource types (identity providers, user schemas).
//!
//! ## Entity Overview
//!
//! | Entity | Lifecycle | Storage |
//! |--------|-----------|---------|
//! | [`Graph`] / [`Node`] | loaded at boot, immutable | config-defined |
//! | [`EngineContext`] | created per flow, mutated per step | `flow_context` + `flow_user_data` |
//! | [`NodeResponse`] | transient, one per node execution | not persisted |
//! | [`FlowStep`] | transient, returned to the caller | not persisted |
//! | [`AuthorizationCode`] | single-use | `authorization_code` |
//! | [`AuthorizationRequest`] | short-lived | `authorization_request` |
//! | [`IdentityProvider`] / [`UserSchema`] | dual-store (db ∪ file) | see `repository::dual_store` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::errors::{ApiError, InvalidRequestReason};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

// =============================================================================
// GRAPH / NODE MODEL
// =============================================================================

/// A directed graph of flow nodes with a designated start node. Immutable
/// after load; shared by `Arc` across concurrently executing flows.
#[derive(Debug, Clone)]
pub struct Graph {
    pub id: String,
    pub start_node_id: String,
    nodes: HashMap<String, Node>,
}

impl Graph {
    pub fn new(start_node_id: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            id: String::new(),
            start_node_id: start_node_id.into(),
            nodes: nodes.into_iter().map(|n| (n.id().to_string(), n)).collect(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Returns the start node, or a graph-integrity error if absent.
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.get(&self.start_node_id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }
}

/// A single step in a flow graph. Modeled as a tagged variant rather than a
/// trait-object hierarchy — dispatch on node type is a single match inside
/// `engine::flow_engine`.
#[derive(Debug, Clone)]
pub enum Node {
    Start { id: String, next_id: Option<String> },
    End { id: String },
    Decision { id: String, next_ids: Vec<String> },
    Prompt { id: String, next_id: Option<String>, inputs: Vec<InputSpec> },
    Redirect { id: String, next_id: Option<String> },
    TaskExecution {
        id: String,
        next_id: Option<String>,
        executor_name: String,
        inputs: Vec<InputSpec>,
    },
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Start { id, .. }
            | Node::End { id }
            | Node::Decision { id, .. }
            | Node::Prompt { id, .. }
            | Node::Redirect { id, .. }
            | Node::TaskExecution { id, .. } => id,
        }
    }

    /// Ordered successor ids. Only `Decision` nodes may carry more than one.
    pub fn next_node_list(&self) -> Vec<String> {
        match self {
            Node::Start { next_id, .. }
            | Node::Prompt { next_id, .. }
            | Node::Redirect { next_id, .. }
            | Node::TaskExecution { next_id, .. } => next_id.clone().into_iter().collect(),
            Node::Decision { next_ids, .. } => next_ids.clone(),
            Node::End { .. } => Vec::new(),
        }
    }

    pub fn input_data(&self) -> &[InputSpec] {
        match self {
            Node::Prompt { inputs, .. } | Node::TaskExecution { inputs, .. } => inputs,
            _ => &[],
        }
    }

    pub fn executor_name(&self) -> Option<&str> {
        match self {
            Node::TaskExecution { executor_name, .. } => Some(executor_name),
            _ => None,
        }
    }
}

/// Declares one datum a node may require from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

// =============================================================================
// EXECUTION HISTORY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Complete,
    Incomplete,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub attempt: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionRecord {
    pub step: u32,
    pub status: ExecutionStatus,
    pub executions: Vec<ExecutionAttempt>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_type: Option<String>,
}

// =============================================================================
// AUTHENTICATED USER (runtime concept, not a directory record)
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

// =============================================================================
// ENGINE CONTEXT (C3)
// =============================================================================

/// The complete resumable state of one flow. Owned uniquely by the engine
/// between load and save; the context store owns the persisted bytes.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub flow_id: Uuid,
    pub app_id: String,
    pub flow_type: FlowType,
    pub verbose: bool,
    pub trace_id: Uuid,

    pub graph_id: String,
    pub graph: Option<Graph>,

    pub current_node: Option<String>,
    pub current_node_response: Option<NodeResponse>,
    pub current_action: String,

    pub user_inputs: HashMap<String, String>,
    pub runtime_data: HashMap<String, String>,
    pub authenticated_user: AuthenticatedUser,

    pub execution_history: HashMap<String, NodeExecutionRecord>,
}

impl EngineContext {
    pub fn new(app_id: impl Into<String>, flow_type: FlowType, graph_id: impl Into<String>) -> Self {
        Self {
            flow_id: Uuid::new_v4(),
            app_id: app_id.into(),
            flow_type,
            verbose: false,
            trace_id: Uuid::new_v4(),
            graph_id: graph_id.into(),
            graph: None,
            current_node: None,
            current_node_response: None,
            current_action: String::new(),
            user_inputs: HashMap::new(),
            runtime_data: HashMap::new(),
            authenticated_user: AuthenticatedUser::default(),
            execution_history: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowType {
    Authentication,
    Registration,
}

// =============================================================================
// NODE RESPONSE / FLOW STEP (transient, C4/C5)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Complete,
    Incomplete,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseType {
    Redirection,
    View,
    Retry,
}

/// The outcome of executing one node. Never persisted directly — it is
/// folded into the `EngineContext` by the engine's merge step and the last
/// one becomes `current_node_response`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeResponse {
    pub status: Option<ResponseStatus>,
    #[serde(rename = "type")]
    pub response_type: Option<ResponseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub required_data: Vec<InputSpec>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub additional_data: HashMap<String, String>,
    #[serde(default)]
    pub runtime_data: HashMap<String, String>,
    #[serde(default)]
    pub authenticated_user: AuthenticatedUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowStatus {
    Incomplete,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowStepType {
    Redirection,
    View,
    None,
}

/// Externally visible projection of one engine invocation: either a prompt
/// for input, a redirection, a terminal assertion, or an error reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStep {
    pub flow_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(rename = "type")]
    pub step_type: FlowStepType,
    pub status: FlowStatus,
    pub data: FlowStepData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowStepData {
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub additional_data: HashMap<String, String>,
}

// =============================================================================
// AUTHORIZATION CODE / REQUEST (C6 / C7)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorizationCodeState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationCode {
    pub code_id: Uuid,
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub authorized_user_id: String,
    /// Space-joined scope string, as stored.
    pub scopes: String,
    pub time_created: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub state: AuthorizationCodeState,
    pub deployment_id: String,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_time
    }

    pub fn scope_list(&self) -> Vec<String> {
        self.scopes.split_whitespace().map(str::to_string).collect()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationRequest {
    pub auth_id: Uuid,
    /// Opaque serialized authorization-request context (JSON).
    pub request_data: serde_json::Value,
    pub expiry_time: DateTime<Utc>,
    pub deployment_id: String,
}

// =============================================================================
// IDENTITY PROVIDER / USER SCHEMA (dual-store, C10)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdentityProviderType {
    Oauth,
    Oidc,
    Google,
    Github,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdpProperty {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub is_secret: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProvider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub idp_type: IdentityProviderType,
    #[serde(default)]
    pub properties: Vec<IdpProperty>,
}

/// One type's property schema: which properties must be present, which are
/// optional, and endpoint defaults applied when the caller doesn't supply
/// them (`GOOGLE`/`GITHUB` ship well-known endpoints so a tenant only has to
/// configure a client id/secret).
struct IdpPropertySchema {
    required: &'static [&'static str],
    optional: &'static [&'static str],
    defaults: &'static [(&'static str, &'static str)],
}

const OAUTH_SCHEMA: IdpPropertySchema = IdpPropertySchema {
    required: &["client_id", "client_secret", "authorize_endpoint", "token_endpoint"],
    optional: &["scopes", "user_info_endpoint"],
    defaults: &[],
};

const OIDC_SCHEMA: IdpPropertySchema = IdpPropertySchema {
    required: &["client_id", "client_secret", "authorize_endpoint", "token_endpoint"],
    optional: &["scopes", "user_info_endpoint", "jwks_endpoint"],
    defaults: &[("scopes", "openid")],
};

const GOOGLE_SCHEMA: IdpPropertySchema = IdpPropertySchema {
    required: &["client_id", "client_secret"],
    optional: &["scopes"],
    defaults: &[
        ("authorize_endpoint", "https://accounts.google.com/o/oauth2/v2/auth"),
        ("token_endpoint", "https://oauth2.googleapis.com/token"),
        ("user_info_endpoint", "https://openidconnect.googleapis.com/v1/userinfo"),
        ("scopes", "openid"),
    ],
};

const GITHUB_SCHEMA: IdpPropertySchema = IdpPropertySchema {
    required: &["client_id", "client_secret"],
    optional: &["scopes"],
    defaults: &[
        ("authorize_endpoint", "https://github.com/login/oauth/authorize"),
        ("token_endpoint", "https://github.com/login/oauth/access_token"),
        ("user_info_endpoint", "https://api.github.com/user"),
    ],
};

impl IdentityProviderType {
    fn property_schema(self) -> &'static IdpPropertySchema {
        match self {
            IdentityProviderType::Oauth => &OAUTH_SCHEMA,
            IdentityProviderType::Oidc => &OIDC_SCHEMA,
            IdentityProviderType::Google => &GOOGLE_SCHEMA,
            IdentityProviderType::Github => &GITHUB_SCHEMA,
        }
    }
}

impl IdentityProvider {
    /// Validates `properties` against `idp_type`'s schema and returns the
    /// normalized set the provider should be stored/loaded with: every
    /// required property must be present; defaults are filled in for any
    /// default-bearing property the caller omitted; any property outside
    /// required ∪ optional ∪ defaults is dropped (§8: emitted property set
    /// is bounded to exactly that union). OIDC and GOOGLE additionally
    /// always carry `openid` in their emitted `scopes`, merging it in if the
    /// caller supplied a `scopes` value that doesn't already include it.
    pub fn validate_properties(idp_type: IdentityProviderType, properties: &[IdpProperty]) -> Result<Vec<IdpProperty>, ApiError> {
        let schema = idp_type.property_schema();
        let by_name: HashMap<&str, &IdpProperty> = properties.iter().map(|p| (p.name.as_str(), p)).collect();

        for required in schema.required {
            if !by_name.contains_key(required) {
                return Err(ApiError::InvalidRequest {
                    message: format!("identity provider is missing required property '{required}'"),
                    reason: InvalidRequestReason::Other,
                });
            }
        }

        let allowed: HashMap<&str, ()> = schema
            .required
            .iter()
            .chain(schema.optional.iter())
            .chain(schema.defaults.iter().map(|(name, _)| name))
            .map(|name| (*name, ()))
            .collect();

        let mut normalized: Vec<IdpProperty> = properties.iter().filter(|p| allowed.contains_key(p.name.as_str())).cloned().collect();

        for (name, default_value) in schema.defaults {
            if !normalized.iter().any(|p| p.name == *name) {
                normalized.push(IdpProperty { name: name.to_string(), value: default_value.to_string(), is_secret: false });
            }
        }

        if matches!(idp_type, IdentityProviderType::Oidc | IdentityProviderType::Google) {
            if let Some(scopes) = normalized.iter_mut().find(|p| p.name == "scopes") {
                if !scopes.value.split_whitespace().any(|s| s == "openid") {
                    scopes.value = format!("openid {}", scopes.value).trim().to_string();
                }
            } else {
                normalized.push(IdpProperty { name: "scopes".to_string(), value: "openid".to_string(), is_secret: false });
            }
        }

        Ok(normalized)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSchema {
    pub id: String,
    pub name: String,
    pub organization_unit_id: String,
    #[serde(default)]
    pub allow_self_registration: bool,
    pub schema: serde_json::Value,
}

// =============================================================================
// APPLICATION (dual-store, referenced by EngineContext::app_id)
// =============================================================================

/// The registered OAuth2/OIDC client an `EngineContext` belongs to. Resolves
/// which graph governs a flow and whether self-registration is permitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_registration_flow_enabled: bool,
    pub authentication_graph_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_graph_id: Option<String>,
}

impl Application {
    /// Resolves the graph id for a given flow type, per §4.5: registration
    /// additionally requires the feature flag and a configured graph.
    pub fn graph_id_for(&self, flow_type: FlowType) -> Result<&str, ApiError> {
        match flow_type {
            FlowType::Authentication => Ok(&self.authentication_graph_id),
            FlowType::Registration => {
                if !self.is_registration_flow_enabled {
                    return Err(ApiError::invalid_request_because(
                        format!("application '{}' has registration disabled", self.id),
                        InvalidRequestReason::RegistrationDisabled,
                    ));
                }
                self.registration_graph_id
                    .as_deref()
                    .ok_or_else(|| ApiError::invalid_request(format!("application '{}' has no registration graph configured", self.id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_node_may_have_multiple_successors() {
        let node = Node::Decision {
            id: "d1".into(),
            next_ids: vec!["a".into(), "b".into()],
        };
        assert_eq!(node.next_node_list(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn non_decision_node_has_at_most_one_successor() {
        let node = Node::Redirect { id: "r1".into(), next_id: Some("a".into()) };
        assert_eq!(node.next_node_list(), vec!["a".to_string()]);

        let terminal = Node::End { id: "end".into() };
        assert!(terminal.next_node_list().is_empty());
    }

    #[test]
    fn graph_resolves_start_node_by_id() {
        let start = Node::Start { id: "start".into(), next_id: Some("next".into()) };
        let graph = Graph::new("start", vec![start]);
        assert!(graph.start_node().is_some());
        assert!(graph.node("missing").is_none());
    }

    #[test]
    fn google_idp_fills_in_default_endpoints_and_openid_scope() {
        let properties = vec![
            IdpProperty { name: "client_id".into(), value: "abc".into(), is_secret: false },
            IdpProperty { name: "client_secret".into(), value: "shh".into(), is_secret: true },
        ];
        let validated = IdentityProvider::validate_properties(IdentityProviderType::Google, &properties).unwrap();
        let get = |name: &str| validated.iter().find(|p| p.name == name).map(|p| p.value.clone());
        assert_eq!(get("authorize_endpoint").as_deref(), Some("https://accounts.google.com/o/oauth2/v2/auth"));
        assert_eq!(get("scopes").as_deref(), Some("openid"));
    }

    #[test]
    fn oidc_idp_merges_openid_into_caller_supplied_scopes() {
        let properties = vec![
            IdpProperty { name: "client_id".into(), value: "abc".into(), is_secret: false },
            IdpProperty { name: "client_secret".into(), value: "shh".into(), is_secret: true },
            IdpProperty { name: "authorize_endpoint".into(), value: "https://idp/authorize".into(), is_secret: false },
            IdpProperty { name: "token_endpoint".into(), value: "https://idp/token".into(), is_secret: false },
            IdpProperty { name: "scopes".into(), value: "profile email".into(), is_secret: false },
        ];
        let validated = IdentityProvider::validate_properties(IdentityProviderType::Oidc, &properties).unwrap();
        let scopes = validated.iter().find(|p| p.name == "scopes").unwrap();
        assert!(scopes.value.split_whitespace().any(|s| s == "openid"));
        assert!(scopes.value.split_whitespace().any(|s| s == "profile"));
    }

    #[test]
    fn oauth_idp_missing_required_property_is_rejected() {
        let properties = vec![IdpProperty { name: "client_id".into(), value: "abc".into(), is_secret: false }];
        let result = IdentityProvider::validate_properties(IdentityProviderType::Oauth, &properties);
        assert!(matches!(result, Err(ApiError::InvalidRequest { .. })));
    }

    #[test]
    fn unrecognized_property_is_dropped_from_the_normalized_set() {
        let properties = vec![
            IdpProperty { name: "client_id".into(), value: "abc".into(), is_secret: false },
            IdpProperty { name: "client_secret".into(), value: "shh".into(), is_secret: true },
            IdpProperty { name: "not_a_real_property".into(), value: "x".into(), is_secret: false },
        ];
        let validated = IdentityProvider::validate_properties(IdentityProviderType::Github, &properties).unwrap();
        assert!(!validated.iter().any(|p| p.name == "not_a_real_property"));
    }

    #[test]
    fn authorization_code_expiry_is_inclusive_of_boundary() {
        let now = Utc::now();
        let code = AuthorizationCode {
            code_id: Uuid::new_v4(),
            code: "abc".into(),
            client_id: "client-1".into(),
            redirect_uri: "https://app/cb".into(),
            authorized_user_id: "user-1".into(),
            scopes: "openid profile".into(),
            time_created: now,
            expiry_time: now,
            state: AuthorizationCodeState::Active,
            deployment_id: "default".into(),
        };
        assert!(code.is_expired(now));
        assert_eq!(code.scope_list(), vec!["openid", "profile"]);
    }
}
