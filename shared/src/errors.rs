//! # Application Error Types
//!
//! Unified error handling shared by every component of the flow runtime.
//!
//! ## Design Philosophy
//!
//! Each error variant maps to a specific HTTP status family and a stable
//! machine-readable code. This module has no dependency on a transport
//! framework (no Actix-web/Axum `IntoResponse` impl) — the flow engine and
//! its facade are called as plain Rust, and an external HTTP shim is
//! expected to call [`ApiError::status_code`] / [`ApiError::error_code`]
//! itself if it needs to produce an HTTP response.
//!
//! ## Error Categories
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          ApiError Categories                         │
//! ├───────────────────────┬───────────────────┬──────────────────────────┤
//! │ Client (400/404/409)  │ Storage fault(500)│ Engine/executor (500)    │
//! ├───────────────────────┼───────────────────┼──────────────────────────┤
//! │ InvalidRequest         │ DatabaseError     │ NodeResponseMalformed   │
//! │ NotFound               │                   │ ExecutorFault           │
//! │ Conflict               │                   │ GraphIntegrity          │
//! └───────────────────────┴───────────────────┴──────────────────────────┘
//! ```
//!
//! ## Error Code Families
//!
//! - `FES-1xxx` — flow-service client errors
//! - `FES-5xxx` — flow-service server errors
//! - `AZQ-*` — authorization code/request storage
//! - `IDP-*` — identity-provider resolution
//! - `FBR-1xxx` — immutable-resource policy violations

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

/// Result type alias used throughout the flow runtime.
pub type ApiResult<T> = Result<T, ApiError>;

/// Broad classification of an [`ApiError`]; mirrors the `type` field of the
/// wire-level error envelope described by the external HTTP contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ClientError,
    ServerError,
}

/// Distinguishes the specific cause behind an [`ApiError::InvalidRequest`]
/// so that each maps to its own `FES-1xxx` code instead of a single generic
/// one. `Other` is the default for causes §8 doesn't name a worked scenario
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRequestReason {
    /// Generic/uncategorized invalid request (`FES-1000`).
    Other,
    /// `flowId` doesn't resolve to a stored context (`FES-1004`).
    UnknownFlowResume,
    /// `flowType = REGISTRATION` against an application with
    /// `isRegistrationFlowEnabled = false` (`FES-1006`).
    RegistrationDisabled,
}

/// Application error type with a stable code, an [`ErrorKind`], and an
/// HTTP-status mapping.
///
/// Authentication/authorization errors carried over from credential-check
/// executors sit alongside the flow-engine-specific kinds described in the
/// component design (node-response malformation, executor faults, storage
/// faults, graph integrity violations).
#[derive(Debug, Error)]
pub enum ApiError {
    // ---- Authentication (client, 401-equivalent) ----
    /// Wrong credentials presented to a credential-check executor.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A JWT has expired (access, refresh, or subject token).
    #[error("Token expired")]
    TokenExpired,

    /// A JWT failed signature, issuer, audience, or structural validation.
    #[error("Invalid token")]
    InvalidToken,

    // ---- Flow-service client errors (FES-1xxx) ----
    /// Malformed or disallowed flow request: unknown application, invalid
    /// flow type, invalid flow id, registration disabled, invalid init
    /// context.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String, reason: InvalidRequestReason },

    /// Request body failed `validator` rules.
    #[error("Validation error")]
    ValidationError(#[from] ValidationErrors),

    /// Requested resource doesn't exist: flow context, graph node,
    /// identity provider, user schema.
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Attempt to create/update/delete a resource that exists in the
    /// immutable file-backed store (`FBR-1xxx`), or a generic uniqueness
    /// conflict.
    #[error("Resource conflict: {resource}")]
    Conflict { resource: String },

    // ---- Flow-engine server errors (FES-5xxx) ----
    /// A node/executor returned a `NodeResponse` with an empty or
    /// unrecognized `status`/`type`.
    #[error("Malformed node response: {detail}")]
    NodeResponseMalformed { detail: String },

    /// An executor's `Execute` call itself returned an error. The
    /// persisted context for the owning flow is deleted by the facade so
    /// the flow cannot be resumed into a broken state.
    #[error("Executor fault: {detail}")]
    ExecutorFault { detail: String },

    /// Loading or persisting an `EngineContext` failed (conversion or
    /// query failure, not a missing-row case — that is `NotFound`).
    #[error("Storage fault: {detail}")]
    StorageFault { detail: String },

    /// Graph is missing a start node, or a node references a non-existent
    /// next-node id.
    #[error("Graph integrity violation: {detail}")]
    GraphIntegrity { detail: String },

    // ---- Generic server errors ----
    /// PostgreSQL query failed. Details are logged, never echoed back.
    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    /// Unspecified internal error; last resort when no other variant fits.
    #[error("Internal server error")]
    InternalError { message: String },
}

impl ApiError {
    /// Builds a generic [`Self::InvalidRequest`] (`FES-1000`). Most call
    /// sites want this one; reach for [`Self::invalid_request_because`] only
    /// when the cause is one §8 gives its own worked scenario and code.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into(), reason: InvalidRequestReason::Other }
    }

    pub fn invalid_request_because(message: impl Into<String>, reason: InvalidRequestReason) -> Self {
        Self::InvalidRequest { message: message.into(), reason }
    }

    /// Returns the stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidRequest { reason, .. } => match reason {
                InvalidRequestReason::Other => "FES-1000",
                InvalidRequestReason::UnknownFlowResume => "FES-1004",
                InvalidRequestReason::RegistrationDisabled => "FES-1006",
            },
            Self::ValidationError(_) => "FES-1001",
            Self::NotFound { .. } => "FES-1002",
            Self::Conflict { .. } => "FBR-1000",
            Self::NodeResponseMalformed { .. } => "FES-5000",
            Self::ExecutorFault { .. } => "FES-5001",
            Self::StorageFault { .. } => "FES-5002",
            Self::GraphIntegrity { .. } => "FES-5003",
            Self::DatabaseError(_) => "FES-5004",
            Self::InternalError { .. } => "FES-5999",
        }
    }

    /// Returns the [`ErrorKind`] (client vs. server) for status mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials
            | Self::TokenExpired
            | Self::InvalidToken
            | Self::InvalidRequest { .. }
            | Self::ValidationError(_)
            | Self::NotFound { .. }
            | Self::Conflict { .. } => ErrorKind::ClientError,

            Self::NodeResponseMalformed { .. }
            | Self::ExecutorFault { .. }
            | Self::StorageFault { .. }
            | Self::GraphIntegrity { .. }
            | Self::DatabaseError(_)
            | Self::InternalError { .. } => ErrorKind::ServerError,
        }
    }

    /// `true` for every [`ErrorKind::ServerError`] variant. Server errors
    /// are logged at `ERROR` and should page on-call; client errors log at
    /// `WARN`.
    pub fn is_server_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::ServerError)
    }
}

/// Standard error envelope, matching the external HTTP contract's
/// `{code, type, error, error_description}` shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub error: String,
    pub error_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &ApiError) -> Self {
        Self {
            code: error.error_code().to_string(),
            kind: error.kind(),
            error: error.error_code().to_string(),
            error_description: error.to_string(),
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = Some(trace_id.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_service_errors_are_client_kind() {
        assert_eq!(ApiError::invalid_request("x").kind(), ErrorKind::ClientError);
        assert_eq!(
            ApiError::NotFound { resource: "flow:1".into() }.kind(),
            ErrorKind::ClientError
        );
    }

    #[test]
    fn invalid_request_reason_selects_its_own_fes_code() {
        assert_eq!(ApiError::invalid_request("x").error_code(), "FES-1000");
        assert_eq!(
            ApiError::invalid_request_because("x", InvalidRequestReason::UnknownFlowResume).error_code(),
            "FES-1004"
        );
        assert_eq!(
            ApiError::invalid_request_because("x", InvalidRequestReason::RegistrationDisabled).error_code(),
            "FES-1006"
        );
    }

    #[test]
    fn engine_faults_are_server_kind_and_flagged() {
        let err = ApiError::GraphIntegrity { detail: "missing start".into() };
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert!(err.is_server_error());
    }

    #[test]
    fn error_codes_follow_family_prefixes() {
        assert_eq!(
            ApiError::ExecutorFault { detail: "x".into() }.error_code(),
            "FES-5001"
        );
        assert_eq!(
            ApiError::Conflict { resource: "idp:google".into() }.error_code(),
            "FBR-1000"
        );
    }

    #[test]
    fn error_response_carries_description() {
        let err = ApiError::NotFound { resource: "flow:abc".into() };
        let resp = ErrorResponse::new(&err);
        assert_eq!(resp.code, "FES-1002");
        assert!(resp.error_description.contains("flow:abc"));
    }
}
