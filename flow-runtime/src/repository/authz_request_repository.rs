//! # Authorization Request Store (C7)
//!
//! Holds the serialized authorization-request context between the initial
//! `/authorize` redirect into a flow and the flow's completion, keyed by
//! `auth_id` rather than by `flow_id` so it survives across flow restarts.

use crate::domain::AuthorizationRequest;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuthorizationRequestRepository {
    pool: PgPool,
    deployment_id: String,
}

impl AuthorizationRequestRepository {
    pub fn new(pool: PgPool, deployment_id: impl Into<String>) -> Self {
        Self { pool, deployment_id: deployment_id.into() }
    }

    pub async fn create(&self, request: &AuthorizationRequest) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO authorization_request (auth_id, request_data, expiry_time, deployment_id) \
             VALUES ($1,$2,$3,$4)",
        )
        .bind(request.auth_id)
        .bind(&request.request_data)
        .bind(request.expiry_time)
        .bind(&self.deployment_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    /// Expired rows never return — a request whose `expiry_time` has
    /// passed is, for every caller's purposes, not found.
    pub async fn find_by_id(&self, auth_id: Uuid) -> Result<Option<AuthorizationRequest>, ApiError> {
        sqlx::query_as(
            "SELECT auth_id, request_data, expiry_time, deployment_id \
             FROM authorization_request WHERE auth_id = $1 AND deployment_id = $2 AND expiry_time > now()",
        )
        .bind(auth_id)
        .bind(&self.deployment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn delete(&self, auth_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM authorization_request WHERE auth_id = $1 AND deployment_id = $2")
            .bind(auth_id)
            .bind(&self.deployment_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }
}
