//! # Authorization Code Store (C6)

use crate::domain::{AuthorizationCode, AuthorizationCodeState};
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuthorizationCodeRepository {
    pool: PgPool,
    deployment_id: String,
}

impl AuthorizationCodeRepository {
    pub fn new(pool: PgPool, deployment_id: impl Into<String>) -> Self {
        Self { pool, deployment_id: deployment_id.into() }
    }

    pub async fn create(&self, code: &AuthorizationCode) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO authorization_code \
             (code_id, code, client_id, redirect_uri, authorized_user_id, scopes, \
              time_created, expiry_time, state, deployment_id) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)",
        )
        .bind(code.code_id)
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(&code.redirect_uri)
        .bind(&code.authorized_user_id)
        .bind(&code.scopes)
        .bind(code.time_created)
        .bind(code.expiry_time)
        .bind(code.state)
        .bind(&self.deployment_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    /// Looks up a code regardless of state — callers decide how to treat an
    /// expired or already-consumed code (see Token Validator §4.8). Scoped
    /// to the requesting client: a code must only ever be returned to the
    /// client it was issued to, per §4.6.
    pub async fn find_by_code(&self, client_id: &str, code: &str) -> Result<Option<AuthorizationCode>, ApiError> {
        sqlx::query_as(
            "SELECT code_id, code, client_id, redirect_uri, authorized_user_id, scopes, \
             time_created, expiry_time, state, deployment_id \
             FROM authorization_code WHERE code = $1 AND client_id = $2 AND deployment_id = $3",
        )
        .bind(code)
        .bind(client_id)
        .bind(&self.deployment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    /// Marks a code consumed. A code is single-use: once exchanged it must
    /// never validate again, even if presented again before its expiry.
    pub async fn deactivate(&self, code_id: Uuid) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE authorization_code SET state = $1 WHERE code_id = $2 AND deployment_id = $3",
        )
        .bind(AuthorizationCodeState::Inactive)
        .bind(code_id)
        .bind(&self.deployment_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }
}
