//! # Engine Context Store (C3)
//!
//! Persists [`EngineContext`] across the two-table schema described by the
//! external interface (`flow_context`, `flow_user_data`), scoped by
//! `deployment_id`. Every write spans both tables inside one transaction;
//! deletion removes user-data first, then context, also inside one
//! transaction.
//!
//! The graph itself is never serialized — only `graph_id` is stored, and
//! the graph is re-resolved through the [`GraphRegistry`] on load.

use crate::domain::{
    AuthenticatedUser, EngineContext, FlowType, NodeExecutionRecord, NodeResponse,
};
use crate::engine::registry::GraphRegistry;
use shared::errors::ApiError;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(FromRow)]
struct ContextRow {
    flow_id: Uuid,
    app_id: String,
    flow_type: String,
    verbose: bool,
    trace_id: Uuid,
    graph_id: String,
    current_node_id: Option<String>,
    current_node_response: Option<serde_json::Value>,
    current_action: String,
    runtime_data: serde_json::Value,
    execution_history: serde_json::Value,
}

#[derive(FromRow)]
struct UserDataRow {
    is_authenticated: bool,
    user_id: Option<String>,
    organization_unit_id: Option<String>,
    user_type: Option<String>,
    user_inputs: serde_json::Value,
    user_attributes: serde_json::Value,
}

/// `sqlx`-backed repository over `flow_context` + `flow_user_data`, in the
/// same runtime-query / `FromRow` idiom as the rest of this crate's
/// repositories — no compile-time `query!` macro, so no `DATABASE_URL` is
/// needed to build against this module.
#[derive(Clone)]
pub struct EngineContextStore {
    pool: PgPool,
    deployment_id: String,
}

impl EngineContextStore {
    pub fn new(pool: PgPool, deployment_id: impl Into<String>) -> Self {
        Self { pool, deployment_id: deployment_id.into() }
    }

    pub async fn load(
        &self,
        flow_id: Uuid,
        graphs: &GraphRegistry,
    ) -> Result<Option<EngineContext>, ApiError> {
        let context_row: Option<ContextRow> = sqlx::query_as(
            "SELECT flow_id, app_id, flow_type, verbose, trace_id, graph_id, \
             current_node_id, current_node_response, current_action, \
             runtime_data, execution_history \
             FROM flow_context WHERE flow_id = $1 AND deployment_id = $2",
        )
        .bind(flow_id)
        .bind(&self.deployment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        let Some(context_row) = context_row else { return Ok(None) };

        let user_row: Option<UserDataRow> = sqlx::query_as(
            "SELECT is_authenticated, user_id, organization_unit_id, user_type, \
             user_inputs, user_attributes \
             FROM flow_user_data WHERE flow_id = $1 AND deployment_id = $2",
        )
        .bind(flow_id)
        .bind(&self.deployment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        Ok(Some(self.to_engine_context(context_row, user_row, graphs)?))
    }

    pub async fn save(&self, ctx: &EngineContext) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        let flow_type = flow_type_to_str(ctx.flow_type);
        let current_node_response = ctx
            .current_node_response
            .as_ref()
            .map(|r| serde_json::to_value(r))
            .transpose()
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        let runtime_data = serde_json::to_value(&ctx.runtime_data)
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        let execution_history = serde_json::to_value(&ctx.execution_history)
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        sqlx::query(
            "INSERT INTO flow_context \
             (flow_id, app_id, flow_type, verbose, trace_id, graph_id, current_node_id, \
              current_node_response, current_action, runtime_data, execution_history, \
              deployment_id, created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,now(),now()) \
             ON CONFLICT (flow_id) DO UPDATE SET \
               current_node_id = EXCLUDED.current_node_id, \
               current_node_response = EXCLUDED.current_node_response, \
               current_action = EXCLUDED.current_action, \
               runtime_data = EXCLUDED.runtime_data, \
               execution_history = EXCLUDED.execution_history, \
               updated_at = now()",
        )
        .bind(ctx.flow_id)
        .bind(&ctx.app_id)
        .bind(flow_type)
        .bind(ctx.verbose)
        .bind(ctx.trace_id)
        .bind(&ctx.graph_id)
        .bind(&ctx.current_node)
        .bind(current_node_response)
        .bind(&ctx.current_action)
        .bind(runtime_data)
        .bind(execution_history)
        .bind(&self.deployment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        let user_inputs = serde_json::to_value(&ctx.user_inputs)
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        let user_attributes = serde_json::to_value(&ctx.authenticated_user.attributes)
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        sqlx::query(
            "INSERT INTO flow_user_data \
             (flow_id, is_authenticated, user_id, organization_unit_id, user_type, \
              user_inputs, user_attributes, deployment_id, created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,now(),now()) \
             ON CONFLICT (flow_id) DO UPDATE SET \
               is_authenticated = EXCLUDED.is_authenticated, \
               user_id = EXCLUDED.user_id, \
               organization_unit_id = EXCLUDED.organization_unit_id, \
               user_type = EXCLUDED.user_type, \
               user_inputs = EXCLUDED.user_inputs, \
               user_attributes = EXCLUDED.user_attributes, \
               updated_at = now()",
        )
        .bind(ctx.flow_id)
        .bind(ctx.authenticated_user.is_authenticated)
        .bind(&ctx.authenticated_user.user_id)
        .bind(&ctx.authenticated_user.organization_unit_id)
        .bind(&ctx.authenticated_user.user_type)
        .bind(user_inputs)
        .bind(user_attributes)
        .bind(&self.deployment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        tx.commit().await.map_err(|e| ApiError::StorageFault { detail: e.to_string() })
    }

    /// Deletes a flow's context. Called by the facade whenever a flow
    /// terminates (complete, failure, or engine error) so it can never be
    /// resumed into a broken or stale state.
    pub async fn delete(&self, flow_id: Uuid) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        sqlx::query("DELETE FROM flow_user_data WHERE flow_id = $1 AND deployment_id = $2")
            .bind(flow_id)
            .bind(&self.deployment_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        sqlx::query("DELETE FROM flow_context WHERE flow_id = $1 AND deployment_id = $2")
            .bind(flow_id)
            .bind(&self.deployment_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        tx.commit().await.map_err(|e| ApiError::StorageFault { detail: e.to_string() })
    }

    fn to_engine_context(
        &self,
        row: ContextRow,
        user_row: Option<UserDataRow>,
        graphs: &GraphRegistry,
    ) -> Result<EngineContext, ApiError> {
        let flow_type = flow_type_from_str(&row.flow_type)?;
        let graph = graphs.get(&row.graph_id)?;

        let current_node_response = row
            .current_node_response
            .map(|v| serde_json::from_value::<NodeResponse>(v))
            .transpose()
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        let runtime_data: HashMap<String, String> = serde_json::from_value(row.runtime_data)
            .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        let execution_history: HashMap<String, NodeExecutionRecord> =
            serde_json::from_value(row.execution_history)
                .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;

        let (authenticated_user, user_inputs) = match user_row {
            Some(u) => {
                let attributes: HashMap<String, String> = serde_json::from_value(u.user_attributes)
                    .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
                let user_inputs: HashMap<String, String> = serde_json::from_value(u.user_inputs)
                    .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
                (
                    AuthenticatedUser {
                        is_authenticated: u.is_authenticated,
                        user_id: u.user_id,
                        organization_unit_id: u.organization_unit_id,
                        user_type: u.user_type,
                        attributes,
                    },
                    user_inputs,
                )
            }
            None => (AuthenticatedUser::default(), HashMap::new()),
        };

        Ok(EngineContext {
            flow_id: row.flow_id,
            app_id: row.app_id,
            flow_type,
            verbose: row.verbose,
            trace_id: row.trace_id,
            graph_id: row.graph_id,
            graph: Some((*graph).clone()),
            current_node: row.current_node_id,
            current_node_response,
            current_action: row.current_action,
            user_inputs,
            runtime_data,
            authenticated_user,
            execution_history,
        })
    }
}

fn flow_type_to_str(flow_type: FlowType) -> &'static str {
    match flow_type {
        FlowType::Authentication => "AUTHENTICATION",
        FlowType::Registration => "REGISTRATION",
    }
}

fn flow_type_from_str(value: &str) -> Result<FlowType, ApiError> {
    match value {
        "AUTHENTICATION" => Ok(FlowType::Authentication),
        "REGISTRATION" => Ok(FlowType::Registration),
        other => Err(ApiError::StorageFault { detail: format!("unknown flow_type '{other}'") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_type_round_trips_through_its_string_form() {
        assert_eq!(flow_type_to_str(FlowType::Authentication), "AUTHENTICATION");
        assert_eq!(flow_type_from_str("REGISTRATION").unwrap(), FlowType::Registration);
        assert!(flow_type_from_str("BOGUS").is_err());
    }
}
