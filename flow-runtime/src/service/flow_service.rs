//! # Flow Service Facade (C5)
//!
//! Thin orchestration layer mirroring the teacher's `AuthService`: holds
//! `Arc`s to its collaborators and exposes plain `async fn`s returning
//! `Result<_, ApiError>`, with no HTTP framework wrapping — transport is
//! out of scope for this crate.
//!
//! Concurrency: a per-`flow_id` in-process async mutex is held for the
//! duration of `execute`, per the design decision recorded for the
//! per-flow-id concurrency open question (single-process deployment
//! assumption, simpler than optimistic retry given the engine's strictly
//! sequential per-step walk).

use crate::domain::{EngineContext, FlowStatus, FlowStep, FlowStepData, FlowStepType, FlowType, NodeResponse, ResponseStatus, ResponseType};
use crate::engine::{EngineContextStore, FlowEngine, GraphRegistry};
use crate::repository::dual_store::get_resource;
use crate::repository::{ApplicationRepository, ResourceCatalog};
use shared::errors::{ApiError, InvalidRequestReason};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone)]
pub struct FlowService {
    context_store: Arc<EngineContextStore>,
    applications: Arc<ApplicationRepository>,
    resource_catalog: Arc<ResourceCatalog>,
    graphs: Arc<GraphRegistry>,
    engine: Arc<FlowEngine>,
    /// Per-`flow_id` locks, created lazily. Never pruned — bounded in
    /// practice by the number of distinct flows a process sees, which is
    /// acceptable for the single-process deployment this locking strategy
    /// assumes.
    flow_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl FlowService {
    pub fn new(
        context_store: Arc<EngineContextStore>,
        applications: Arc<ApplicationRepository>,
        resource_catalog: Arc<ResourceCatalog>,
        graphs: Arc<GraphRegistry>,
        engine: Arc<FlowEngine>,
    ) -> Self {
        Self { context_store, applications, resource_catalog, graphs, engine, flow_locks: Arc::new(Mutex::new(HashMap::new())) }
    }

    async fn flow_lock(&self, flow_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.flow_locks.lock().await;
        locks.entry(flow_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Starts or resumes a flow and advances it by one caller round trip.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        app_id: &str,
        flow_id: Option<Uuid>,
        flow_type: Option<FlowType>,
        verbose: bool,
        action: &str,
        inputs: HashMap<String, String>,
    ) -> Result<FlowStep, ApiError> {
        let (flow_id, mut ctx, is_resume) = match flow_id {
            Some(id) => {
                let ctx = self.context_store.load(id, &self.graphs).await?.ok_or_else(|| {
                    ApiError::invalid_request_because(
                        format!("unknown flow id '{id}'"),
                        InvalidRequestReason::UnknownFlowResume,
                    )
                })?;
                (id, ctx, true)
            }
            None => {
                let flow_type = flow_type
                    .ok_or_else(|| ApiError::invalid_request("flowType is required to start a new flow"))?;
                let ctx = self.new_context(app_id, flow_type, verbose).await?;
                (ctx.flow_id, ctx, false)
            }
        };

        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        let step_result = self.engine.step(&mut ctx, action, inputs).await;

        match step_result {
            Err(err) => {
                if is_resume {
                    self.context_store.delete(flow_id).await.ok();
                }
                Err(err)
            }
            Ok(response) => {
                let step = project_flow_step(flow_id, &response)?;
                match step.status {
                    FlowStatus::Complete | FlowStatus::Error => {
                        if is_resume {
                            self.context_store.delete(flow_id).await?;
                        }
                    }
                    FlowStatus::Incomplete => {
                        self.context_store.save(&ctx).await?;
                    }
                }
                Ok(step)
            }
        }
    }

    /// Initializes a verbose-mode context with caller-supplied runtime data
    /// (replacing, not merging, per §4.5) and persists it without running
    /// the engine.
    pub async fn initiate_flow(
        &self,
        app_id: &str,
        flow_type: FlowType,
        runtime_data: HashMap<String, String>,
    ) -> Result<Uuid, ApiError> {
        let mut ctx = self.new_context(app_id, flow_type, true).await?;
        ctx.runtime_data = runtime_data;
        self.context_store.save(&ctx).await?;
        Ok(ctx.flow_id)
    }

    async fn new_context(&self, app_id: &str, flow_type: FlowType, verbose: bool) -> Result<EngineContext, ApiError> {
        let application = get_resource(&*self.applications, &*self.resource_catalog, app_id)
            .await?
            .ok_or_else(|| ApiError::invalid_request(format!("unknown application '{app_id}'")))?;
        let graph_id = application.graph_id_for(flow_type)?.to_string();
        let graph = self.graphs.get(&graph_id)?;

        let mut ctx = EngineContext::new(app_id, flow_type, graph_id);
        ctx.graph = Some((*graph).clone());
        ctx.verbose = verbose;
        Ok(ctx)
    }
}

fn project_flow_step(flow_id: Uuid, response: &NodeResponse) -> Result<FlowStep, ApiError> {
    match response.status.unwrap_or(ResponseStatus::Complete) {
        ResponseStatus::Complete => Ok(FlowStep {
            flow_id,
            step_id: None,
            step_type: FlowStepType::None,
            status: FlowStatus::Complete,
            data: FlowStepData::default(),
            assertion: response.assertion.clone(),
            failure_reason: None,
        }),
        ResponseStatus::Failure => Ok(FlowStep {
            flow_id,
            step_id: None,
            step_type: FlowStepType::None,
            status: FlowStatus::Error,
            data: FlowStepData::default(),
            assertion: None,
            failure_reason: response.failure_reason.clone(),
        }),
        ResponseStatus::Incomplete => project_incomplete_step(flow_id, response),
    }
}

fn project_incomplete_step(flow_id: Uuid, response: &NodeResponse) -> Result<FlowStep, ApiError> {
    match response.response_type {
        Some(ResponseType::Redirection) => {
            let redirect_url = response.redirect_url.clone().ok_or_else(|| ApiError::NodeResponseMalformed {
                detail: "redirection response missing redirect_url".to_string(),
            })?;
            Ok(FlowStep {
                flow_id,
                step_id: response.next_node_id.clone(),
                step_type: FlowStepType::Redirection,
                status: FlowStatus::Incomplete,
                data: FlowStepData {
                    inputs: response.required_data.clone(),
                    redirect_url: Some(redirect_url),
                    actions: Vec::new(),
                    additional_data: response.additional_data.clone(),
                },
                assertion: None,
                failure_reason: None,
            })
        }
        Some(ResponseType::View) => {
            if response.required_data.is_empty() && response.actions.is_empty() {
                return Err(ApiError::NodeResponseMalformed {
                    detail: "view response requires required_data or actions".to_string(),
                });
            }
            Ok(FlowStep {
                flow_id,
                step_id: None,
                step_type: FlowStepType::View,
                status: FlowStatus::Incomplete,
                data: FlowStepData {
                    inputs: response.required_data.clone(),
                    redirect_url: None,
                    actions: response.actions.clone(),
                    additional_data: response.additional_data.clone(),
                },
                assertion: None,
                failure_reason: None,
            })
        }
        Some(ResponseType::Retry) => Err(ApiError::NodeResponseMalformed {
            detail: "retry response type is reserved and not yet supported".to_string(),
        }),
        None => Err(ApiError::NodeResponseMalformed {
            detail: "incomplete response carries no response type".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InputSpec;

    #[test]
    fn view_response_without_inputs_or_actions_is_malformed() {
        let response = NodeResponse { status: Some(ResponseStatus::Incomplete), response_type: Some(ResponseType::View), ..NodeResponse::default() };
        assert!(matches!(project_flow_step(Uuid::new_v4(), &response), Err(ApiError::NodeResponseMalformed { .. })));
    }

    #[test]
    fn view_response_with_required_data_projects_incomplete() {
        let response = NodeResponse {
            status: Some(ResponseStatus::Incomplete),
            response_type: Some(ResponseType::View),
            required_data: vec![InputSpec { name: "username".into(), required: true, default: None }],
            ..NodeResponse::default()
        };
        let step = project_flow_step(Uuid::new_v4(), &response).unwrap();
        assert_eq!(step.status, FlowStatus::Incomplete);
        assert_eq!(step.step_type, FlowStepType::View);
    }

    #[test]
    fn redirection_without_url_is_malformed() {
        let response = NodeResponse { status: Some(ResponseStatus::Incomplete), response_type: Some(ResponseType::Redirection), ..NodeResponse::default() };
        assert!(matches!(project_flow_step(Uuid::new_v4(), &response), Err(ApiError::NodeResponseMalformed { .. })));
    }

    #[test]
    fn complete_response_carries_assertion_through() {
        let response = NodeResponse { status: Some(ResponseStatus::Complete), assertion: Some("jwt-here".into()), ..NodeResponse::default() };
        let step = project_flow_step(Uuid::new_v4(), &response).unwrap();
        assert_eq!(step.status, FlowStatus::Complete);
        assert_eq!(step.assertion.as_deref(), Some("jwt-here"));
    }
}
