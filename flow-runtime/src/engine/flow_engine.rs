//! # Flow Engine (C2/C4)
//!
//! Walks an [`EngineContext`]'s graph node by node, starting from
//! `current_node` (or the graph's start node on the first call), merging
//! executor responses back into the context, until it reaches a node that
//! requires a round trip to the caller — a `Prompt` awaiting input, a
//! `Redirect`, a terminal `End` — or an executor reports failure.
//!
//! One call to [`FlowEngine::step`] performs the whole walk for a single
//! caller round trip; it never returns control mid-graph except at those
//! three stopping points.

use crate::domain::{
    AuthenticatedUser, EngineContext, ExecutionAttempt, ExecutionStatus, FlowType, InputSpec, Node,
    NodeExecutionRecord, NodeResponse, ResponseStatus, ResponseType,
};
use crate::engine::registry::ExecutorRegistry;
use chrono::Utc;
use shared::errors::ApiError;
use std::collections::HashMap;
use uuid::Uuid;

/// The read-only view of an in-flight flow an [`Executor`](super::registry::Executor)
/// is handed for a single node visit. Built fresh by the engine for every
/// `TaskExecution` node — executors never see the mutable `EngineContext`
/// directly, only this projection.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub flow_id: Uuid,
    pub app_id: String,
    pub trace_id: Uuid,
    pub node_id: String,
    pub current_action: String,
    pub node_input_data: Vec<InputSpec>,
    pub user_inputs: HashMap<String, String>,
    pub runtime_data: HashMap<String, String>,
    pub authenticated_user: AuthenticatedUser,
    pub execution_history: HashMap<String, NodeExecutionRecord>,
}

impl NodeContext {
    fn build(ctx: &EngineContext, node: &Node, current_action: &str) -> Self {
        Self {
            flow_id: ctx.flow_id,
            app_id: ctx.app_id.clone(),
            trace_id: ctx.trace_id,
            node_id: node.id().to_string(),
            current_action: current_action.to_string(),
            node_input_data: node.input_data().to_vec(),
            user_inputs: ctx.user_inputs.clone(),
            runtime_data: ctx.runtime_data.clone(),
            authenticated_user: ctx.authenticated_user.clone(),
            execution_history: ctx.execution_history.clone(),
        }
    }
}

/// A bound on how many nodes a single `step` may traverse before giving up.
/// Guards against a graph-authoring mistake producing an infinite loop of
/// `Start`/`Decision` nodes with no `Prompt`/`Redirect`/`End` in between.
const MAX_NODES_PER_STEP: usize = 64;

#[derive(Clone)]
pub struct FlowEngine {
    executors: ExecutorRegistry,
}

impl FlowEngine {
    pub fn new(executors: ExecutorRegistry) -> Self {
        Self { executors }
    }

    /// Advances `ctx` from its current node until the walk reaches a
    /// stopping point, mutating `ctx` in place (current node, user inputs,
    /// runtime data, authenticated user, execution history) and returning
    /// the `NodeResponse` to project to the caller.
    pub async fn step(
        &self,
        ctx: &mut EngineContext,
        action: &str,
        inputs: HashMap<String, String>,
    ) -> Result<NodeResponse, ApiError> {
        let graph = ctx.graph.clone().ok_or_else(|| ApiError::GraphIntegrity {
            detail: "engine context has no resolved graph".to_string(),
        })?;

        ctx.current_action = action.to_string();
        ctx.user_inputs.extend(inputs);

        let mut node_id = match &ctx.current_node {
            Some(id) => id.clone(),
            None => graph
                .start_node()
                .ok_or_else(|| ApiError::GraphIntegrity {
                    detail: format!("graph '{}' has no start node", graph.id),
                })?
                .id()
                .to_string(),
        };

        for _ in 0..MAX_NODES_PER_STEP {
            let node = graph.node(&node_id).ok_or_else(|| ApiError::GraphIntegrity {
                detail: format!("node '{node_id}' not found in graph '{}'", graph.id),
            })?;

            // `current_action` is one-shot: it names the action the caller
            // submitted for the node it suspended at, not for every node a
            // single `step` walk happens to pass through afterward. Taking
            // it here hands it to whichever node consumes it (a `Decision`
            // branch, or an executor via `NodeContext`) and clears it for
            // the rest of this walk.
            let current_action = std::mem::take(&mut ctx.current_action);

            match node {
                Node::Start { next_id, .. } => {
                    record_history(ctx, &node_id, ExecutionStatus::Complete, None, None);
                    node_id = next_id.clone().ok_or_else(|| ApiError::GraphIntegrity {
                        detail: format!("start node '{node_id}' has no successor"),
                    })?;
                }
                Node::End { .. } => {
                    ctx.current_node = Some(node_id.clone());
                    let response = NodeResponse {
                        status: Some(ResponseStatus::Complete),
                        response_type: None,
                        authenticated_user: ctx.authenticated_user.clone(),
                        ..NodeResponse::default()
                    };
                    ctx.current_node_response = Some(response.clone());
                    record_history(ctx, &node_id, ExecutionStatus::Complete, None, None);
                    return Ok(response);
                }
                Node::Decision { next_ids, .. } => {
                    node_id = resolve_decision(&current_action, next_ids)?;
                    record_history(ctx, &node_id, ExecutionStatus::Complete, None, None);
                }
                Node::Prompt { next_id, inputs: required, .. } => {
                    if let Some(missing) = first_missing_required(required, &ctx.user_inputs) {
                        ctx.current_node = Some(node_id.clone());
                        let response = NodeResponse {
                            status: Some(ResponseStatus::Incomplete),
                            response_type: Some(ResponseType::View),
                            required_data: vec![missing],
                            ..NodeResponse::default()
                        };
                        ctx.current_node_response = Some(response.clone());
                        record_history(ctx, &node_id, ExecutionStatus::Incomplete, None, None);
                        return Ok(response);
                    }
                    record_history(ctx, &node_id, ExecutionStatus::Complete, None, None);
                    node_id = next_id.clone().ok_or_else(|| ApiError::GraphIntegrity {
                        detail: format!("prompt node '{node_id}' has no successor"),
                    })?;
                }
                Node::Redirect { next_id, .. } => {
                    ctx.current_node = Some(node_id.clone());
                    let response = NodeResponse {
                        status: Some(ResponseStatus::Incomplete),
                        response_type: Some(ResponseType::Redirection),
                        next_node_id: next_id.clone(),
                        redirect_url: ctx.runtime_data.get("redirect_url").cloned(),
                        ..NodeResponse::default()
                    };
                    ctx.current_node_response = Some(response.clone());
                    record_history(ctx, &node_id, ExecutionStatus::Incomplete, None, None);
                    return Ok(response);
                }
                Node::TaskExecution { next_id, executor_name, .. } => {
                    let executor = self.executors.get(executor_name)?;
                    let node_ctx = NodeContext::build(ctx, node, &current_action);
                    let start_time = Utc::now();
                    let response = executor.execute(&node_ctx).await;
                    let end_time = Utc::now();

                    let (status, response) = match response {
                        Ok(response) => {
                            let status = response.status.unwrap_or(ResponseStatus::Complete);
                            (to_execution_status(status), response)
                        }
                        Err(err) => {
                            record_history_timed(
                                ctx,
                                &node_id,
                                start_time,
                                end_time,
                                ExecutionStatus::Error,
                                Some(executor_name.clone()),
                                Some(executor.executor_type().to_string()),
                            );
                            return Err(err);
                        }
                    };

                    record_history_timed(
                        ctx,
                        &node_id,
                        start_time,
                        end_time,
                        status,
                        Some(executor_name.clone()),
                        Some(executor.executor_type().to_string()),
                    );
                    merge_response_into_context(ctx, &response);

                    match response.status {
                        Some(ResponseStatus::Incomplete) | Some(ResponseStatus::Failure) | None => {
                            ctx.current_node = Some(node_id.clone());
                            ctx.current_node_response = Some(response.clone());
                            return Ok(response);
                        }
                        Some(ResponseStatus::Complete) => {
                            // Only `Decision` nodes let the response choose
                            // the next hop; every other node type, including
                            // `TaskExecution`, follows its own static
                            // successor regardless of what the executor
                            // suggested.
                            node_id = next_id.clone().ok_or_else(|| ApiError::GraphIntegrity {
                                detail: format!("task node '{node_id}' has no successor"),
                            })?;
                        }
                    }
                }
            }
        }

        Err(ApiError::GraphIntegrity {
            detail: format!("graph '{}' exceeded {MAX_NODES_PER_STEP} node visits in one step", graph.id),
        })
    }
}

/// Chooses the decision node's successor. The current action is expected to
/// name one of the decision's `next_ids` directly (a graph author wires
/// decision branches by id, not by an opaque condition language); if the
/// action doesn't match any branch the first branch is taken as default.
fn resolve_decision(current_action: &str, next_ids: &[String]) -> Result<String, ApiError> {
    if let Some(matched) = next_ids.iter().find(|id| id.as_str() == current_action) {
        return Ok(matched.clone());
    }
    next_ids
        .first()
        .cloned()
        .ok_or_else(|| ApiError::GraphIntegrity { detail: "decision node has no branches".to_string() })
}

fn first_missing_required(required: &[InputSpec], provided: &HashMap<String, String>) -> Option<InputSpec> {
    required
        .iter()
        .find(|spec| spec.required && !provided.contains_key(&spec.name) && spec.default.is_none())
        .cloned()
}

fn to_execution_status(status: ResponseStatus) -> ExecutionStatus {
    match status {
        ResponseStatus::Complete => ExecutionStatus::Complete,
        ResponseStatus::Incomplete => ExecutionStatus::Incomplete,
        ResponseStatus::Failure => ExecutionStatus::Error,
    }
}

/// Folds a `TaskExecution` node's `NodeResponse` into the context per
/// §4.4.3: runtime data always merges in; the authenticated user is only
/// replaced when the response actually authenticated someone, or the flow is
/// a registration (where an unauthenticated-but-newly-created user is still
/// the flow's subject); attributes accumulate across replacements rather
/// than being overwritten wholesale, with the response winning ties; and a
/// freshly learned user id is recorded into `runtime_data["userID"]` only if
/// nothing has claimed that slot yet.
fn merge_response_into_context(ctx: &mut EngineContext, response: &NodeResponse) {
    ctx.runtime_data.extend(response.runtime_data.clone());

    if response.authenticated_user.is_authenticated || ctx.flow_type == FlowType::Registration {
        let mut attributes = ctx.authenticated_user.attributes.clone();
        attributes.extend(response.authenticated_user.attributes.clone());
        ctx.authenticated_user = AuthenticatedUser { attributes, ..response.authenticated_user.clone() };
    }

    if let Some(user_id) = response.authenticated_user.user_id.as_deref() {
        if !user_id.is_empty() && !ctx.runtime_data.contains_key("userID") {
            ctx.runtime_data.insert("userID".to_string(), user_id.to_string());
        }
    }
}

fn record_history(
    ctx: &mut EngineContext,
    node_id: &str,
    status: ExecutionStatus,
    executor_name: Option<String>,
    executor_type: Option<String>,
) {
    let now = Utc::now();
    record_history_timed(ctx, node_id, now, now, status, executor_name, executor_type);
}

#[allow(clippy::too_many_arguments)]
fn record_history_timed(
    ctx: &mut EngineContext,
    node_id: &str,
    start_time: chrono::DateTime<Utc>,
    end_time: chrono::DateTime<Utc>,
    status: ExecutionStatus,
    executor_name: Option<String>,
    executor_type: Option<String>,
) {
    record_attempt(ctx, node_id, start_time, end_time, status);
    if let Some(record) = ctx.execution_history.get_mut(node_id) {
        record.executor_name = executor_name;
        record.executor_type = executor_type;
    }
}

fn record_attempt(
    ctx: &mut EngineContext,
    node_id: &str,
    start_time: chrono::DateTime<Utc>,
    end_time: chrono::DateTime<Utc>,
    status: ExecutionStatus,
) {
    let next_step = ctx.execution_history.len() as u32 + 1;
    let record = ctx.execution_history.entry(node_id.to_string()).or_insert_with(|| NodeExecutionRecord {
        step: next_step,
        status,
        executions: Vec::new(),
        start_time,
        end_time,
        executor_name: None,
        executor_type: None,
    });
    let attempt_no = record.executions.len() as u32 + 1;
    record.executions.push(ExecutionAttempt { attempt: attempt_no, start_time, end_time, status });
    record.status = status;
    record.end_time = end_time;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlowType, Graph};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoExecutor;

    #[async_trait]
    impl crate::engine::registry::Executor for EchoExecutor {
        fn name(&self) -> &str {
            "echo"
        }
        fn executor_type(&self) -> &str {
            "test"
        }
        async fn execute(&self, _ctx: &NodeContext) -> Result<NodeResponse, ApiError> {
            Ok(NodeResponse { status: Some(ResponseStatus::Complete), ..NodeResponse::default() })
        }
    }

    fn build_graph() -> Graph {
        Graph::new(
            "start",
            vec![
                Node::Start { id: "start".into(), next_id: Some("prompt".into()) },
                Node::Prompt {
                    id: "prompt".into(),
                    next_id: Some("task".into()),
                    inputs: vec![InputSpec { name: "username".into(), required: true, default: None }],
                },
                Node::TaskExecution {
                    id: "task".into(),
                    next_id: Some("end".into()),
                    executor_name: "echo".into(),
                    inputs: vec![],
                },
                Node::End { id: "end".into() },
            ],
        )
        .with_id("test-graph")
    }

    fn engine() -> FlowEngine {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(EchoExecutor));
        FlowEngine::new(registry)
    }

    #[tokio::test]
    async fn stops_at_prompt_awaiting_required_input() {
        let engine = engine();
        let mut ctx = EngineContext::new("app-1", FlowType::Authentication, "test-graph");
        ctx.graph = Some(build_graph());

        let response = engine.step(&mut ctx, "start", HashMap::new()).await.unwrap();
        assert_eq!(response.status, Some(ResponseStatus::Incomplete));
        assert_eq!(ctx.current_node.as_deref(), Some("prompt"));
    }

    #[tokio::test]
    async fn walks_through_to_completion_once_inputs_are_supplied() {
        let engine = engine();
        let mut ctx = EngineContext::new("app-1", FlowType::Authentication, "test-graph");
        ctx.graph = Some(build_graph());

        engine.step(&mut ctx, "start", HashMap::new()).await.unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("username".to_string(), "alice".to_string());
        let response = engine.step(&mut ctx, "submit", inputs).await.unwrap();

        assert_eq!(response.status, Some(ResponseStatus::Complete));
        assert_eq!(ctx.current_node.as_deref(), Some("end"));
        assert!(ctx.execution_history.contains_key("task"));
    }

    #[test]
    fn decision_prefers_the_action_naming_a_branch() {
        let branches = vec!["a".to_string(), "b".to_string()];
        assert_eq!(resolve_decision("b", &branches).unwrap(), "b");
        assert_eq!(resolve_decision("unmatched", &branches).unwrap(), "a");
    }

    #[tokio::test]
    async fn start_and_task_nodes_both_get_history_records() {
        let engine = engine();
        let mut ctx = EngineContext::new("app-1", FlowType::Authentication, "test-graph");
        ctx.graph = Some(build_graph());

        let mut inputs = HashMap::new();
        inputs.insert("username".to_string(), "alice".to_string());
        engine.step(&mut ctx, "start", HashMap::new()).await.unwrap();
        engine.step(&mut ctx, "submit", inputs).await.unwrap();

        assert!(ctx.execution_history.contains_key("start"));
        let task_record = ctx.execution_history.get("task").unwrap();
        assert_eq!(task_record.executor_name.as_deref(), Some("echo"));
        assert_eq!(task_record.executor_type.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn history_steps_are_numbered_in_visit_order() {
        let engine = engine();
        let mut ctx = EngineContext::new("app-1", FlowType::Authentication, "test-graph");
        ctx.graph = Some(build_graph());

        let mut inputs = HashMap::new();
        inputs.insert("username".to_string(), "alice".to_string());
        engine.step(&mut ctx, "start", HashMap::new()).await.unwrap();
        engine.step(&mut ctx, "submit", inputs).await.unwrap();

        assert_eq!(ctx.execution_history.get("start").unwrap().step, 1);
        assert_eq!(ctx.execution_history.get("prompt").unwrap().step, 2);
        assert_eq!(ctx.execution_history.get("task").unwrap().step, 3);
        assert_eq!(ctx.execution_history.get("end").unwrap().step, 4);
    }

    struct MisdirectingExecutor;

    #[async_trait]
    impl crate::engine::registry::Executor for MisdirectingExecutor {
        fn name(&self) -> &str {
            "misdirect"
        }
        fn executor_type(&self) -> &str {
            "test"
        }
        async fn execute(&self, _ctx: &NodeContext) -> Result<NodeResponse, ApiError> {
            Ok(NodeResponse {
                status: Some(ResponseStatus::Complete),
                next_node_id: Some("prompt".to_string()),
                ..NodeResponse::default()
            })
        }
    }

    #[tokio::test]
    async fn task_node_ignores_response_next_node_id_and_follows_its_own_successor() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(MisdirectingExecutor));
        let engine = FlowEngine::new(registry);

        let graph = Graph::new(
            "task",
            vec![
                Node::TaskExecution {
                    id: "task".into(),
                    next_id: Some("end".into()),
                    executor_name: "misdirect".into(),
                    inputs: vec![],
                },
                Node::End { id: "end".into() },
            ],
        )
        .with_id("misdirect-graph");

        let mut ctx = EngineContext::new("app-1", FlowType::Authentication, "misdirect-graph");
        ctx.graph = Some(graph);

        let response = engine.step(&mut ctx, "start", HashMap::new()).await.unwrap();
        assert_eq!(response.status, Some(ResponseStatus::Complete));
        assert_eq!(ctx.current_node.as_deref(), Some("end"));
    }

    #[test]
    fn merge_replaces_authenticated_user_only_when_authenticated_or_registration() {
        let mut ctx = EngineContext::new("app-1", FlowType::Authentication, "g");
        let response = NodeResponse {
            authenticated_user: AuthenticatedUser { is_authenticated: false, ..AuthenticatedUser::default() },
            ..NodeResponse::default()
        };
        merge_response_into_context(&mut ctx, &response);
        assert!(!ctx.authenticated_user.is_authenticated);

        let mut reg_ctx = EngineContext::new("app-1", FlowType::Registration, "g");
        merge_response_into_context(&mut reg_ctx, &response);
        assert_eq!(reg_ctx.authenticated_user.user_id, response.authenticated_user.user_id);
    }

    #[test]
    fn merge_accumulates_attributes_with_response_winning_conflicts() {
        let mut ctx = EngineContext::new("app-1", FlowType::Authentication, "g");
        ctx.authenticated_user.attributes.insert("locale".to_string(), "en".to_string());
        ctx.authenticated_user.attributes.insert("plan".to_string(), "free".to_string());

        let mut new_attrs = HashMap::new();
        new_attrs.insert("plan".to_string(), "pro".to_string());
        let response = NodeResponse {
            authenticated_user: AuthenticatedUser { is_authenticated: true, attributes: new_attrs, ..AuthenticatedUser::default() },
            ..NodeResponse::default()
        };
        merge_response_into_context(&mut ctx, &response);

        assert_eq!(ctx.authenticated_user.attributes.get("locale").map(String::as_str), Some("en"));
        assert_eq!(ctx.authenticated_user.attributes.get("plan").map(String::as_str), Some("pro"));
    }

    #[test]
    fn merge_sets_runtime_user_id_only_when_unset() {
        let mut ctx = EngineContext::new("app-1", FlowType::Authentication, "g");
        let response = NodeResponse {
            authenticated_user: AuthenticatedUser {
                is_authenticated: true,
                user_id: Some("user-1".to_string()),
                ..AuthenticatedUser::default()
            },
            ..NodeResponse::default()
        };
        merge_response_into_context(&mut ctx, &response);
        assert_eq!(ctx.runtime_data.get("userID").map(String::as_str), Some("user-1"));

        let second = NodeResponse {
            authenticated_user: AuthenticatedUser {
                is_authenticated: true,
                user_id: Some("user-2".to_string()),
                ..AuthenticatedUser::default()
            },
            ..NodeResponse::default()
        };
        merge_response_into_context(&mut ctx, &second);
        assert_eq!(ctx.runtime_data.get("userID").map(String::as_str), Some("user-1"));
    }
}
