//! # Node & Executor Registries (C1)
//!
//! Two process-wide, read-only-after-boot registries: named task executors,
//! and named graphs. Both are explicit containers constructed once in
//! `main` and handed to the engine/facade by `Arc` reference — there is no
//! implicit global/`static` state here, per the design note on registries.

use crate::domain::Graph;
use async_trait::async_trait;
use shared::errors::ApiError;
use std::collections::HashMap;
use std::sync::Arc;

use super::flow_engine::NodeContext;
use crate::domain::NodeResponse;

/// A reusable, named implementation attached to `Node::TaskExecution`
/// nodes: credential authenticators, attribute collectors, federated-IdP
/// callback handlers.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;
    fn executor_type(&self) -> &str;
    async fn execute(&self, ctx: &NodeContext) -> Result<NodeResponse, ApiError>;
}

/// Lookup table of executors by name. Missing names are a boot-time
/// configuration error for pre-declared graphs, and an `InternalError` at
/// runtime if a node references a name no one registered.
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        self.executors.insert(executor.name().to_string(), executor);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Executor>, ApiError> {
        self.executors.get(name).cloned().ok_or_else(|| ApiError::InternalError {
            message: format!("no executor registered under name '{name}'"),
        })
    }
}

/// Lookup table of graphs by id, resolved from `EngineContext::graph_id` at
/// load time (see engine context store). Graphs are immutable once
/// registered.
#[derive(Default, Clone)]
pub struct GraphRegistry {
    graphs: HashMap<String, Arc<Graph>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, graph: Graph) {
        self.graphs.insert(graph.id.clone(), Arc::new(graph));
    }

    pub fn get(&self, graph_id: &str) -> Result<Arc<Graph>, ApiError> {
        self.graphs.get(graph_id).cloned().ok_or_else(|| ApiError::GraphIntegrity {
            detail: format!("no graph registered under id '{graph_id}'"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopExecutor;

    #[async_trait]
    impl Executor for NoopExecutor {
        fn name(&self) -> &str {
            "noop"
        }
        fn executor_type(&self) -> &str {
            "test"
        }
        async fn execute(&self, _ctx: &NodeContext) -> Result<NodeResponse, ApiError> {
            Ok(NodeResponse::default())
        }
    }

    #[test]
    fn missing_executor_is_internal_error() {
        let registry = ExecutorRegistry::new();
        assert!(matches!(registry.get("missing"), Err(ApiError::InternalError { .. })));
    }

    #[test]
    fn registered_executor_is_found_by_name() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(NoopExecutor));
        assert!(registry.get("noop").is_ok());
    }

    #[test]
    fn missing_graph_is_graph_integrity_error() {
        let registry = GraphRegistry::new();
        assert!(matches!(registry.get("missing"), Err(ApiError::GraphIntegrity { .. })));
    }
}
