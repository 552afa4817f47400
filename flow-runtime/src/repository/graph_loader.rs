//! # Graph Loader (C2 boot wiring)
//!
//! Graphs are pre-declared configuration, not runtime-writable resources:
//! they are parsed once at boot from YAML files under
//! `<resource_dir>/graphs/*.yaml` and registered into a [`GraphRegistry`].
//! An unknown executor name at this point is a boot-time configuration
//! error, per §4.1's "unknown executor name during graph load is fatal at
//! boot" failure mode.

use crate::domain::{Graph, InputSpec, Node};
use crate::engine::{ExecutorRegistry, GraphRegistry};
use crate::repository::resource_catalog::load_yaml_dir;
use serde::Deserialize;
use shared::errors::ApiError;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct GraphDefinition {
    id: String,
    start_node_id: String,
    nodes: Vec<NodeDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum NodeDefinition {
    Start {
        id: String,
        #[serde(default)]
        next_id: Option<String>,
    },
    End {
        id: String,
    },
    Decision {
        id: String,
        #[serde(default)]
        next_ids: Vec<String>,
    },
    Prompt {
        id: String,
        #[serde(default)]
        next_id: Option<String>,
        #[serde(default)]
        inputs: Vec<InputSpec>,
    },
    Redirect {
        id: String,
        #[serde(default)]
        next_id: Option<String>,
    },
    TaskExecution {
        id: String,
        #[serde(default)]
        next_id: Option<String>,
        executor_name: String,
        #[serde(default)]
        inputs: Vec<InputSpec>,
    },
}

impl From<NodeDefinition> for Node {
    fn from(def: NodeDefinition) -> Self {
        match def {
            NodeDefinition::Start { id, next_id } => Node::Start { id, next_id },
            NodeDefinition::End { id } => Node::End { id },
            NodeDefinition::Decision { id, next_ids } => Node::Decision { id, next_ids },
            NodeDefinition::Prompt { id, next_id, inputs } => Node::Prompt { id, next_id, inputs },
            NodeDefinition::Redirect { id, next_id } => Node::Redirect { id, next_id },
            NodeDefinition::TaskExecution { id, next_id, executor_name, inputs } => {
                Node::TaskExecution { id, next_id, executor_name, inputs }
            }
        }
    }
}

/// Parses every `graphs/*.yaml` file under `dir`, validates that each
/// `TaskExecution` node names a registered executor, and returns a fully
/// populated registry. `dir` is the same `resource_dir` the immutable
/// resource catalog reads from.
pub fn load_graphs(dir: &Path, executors: &ExecutorRegistry) -> Result<GraphRegistry, ApiError> {
    let definitions = load_yaml_dir::<GraphDefinition>(&dir.join("graphs"))?;
    let mut registry = GraphRegistry::new();

    for definition in definitions {
        let nodes: Vec<Node> = definition.nodes.into_iter().map(Node::from).collect();
        for node in &nodes {
            if let Node::TaskExecution { executor_name, .. } = node {
                executors.get(executor_name).map_err(|_| ApiError::GraphIntegrity {
                    detail: format!(
                        "graph '{}' node '{}' references unknown executor '{executor_name}'",
                        definition.id,
                        node.id()
                    ),
                })?;
            }
        }
        let graph = Graph::new(definition.start_node_id, nodes).with_id(definition.id);
        registry.register(graph);
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::NodeResponse;
    use crate::engine::NodeContext;
    use std::sync::Arc;

    struct EchoExecutor;

    #[async_trait]
    impl crate::engine::Executor for EchoExecutor {
        fn name(&self) -> &str {
            "echo"
        }
        fn executor_type(&self) -> &str {
            "test"
        }
        async fn execute(&self, _ctx: &NodeContext) -> Result<NodeResponse, ApiError> {
            Ok(NodeResponse::default())
        }
    }

    #[test]
    fn missing_directory_yields_empty_registry() {
        let executors = ExecutorRegistry::new();
        let registry = load_graphs(Path::new("/nonexistent/path"), &executors).unwrap();
        assert!(registry.get("anything").is_err());
    }

    #[test]
    fn node_definition_converts_into_domain_node() {
        let def = NodeDefinition::TaskExecution {
            id: "collect-creds".into(),
            next_id: Some("end".into()),
            executor_name: "echo".into(),
            inputs: vec![InputSpec { name: "username".into(), required: true, default: None }],
        };
        let node: Node = def.into();
        assert_eq!(node.id(), "collect-creds");
    }

    #[test]
    fn executor_registry_lookup_succeeds_for_registered_name() {
        let mut executors = ExecutorRegistry::new();
        executors.register(Arc::new(EchoExecutor));
        assert!(executors.get("echo").is_ok());
    }
}
