//! # Flow Engine
//!
//! The graph-walking core (C1-C4): named executor/graph registries, the
//! per-node-visit walk algorithm, and the context store that makes a flow
//! resumable across calls.

pub mod context_store;
pub mod flow_engine;
pub mod registry;

pub use context_store::EngineContextStore;
pub use flow_engine::{FlowEngine, NodeContext};
pub use registry::{Executor, ExecutorRegistry, GraphRegistry};
