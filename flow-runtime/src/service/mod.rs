//! # Service Layer
//!
//! The flow service facade (C5) orchestrates the engine context store, the
//! graph/executor registries, and the flow engine into the two operations
//! external callers need: `execute` and `initiate_flow`.

pub mod flow_service;

pub use flow_service::FlowService;
