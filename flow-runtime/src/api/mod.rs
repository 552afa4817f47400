//! # API Layer
//!
//! Wire DTOs for the flow-execution consumer contract (§6). Routing, JSON
//! extraction, and transport concerns (CORS, auth middleware, HTTP status
//! mapping) are out of scope for this crate — see [`crate::service::FlowService`]
//! for the operations a transport shim would call.
//!
//! ## Endpoint Summary (for a hypothetical HTTP shim)
//!
//! | Method | Path             | DTO                      |
//! |--------|------------------|--------------------------|
//! | POST   | `/flow/execute`  | `FlowExecuteRequest`     |
//! | POST   | `/flow/initiate` | `InitiateFlowRequest`    |
//!
//! ## Related Documentation
//!
//! - Service layer: [`crate::service::FlowService`]
//! - Error responses: [`shared::errors::ApiError`]

pub mod dto;
