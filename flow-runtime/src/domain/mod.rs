//! # Domain Layer
//!
//! The domain layer contains the core business entities for the flow
//! engine. This layer is framework-agnostic: it has no database or HTTP
//! dependency of its own, only `serde`/`sqlx::FromRow` for (de)serialization
//! at the boundaries owned by `engine::context_store` and
//! `repository::dual_store`.
//!
//! ## Module Structure
//!
//! | Module     | Purpose                                              |
//! |------------|-------------------------------------------------------|
//! | `entities` | Graph/node model, engine context, flow step, dual-store resources |

pub mod entities;

pub use entities::*;
