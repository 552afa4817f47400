//! # Repository Layer
//!
//! Data access for the flow engine: authorization code/request stores
//! (C6/C7), and the dual-store composite helpers (C10) that merge database
//! and immutable-file-backed identity providers and user schemas.

pub mod application_repository;
pub mod authz_code_repository;
pub mod authz_request_repository;
pub mod dual_store;
pub mod graph_loader;
pub mod idp_repository;
pub mod resource_catalog;
pub mod user_schema_repository;

pub use application_repository::ApplicationRepository;
pub use authz_code_repository::AuthorizationCodeRepository;
pub use authz_request_repository::AuthorizationRequestRepository;
pub use graph_loader::load_graphs;
pub use idp_repository::IdentityProviderRepository;
pub use resource_catalog::ResourceCatalog;
pub use user_schema_repository::UserSchemaRepository;
