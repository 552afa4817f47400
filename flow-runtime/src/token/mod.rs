//! # Token Builder & Validator (C8/C9)

pub mod builder;
pub mod validator;

pub use builder::{AccessTokenRequest, AppTokenConfig, BuiltToken, IdTokenRequest, RefreshTokenRequest, TokenBuilder};
pub use validator::{RefreshTokenClaims, SubjectTokenClaims, TokenValidator};
