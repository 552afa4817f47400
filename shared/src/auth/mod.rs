//! # Authentication Primitives
//!
//! Low-level building blocks shared by the token builder/validator: JWT
//! signing and claim verification. There is no password-hashing module
//! here — credential storage and verification fall under "User directory
//! CRUD", which this runtime's scope explicitly excludes (see
//! `SPEC_FULL.md` §1) — and no request-middleware module, since this
//! crate exposes no HTTP transport (see the flow service facade).

pub mod jwt;

pub use jwt::JwtSigner;
