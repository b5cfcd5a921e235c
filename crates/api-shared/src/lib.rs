//! # API Shared
//!
//! Shared definitions for the vital-signs report APIs.
//!
//! Contains:
//! - Wire types exchanged over HTTP (`wire` module), with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` to answer requests and by `vitals-cli` to read the answers.

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
