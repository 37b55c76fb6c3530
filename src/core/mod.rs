//! Core types: protocol-agnostic contracts shared by the tool catalog and
//! the gateway service.

pub mod error;
pub mod schema;

pub use error::ValidationError;
pub use schema::{ParamKind, ParamSpec, Params, ToolSpec};
