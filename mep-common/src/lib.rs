//! # me-pipeline Common Library
//!
//! Shared code for the me-pipeline tools including:
//! - Error types
//! - Bootstrap configuration, logging setup and tool environment
//! - Pipeline parameter schemas and their serializers

pub mod config;
pub mod error;
pub mod params;

pub use error::{Error, Result};
pub use params::{ParamKind, ParamValue, Params, ParamsKind};
