//! # Contract Module
//!
//! Loads an OpenAPI 3 document and flattens it into a [`Contract`]: the
//! declared servers, one [`RouteMeta`] per (method, path) operation, and the
//! security scheme definitions.
//!
//! Everything a request check needs is resolved up front:
//!
//! - `$ref`s in parameter and body schemas are inlined
//! - path-level and operation-level parameters are merged
//! - operation security falls back to the document's global security
//! - operations without an `operationId` get a synthesized `"{METHOD} {path}"`
//!
//! Structural problems (a `{placeholder}` without a path parameter, a
//! duplicated placeholder, an unparseable server URL) are collected into
//! [`ContractIssues`] and reported together.

pub use oas3::spec::{SecurityRequirement, SecurityScheme};
mod build;
mod issues;
mod load;
mod types;

pub use build::*;
pub use issues::*;
pub use load::*;
pub use types::*;
