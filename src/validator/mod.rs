//! # Validation Engine
//!
//! Checks a resolved request against its operation: declared parameters in
//! the order path, query, header, cookie, then the request body.
//!
//! By default the first violation wins. With [`ValidationPolicy::multi_error`]
//! every violation is collected into [`GateError::Multiple`].
//!
//! Parameters the operation does not declare are ignored.

mod body;
mod cache;
mod params;

pub use body::decode_body;
pub use cache::SchemaCache;
pub use params::{coerce_primitive, coerce_values};

use crate::dispatcher::HandlerRequest;
use crate::error::GateError;
use crate::router::RouteMatch;
use crate::spec::ParameterMeta;

/// Knobs that change what the validation engine reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Collect every violation instead of stopping at the first
    pub multi_error: bool,
    /// Skip request body checks entirely
    pub exclude_request_body: bool,
}

/// Validate parameters and body of a request that resolved to `matched`.
pub fn validate_request(
    req: &HandlerRequest,
    matched: &RouteMatch,
    cache: &SchemaCache,
    policy: ValidationPolicy,
) -> Result<(), GateError> {
    let mut ordered: Vec<&ParameterMeta> = matched.route.parameters.iter().collect();
    ordered.sort_by_key(|p| p.location.rank());

    let mut errors = Vec::new();
    for param in ordered {
        if let Err(err) = params::check_parameter(req, matched, param, cache) {
            if !policy.multi_error {
                return Err(err);
            }
            errors.push(err);
        }
    }

    if !policy.exclude_request_body {
        if let Err(err) = body::check_body(req, &matched.route, cache) {
            if !policy.multi_error {
                return Err(err);
            }
            errors.push(err);
        }
    }

    match GateError::collapse(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
