//! Error taxonomy for request checks and middleware construction.

use crate::spec::ParameterLocation;
use http::StatusCode;
use std::fmt;

/// Why a request was denied.
///
/// Every variant maps to `400 Bad Request`: the middleware never answers
/// 401, 403 or 404 on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// No declared server/path/method matched the request
    NoMatchingRoute {
        method: String,
        host: Option<String>,
        path: String,
    },
    /// A parameter is missing, cannot be coerced, or violates its schema
    ParameterViolation {
        param: String,
        location: ParameterLocation,
        reason: String,
    },
    /// The request body is missing, undecodable, of an undeclared content
    /// type, or violates its schema
    BodyViolation { reason: String },
    /// The operation is secured but no authentication function was configured
    MissingAuthenticator { operation: String },
    /// Every security alternative failed; carries the last failure
    AuthenticationDenied {
        scheme: String,
        scopes: Vec<String>,
        cause: String,
    },
    /// All violations found when multi-error reporting is enabled
    Multiple(Vec<GateError>),
}

impl GateError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Short machine-readable label, used as a structured log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::NoMatchingRoute { .. } => "no_matching_route",
            GateError::ParameterViolation { .. } => "parameter_violation",
            GateError::BodyViolation { .. } => "body_violation",
            GateError::MissingAuthenticator { .. } => "missing_authenticator",
            GateError::AuthenticationDenied { .. } => "authentication_denied",
            GateError::Multiple(_) => "multiple",
        }
    }

    /// Flatten a list of violations: none is `None`, one stays as is, more
    /// become [`GateError::Multiple`].
    pub(crate) fn collapse(mut errors: Vec<GateError>) -> Option<GateError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(GateError::Multiple(errors)),
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::NoMatchingRoute { method, host, path } => match host {
                Some(host) => write!(f, "no matching operation was found for {method} {host}{path}"),
                None => write!(f, "no matching operation was found for {method} {path}"),
            },
            GateError::ParameterViolation {
                param,
                location,
                reason,
            } => write!(f, "parameter \"{param}\" in {location} has an error: {reason}"),
            GateError::BodyViolation { reason } => write!(f, "request body has an error: {reason}"),
            GateError::MissingAuthenticator { operation } => write!(
                f,
                "operation {operation} requires authentication but no authentication function is configured"
            ),
            GateError::AuthenticationDenied {
                scheme,
                scopes,
                cause,
            } => {
                if scopes.is_empty() {
                    write!(f, "security requirement failed for scheme {scheme}: {cause}")
                } else {
                    write!(
                        f,
                        "security requirement failed for scheme {scheme} (scopes: {}): {cause}",
                        scopes.join(", ")
                    )
                }
            }
            GateError::Multiple(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                write!(f, "{}", messages.join(" | "))
            }
        }
    }
}

impl std::error::Error for GateError {}

/// Construction-time failure of the request validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Secured operations exist but no authentication function was given
    MissingAuthenticator { operations: Vec<String> },
    /// A parameter or body schema failed to compile
    InvalidSchema { location: String, reason: String },
    /// A server or path template could not be compiled into a matcher
    InvalidRoute { reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingAuthenticator { operations } => write!(
                f,
                "validator configuration error: {} secured operation(s) but no authentication function: {}",
                operations.len(),
                operations.join(", ")
            ),
            ConfigError::InvalidSchema { location, reason } => {
                write!(f, "validator configuration error: schema at {location} does not compile: {reason}")
            }
            ConfigError::InvalidRoute { reason } => {
                write!(f, "validator configuration error: cannot compile routes: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<regex::Error> for ConfigError {
    fn from(err: regex::Error) -> Self {
        ConfigError::InvalidRoute {
            reason: err.to_string(),
        }
    }
}
