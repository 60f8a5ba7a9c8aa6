//! # Security Module
//!
//! Enforces the security requirements of the matched operation by calling a
//! single application-supplied [`AuthenticationFunc`].
//!
//! ## Overview
//!
//! An operation's `security` list holds alternatives; one alternative names
//! one or more schemes, each with required scopes:
//!
//! - alternatives are OR'd: the first one that passes allows the request
//! - schemes inside an alternative are AND'd: every one must pass
//! - an empty alternative (`{}`) passes without calling anything
//!
//! The authentication function is called once per (scheme, scopes) entry,
//! synchronously and without retries. It receives an [`AuthContext`] (the
//! request and the configured [`UserData`]) and an [`AuthenticationInput`]
//! (scheme name and definition, required scopes, matched operation). Any
//! error it returns fails that alternative; when every alternative has
//! failed the request is denied with the last failure.
//!
//! A secured operation without a configured authentication function is a
//! hard failure, never a pass.
//!
//! ## Example
//!
//! ```rust
//! use brrtgate::security::{AuthContext, AuthenticationFunc, AuthenticationInput};
//! use std::sync::Arc;
//!
//! let auth: AuthenticationFunc = Arc::new(|ctx: &AuthContext<'_>, input: &AuthenticationInput<'_>| {
//!     match ctx.request().get_header("x-api-key") {
//!         Some("let-me-in") => Ok(()),
//!         _ => anyhow::bail!("{} rejected the request", input.scheme_name),
//!     }
//! });
//! ```

mod bearer;

pub use bearer::{bearer_scope_authenticator, BearerScopeAuthenticator};

use crate::dispatcher::{panic_message, HandlerRequest};
use crate::error::GateError;
use crate::spec::{Contract, RouteMeta, SecurityRequirement, SecurityScheme};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Opaque application value handed to every authentication call.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Application-supplied credential check. `Ok(())` accepts the scheme.
pub type AuthenticationFunc =
    Arc<dyn Fn(&AuthContext<'_>, &AuthenticationInput<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Host-side state available to an authentication call.
#[derive(Clone, Copy)]
pub struct AuthContext<'a> {
    request: &'a HandlerRequest,
    user_data: Option<&'a UserData>,
}

impl<'a> AuthContext<'a> {
    pub fn new(request: &'a HandlerRequest, user_data: Option<&'a UserData>) -> Self {
        Self { request, user_data }
    }

    /// The request being authenticated.
    pub fn request(&self) -> &'a HandlerRequest {
        self.request
    }

    pub fn user_data(&self) -> Option<&'a UserData> {
        self.user_data
    }

    /// The configured user data, if it is a `T`.
    pub fn user_data_as<T: Any>(&self) -> Option<&'a T> {
        self.user_data.and_then(|data| (**data).downcast_ref::<T>())
    }
}

/// One (scheme, scopes) entry of a security alternative.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticationInput<'a> {
    pub scheme_name: &'a str,
    pub scheme: &'a SecurityScheme,
    pub scopes: &'a [String],
    pub route: &'a RouteMeta,
}

fn check_alternative(
    contract: &Contract,
    route: &RouteMeta,
    alternative: &SecurityRequirement,
    ctx: &AuthContext<'_>,
    func: &AuthenticationFunc,
) -> Result<(), GateError> {
    for (scheme_name, scopes) in &alternative.0 {
        let denied = |cause: String| GateError::AuthenticationDenied {
            scheme: scheme_name.clone(),
            scopes: scopes.clone(),
            cause,
        };

        let Some(scheme) = contract.security_scheme(scheme_name) else {
            return Err(denied("security scheme is not declared in components".to_string()));
        };

        let input = AuthenticationInput {
            scheme_name,
            scheme,
            scopes,
            route,
        };
        match std::panic::catch_unwind(AssertUnwindSafe(|| func(ctx, &input))) {
            Ok(result) => result.map_err(|e| denied(format!("{e:#}")))?,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %ctx.request().request_id,
                    scheme = %scheme_name,
                    panic_message = %message,
                    "Authentication function panicked"
                );
                return Err(denied(format!("authentication function panicked: {message}")));
            }
        }

        debug!(
            request_id = %ctx.request().request_id,
            scheme = %scheme_name,
            scopes = ?scopes,
            "Security scheme accepted"
        );
    }
    Ok(())
}

/// Enforce the security requirements of `route`.
pub fn authenticate(
    contract: &Contract,
    route: &RouteMeta,
    ctx: &AuthContext<'_>,
    func: Option<&AuthenticationFunc>,
) -> Result<(), GateError> {
    let request_id = ctx.request().request_id;
    let mut last_error: Option<GateError> = None;

    for (idx, alternative) in route.security.iter().enumerate() {
        if alternative.0.is_empty() {
            debug!(request_id = %request_id, alternative = idx, "Anonymous security alternative");
            return Ok(());
        }
        let Some(func) = func else {
            warn!(
                request_id = %request_id,
                operation_id = %route.operation_id,
                "Secured operation reached without an authentication function"
            );
            return Err(GateError::MissingAuthenticator {
                operation: route.operation_id.to_string(),
            });
        };

        match check_alternative(contract, route, alternative, ctx, func) {
            Ok(()) => {
                info!(
                    request_id = %request_id,
                    operation_id = %route.operation_id,
                    alternative = idx,
                    "Security requirement satisfied"
                );
                return Ok(());
            }
            Err(err) => {
                debug!(
                    request_id = %request_id,
                    alternative = idx,
                    error = %err,
                    "Security alternative failed"
                );
                last_error = Some(err);
            }
        }
    }

    match last_error {
        Some(err) => {
            warn!(
                request_id = %request_id,
                operation_id = %route.operation_id,
                alternatives = route.security.len(),
                error = %err,
                "Authentication denied"
            );
            Err(err)
        }
        None => Ok(()),
    }
}
