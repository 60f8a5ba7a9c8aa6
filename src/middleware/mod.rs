//! # Middleware Module
//!
//! Hooks that run around handler execution in the [`Dispatcher`](crate::dispatcher::Dispatcher).
//!
//! - [`RequestValidatorMiddleware`] answers out-of-contract requests with 400
//!   and tags allowed ones with the resolved operation and user data
//! - [`TracingMiddleware`] wraps each request in a `request` span

mod core;
mod request_validator;
mod tracing;

pub use core::Middleware;
pub use request_validator::{
    get_user_data, get_validated_operation, RequestUserData, RequestValidatorMiddleware, ValidatedOperation,
};
pub use tracing::TracingMiddleware;
