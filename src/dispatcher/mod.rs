//! # Dispatcher Module
//!
//! The dispatcher is the host side of the middleware: it carries requests
//! through the ordered middleware chain and into the registered handler.
//!
//! ## Request Flow
//!
//! 1. Each middleware's `before` hook runs in registration order. The first
//!    hook that returns a response short-circuits: later `before` hooks and
//!    the handler are skipped.
//! 2. Otherwise the handler registered for the request's method and path runs.
//!    Missing handlers answer `404`; handler panics are caught and answer `500`.
//! 3. Every middleware's `after` hook sees the final response.
//!
//! ## Handler Registration
//!
//! ```rust,ignore
//! use brrtgate::dispatcher::{Dispatcher, HandlerResponse};
//! use http::Method;
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.add_handler(Method::GET, "/pets/{id}", |req| {
//!     HandlerResponse::json(200, serde_json::json!({ "path": req.path }))
//! })?;
//! ```

mod core;
mod request;

pub(crate) use core::panic_message;
pub use core::{Dispatcher, Handler, HandlerRequest, HandlerResponse, HeaderVec, MAX_INLINE_HEADERS};
pub use request::{media_type_essence, parse_cookies, parse_query_params};
