//! # Router Module
//!
//! The router resolves an incoming request to exactly one declared operation
//! of the loaded [`crate::spec::Contract`].
//!
//! ## Overview
//!
//! Resolution has two stages:
//!
//! 1. **Server**: a declared server must accept the request. Hosts compare
//!    case-insensitively with the default port ignored; `{var}` placeholders
//!    in server URLs match any non-empty text. Relative server URLs accept
//!    any host. The server's base path is stripped from the request path.
//!
//! 2. **Template**: the remaining path is matched against the compiled path
//!    templates, most specific first (fewest placeholders wins). Only
//!    templates that declare the request method take part, so
//!    `GET /pets/mine` resolves to `GET /pets/{petId}` when `/pets/mine`
//!    only declares `DELETE`. A template that matches the path but not the
//!    method is never a partial match.
//!
//! ## Example
//!
//! ```rust,ignore
//! use brrtgate::router::Router;
//! use brrtgate::spec::load_contract;
//! use http::Method;
//!
//! let contract = load_contract("openapi.yaml")?;
//! let router = Router::new(&contract)?;
//!
//! if let Some(m) = router.route(&Method::GET, Some("api.example.com"), "/pets/123") {
//!     println!("Operation: {}", m.route.operation_id);
//!     println!("Pet id: {:?}", m.get_path_param("petId"));
//! }
//! ```

mod core;
mod server;

pub use core::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};
pub(crate) use core::template_specificity;
