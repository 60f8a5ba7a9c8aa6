//! # brrtgate
//!
//! **brrtgate** enforces an [OpenAPI 3](https://spec.openapis.org/oas/v3.1.0) contract in front
//! of request handlers. Every request is resolved to a declared operation, its parameters and
//! body are validated against the operation's schemas, and its security requirements are
//! checked through an application-supplied authentication function. Requests that fail any of
//! these steps are answered with `400 Bad Request` and never reach the handler; requests that
//! pass reach the handler unchanged, and the handler's status code is returned as is.
//!
//! ## Architecture
//!
//! - **[`spec`]** - loads a contract (YAML or JSON) into an immutable [`Contract`]
//! - **[`router`]** - resolves (method, host, path) to one operation, with no partial match
//! - **[`validator`]** - coerces and checks parameters, decodes and checks bodies
//! - **[`security`]** - calls the [`AuthenticationFunc`] for each security requirement
//! - **[`gate`]** - turns the three steps above into one [`Outcome`] per request
//! - **[`middleware`]** - [`RequestValidatorMiddleware`] binds the gate to the [`dispatcher`]
//! - **[`dispatcher`]** - a small synchronous host: middleware chain plus handlers
//! - **[`logging`]**, **[`runtime_config`]** - environment-driven ambient configuration
//! - **[`cli`]** - the `brrtgate` binary (`lint`, `routes`, `check`)
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Dispatcher
//!     participant Gate as RequestValidatorMiddleware
//!     participant Router
//!     participant Validator as Validation Engine
//!     participant Auth as AuthenticationFunc
//!     participant Handler
//!
//!     Client->>Dispatcher: POST /resource
//!     Dispatcher->>Gate: before(&mut request)
//!     Gate->>Router: route(method, host, path)
//!     alt no server / template / method
//!         Gate-->>Client: 400 Bad Request
//!     end
//!     Gate->>Validator: validate_request(request, match)
//!     alt parameter or body violation
//!         Gate-->>Client: 400 Bad Request
//!     end
//!     opt operation declares security
//!         Gate->>Auth: (AuthContext, AuthenticationInput)
//!         alt every alternative failed
//!             Gate-->>Client: 400 Bad Request
//!         end
//!     end
//!     Gate->>Dispatcher: None (request tagged with ValidatedOperation)
//!     Dispatcher->>Handler: handler(&request)
//!     Handler-->>Client: handler's own status (e.g. 204)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtgate::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
//! use brrtgate::gate::ValidatorOptions;
//! use brrtgate::middleware::RequestValidatorMiddleware;
//! use brrtgate::spec::{load_contract_from_str, SpecFormat};
//! use http::Method;
//! use std::sync::Arc;
//!
//! let contract = load_contract_from_str(r#"
//! openapi: 3.0.0
//! info: {title: demo, version: "1"}
//! servers: [{url: "http://api.example.com"}]
//! paths:
//!   /resource:
//!     get:
//!       parameters:
//!         - {name: id, in: query, schema: {type: integer, maximum: 100}}
//!       responses:
//!         '200': {description: ok}
//! "#, SpecFormat::Yaml)?;
//!
//! let gate = RequestValidatorMiddleware::new(Arc::new(contract), ValidatorOptions::new())?;
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.add_middleware(Arc::new(gate));
//! dispatcher.add_handler(Method::GET, "/resource", |_req| HandlerResponse::empty(200))?;
//!
//! let ok = HandlerRequest::from_url(Method::GET, "http://api.example.com/resource?id=50")?;
//! assert_eq!(dispatcher.dispatch(ok).status, 200);
//!
//! let too_big = HandlerRequest::from_url(Method::GET, "http://api.example.com/resource?id=500")?;
//! assert_eq!(dispatcher.dispatch(too_big).status, 400);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `BRRTGATE_MULTI_ERROR` | report every violation instead of the first |
//! | `BRRTGATE_EXCLUDE_REQUEST_BODY` | skip body validation |
//! | `BRRTGATE_LOG_LEVEL` / `_FORMAT` / `_TARGET_FILTER` / `_INCLUDE_LOCATION` | logging |

pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod security;
pub mod spec;
pub mod validator;

pub use error::{ConfigError, GateError};
pub use gate::{Denial, Outcome, RequestValidator, Stage, ValidatorOptions};
pub use middleware::RequestValidatorMiddleware;
pub use security::{AuthContext, AuthenticationFunc, AuthenticationInput, UserData};
pub use spec::{load_contract, load_contract_from_str, Contract, RouteMeta, SecurityRequirement, SecurityScheme};
