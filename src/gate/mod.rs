//! # Gate Module
//!
//! The decision translator: turns the router, validation engine and
//! authentication dispatcher into one terminal [`Outcome`] per request.
//!
//! ```text
//! Resolving ──match──▶ Validating ──ok──▶ Authenticating ──ok──▶ Allowed
//!     │                    │                    │
//!  no match            violation           all alternatives failed
//!     ▼                    ▼                    ▼
//!                       Denied (400)
//! ```
//!
//! Authenticating is skipped for operations without security requirements.
//! Every denial carries `400 Bad Request`; the wrapped handler never runs
//! for a denied request, and its status passes through untouched otherwise.

mod core;
mod options;
mod outcome;

pub use core::RequestValidator;
pub use options::{ErrorHandler, ValidatorOptions};
pub use outcome::{Denial, Outcome, Stage};
