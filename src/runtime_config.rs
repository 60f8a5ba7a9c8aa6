//! # Runtime Configuration Module
//!
//! Environment-variable configuration for the request validator.
//!
//! ## Environment Variables
//!
//! ### `BRRTGATE_MULTI_ERROR`
//!
//! Collect every parameter and body violation of a request into one denial
//! instead of stopping at the first. Default: off.
//!
//! ### `BRRTGATE_EXCLUDE_REQUEST_BODY`
//!
//! Skip request body validation entirely. Default: off.
//!
//! Both accept `1`, `true`, `yes` or `on` (case-insensitive) as enabled; any
//! other value counts as disabled.
//!
//! ## Usage
//!
//! ```rust
//! use brrtgate::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("multi error: {}", config.multi_error);
//! ```

use std::env;

pub const MULTI_ERROR_ENV: &str = "BRRTGATE_MULTI_ERROR";
pub const EXCLUDE_REQUEST_BODY_ENV: &str = "BRRTGATE_EXCLUDE_REQUEST_BODY";

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Report every violation instead of the first (default: false)
    pub multi_error: bool,
    /// Skip request body validation (default: false)
    pub exclude_request_body: bool,
}

pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|v| parse_flag(&v)).unwrap_or(false)
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        RuntimeConfig {
            multi_error: env_flag(MULTI_ERROR_ENV),
            exclude_request_body: env_flag(EXCLUDE_REQUEST_BODY_ENV),
        }
    }
}
