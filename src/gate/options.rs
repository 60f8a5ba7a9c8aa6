use super::outcome::Denial;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::runtime_config::RuntimeConfig;
use crate::security::{AuthenticationFunc, UserData};
use crate::validator::ValidationPolicy;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Builds the response sent when a request is denied.
pub type ErrorHandler = Arc<dyn Fn(&HandlerRequest, &Denial) -> HandlerResponse + Send + Sync>;

/// Construction-time configuration of a [`RequestValidator`](super::RequestValidator).
///
/// ```rust
/// use brrtgate::gate::ValidatorOptions;
///
/// let options = ValidatorOptions::new()
///     .user_data("shared".to_string())
///     .multi_error(true);
/// assert!(options.policy().multi_error);
/// ```
#[derive(Clone, Default)]
pub struct ValidatorOptions {
    pub(crate) authentication_func: Option<AuthenticationFunc>,
    pub(crate) user_data: Option<UserData>,
    pub(crate) multi_error: bool,
    pub(crate) exclude_request_body: bool,
    pub(crate) error_handler: Option<ErrorHandler>,
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with `multi_error` and `exclude_request_body` taken from
    /// the environment.
    pub fn from_env() -> Self {
        let config = RuntimeConfig::from_env();
        Self {
            multi_error: config.multi_error,
            exclude_request_body: config.exclude_request_body,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn authentication_func(mut self, func: AuthenticationFunc) -> Self {
        self.authentication_func = Some(func);
        self
    }

    /// Attach a value handed to every authentication call and stored on
    /// allowed requests.
    #[must_use]
    pub fn user_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.user_data = Some(Arc::new(data));
        self
    }

    #[must_use]
    pub fn shared_user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    #[must_use]
    pub fn multi_error(mut self, enabled: bool) -> Self {
        self.multi_error = enabled;
        self
    }

    #[must_use]
    pub fn exclude_request_body(mut self, enabled: bool) -> Self {
        self.exclude_request_body = enabled;
        self
    }

    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HandlerRequest, &Denial) -> HandlerResponse + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            multi_error: self.multi_error,
            exclude_request_body: self.exclude_request_body,
        }
    }

    pub fn has_authentication_func(&self) -> bool {
        self.authentication_func.is_some()
    }
}

impl fmt::Debug for ValidatorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorOptions")
            .field("authentication_func", &self.authentication_func.is_some())
            .field("user_data", &self.user_data.is_some())
            .field("multi_error", &self.multi_error)
            .field("exclude_request_body", &self.exclude_request_body)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}
