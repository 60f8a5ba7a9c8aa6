use std::sync::Arc;

use super::Middleware;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::error::ConfigError;
use crate::gate::{Outcome, RequestValidator, ValidatorOptions};
use crate::router::ParamVec;
use crate::security::UserData;
use crate::spec::Contract;

/// Stored in `HandlerRequest::extensions` for every allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOperation {
    pub operation_id: Arc<str>,
    /// Template the request resolved to, without the server base path.
    /// The dispatcher runs the handler registered for exactly this template.
    pub path_pattern: Arc<str>,
    pub path_params: ParamVec,
}

/// Extension slot holding the configured user data.
#[derive(Clone)]
pub struct RequestUserData(pub UserData);

/// The operation an allowed request resolved to.
pub fn get_validated_operation(req: &HandlerRequest) -> Option<&ValidatedOperation> {
    req.extensions.get::<ValidatedOperation>()
}

/// The user data configured on the validator, if any.
pub fn get_user_data(req: &HandlerRequest) -> Option<&UserData> {
    req.extensions.get::<RequestUserData>().map(|d| &d.0)
}

/// Runs every request through a [`RequestValidator`] before the handler.
///
/// Denied requests are answered here and never reach the handler; allowed
/// ones continue with [`ValidatedOperation`] and the user data attached.
pub struct RequestValidatorMiddleware {
    validator: Arc<RequestValidator>,
}

impl RequestValidatorMiddleware {
    pub fn new(contract: Arc<Contract>, options: ValidatorOptions) -> Result<Self, ConfigError> {
        Ok(Self::from_validator(Arc::new(RequestValidator::new(contract, options)?)))
    }

    pub fn from_validator(validator: Arc<RequestValidator>) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &Arc<RequestValidator> {
        &self.validator
    }
}

impl Middleware for RequestValidatorMiddleware {
    fn before(&self, req: &mut HandlerRequest) -> Option<HandlerResponse> {
        match self.validator.check(req) {
            Outcome::Allowed(matched) => {
                req.extensions.insert(ValidatedOperation {
                    operation_id: Arc::clone(&matched.route.operation_id),
                    path_pattern: Arc::clone(&matched.route.path_pattern),
                    path_params: matched.path_params,
                });
                if let Some(data) = self.validator.user_data() {
                    req.extensions.insert(RequestUserData(Arc::clone(data)));
                }
                None
            }
            Outcome::Denied(denial) => Some(self.validator.deny_response(req, &denial)),
        }
    }
}
