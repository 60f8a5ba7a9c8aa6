use super::options::ValidatorOptions;
use super::outcome::{Denial, Outcome, Stage};
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::error::{ConfigError, GateError};
use crate::router::Router;
use crate::security::{authenticate, AuthContext, UserData};
use crate::spec::Contract;
use crate::validator::{validate_request, SchemaCache};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves, validates and authenticates requests against one contract.
///
/// Everything derived from the contract (route regexes, compiled schemas) is
/// built once in [`RequestValidator::new`]; [`RequestValidator::check`] only
/// reads it, so one validator can serve any number of threads.
pub struct RequestValidator {
    contract: Arc<Contract>,
    router: Router,
    cache: SchemaCache,
    options: ValidatorOptions,
}

impl RequestValidator {
    /// Compile `contract` and check the configuration.
    ///
    /// Fails when a route or schema does not compile, or when the contract
    /// has secured operations but `options` carries no authentication function.
    pub fn new(contract: Arc<Contract>, options: ValidatorOptions) -> Result<Self, ConfigError> {
        if !options.has_authentication_func() {
            let operations: Vec<String> = contract
                .secured_routes()
                .map(|r| r.operation_id.to_string())
                .collect();
            if !operations.is_empty() {
                warn!(
                    secured_operations = ?operations,
                    "Secured operations declared without an authentication function"
                );
                return Err(ConfigError::MissingAuthenticator { operations });
            }
        }

        let router = Router::new(&contract)?;
        let cache = SchemaCache::precompile(&contract)?;

        info!(
            title = %contract.title,
            operations = contract.routes.len(),
            compiled_schemas = cache.len(),
            multi_error = options.multi_error,
            exclude_request_body = options.exclude_request_body,
            "Request validator ready"
        );

        Ok(Self {
            contract,
            router,
            cache,
            options,
        })
    }

    /// Run a request through Resolving, Validating and Authenticating.
    pub fn check(&self, req: &HandlerRequest) -> Outcome {
        let outcome = self.evaluate(req);
        match &outcome {
            Outcome::Allowed(matched) => debug!(
                request_id = %req.request_id,
                operation_id = %matched.route.operation_id,
                "Request allowed"
            ),
            Outcome::Denied(denial) => warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                stage = %denial.stage,
                kind = denial.error.kind(),
                status = denial.status.as_u16(),
                error = %denial.error,
                "Request denied"
            ),
        }
        outcome
    }

    fn evaluate(&self, req: &HandlerRequest) -> Outcome {
        let Some(matched) = self.router.route(&req.method, req.host.as_deref(), &req.path) else {
            return Outcome::Denied(Denial::new(
                Stage::Resolving,
                GateError::NoMatchingRoute {
                    method: req.method.to_string(),
                    host: req.host.clone(),
                    path: req.path.clone(),
                },
            ));
        };

        if let Err(err) = validate_request(req, &matched, &self.cache, self.options.policy()) {
            return Outcome::Denied(Denial::new(Stage::Validating, err));
        }

        if matched.route.requires_security() {
            let ctx = AuthContext::new(req, self.options.user_data.as_ref());
            if let Err(err) = authenticate(
                &self.contract,
                &matched.route,
                &ctx,
                self.options.authentication_func.as_ref(),
            ) {
                return Outcome::Denied(Denial::new(Stage::Authenticating, err));
            }
        }

        Outcome::Allowed(matched)
    }

    /// Response for a denied request: the configured error handler's, or
    /// `{"error": "<message>"}` with the denial status.
    pub fn deny_response(&self, req: &HandlerRequest, denial: &Denial) -> HandlerResponse {
        match &self.options.error_handler {
            Some(handler) => handler(req, denial),
            None => HandlerResponse::error(denial.status.as_u16(), &denial.error.to_string()),
        }
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.options.user_data.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{AuthenticationFunc, AuthenticationInput};
    use crate::spec::{load_contract_from_str, SpecFormat};
    use http::{Method, StatusCode};
    use serde_json::json;

    const CONTRACT: &str = r#"
openapi: 3.0.0
info:
  title: gate
  version: 1.0.0
servers:
  - url: http://api.test
paths:
  /items/{id}:
    get:
      operationId: getItem
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: integer
            maximum: 100
      responses:
        '200':
          description: ok
  /secure:
    get:
      operationId: getSecure
      security:
        - key: [admin]
      responses:
        '200':
          description: ok
components:
  securitySchemes:
    key:
      type: apiKey
      in: header
      name: X-Key
"#;

    fn contract() -> Arc<Contract> {
        Arc::new(load_contract_from_str(CONTRACT, SpecFormat::Yaml).unwrap())
    }

    fn admin_only() -> AuthenticationFunc {
        Arc::new(|ctx: &AuthContext<'_>, input: &AuthenticationInput<'_>| {
            match ctx.request().get_header("x-key") {
                Some("admin") if input.scopes.iter().any(|s| s == "admin") => Ok(()),
                _ => anyhow::bail!("not an admin"),
            }
        })
    }

    fn validator() -> RequestValidator {
        RequestValidator::new(contract(), ValidatorOptions::new().authentication_func(admin_only())).unwrap()
    }

    fn get(url: &str) -> HandlerRequest {
        HandlerRequest::from_url(Method::GET, url).unwrap()
    }

    #[test]
    fn test_missing_authenticator_rejected_at_construction() {
        match RequestValidator::new(contract(), ValidatorOptions::new()) {
            Err(ConfigError::MissingAuthenticator { operations }) => {
                assert_eq!(operations, vec!["getSecure".to_string()]);
            }
            Err(other) => panic!("unexpected {other:?}"),
            Ok(_) => panic!("construction should fail"),
        }
    }

    #[test]
    fn test_stages() {
        let validator = validator();

        let outcome = validator.check(&get("http://other.test/items/1"));
        assert_eq!(outcome.denial().map(|d| d.stage), Some(Stage::Resolving));

        let outcome = validator.check(&get("http://api.test/items/101"));
        assert_eq!(outcome.denial().map(|d| d.stage), Some(Stage::Validating));

        let outcome = validator.check(&get("http://api.test/secure"));
        assert_eq!(outcome.denial().map(|d| d.stage), Some(Stage::Authenticating));
        assert_eq!(outcome.status(), Some(StatusCode::BAD_REQUEST));

        let outcome = validator.check(&get("http://api.test/items/7"));
        assert!(outcome.is_allowed());
        assert_eq!(outcome.route_match().and_then(|m| m.get_path_param("id")), Some("7"));

        let outcome = validator.check(&get("http://api.test/secure").with_header("X-Key", "admin"));
        assert!(outcome.is_allowed());
    }

    #[test]
    fn test_default_and_custom_deny_response() {
        let validator = validator();
        let req = get("http://api.test/items/abc");
        let Outcome::Denied(denial) = validator.check(&req) else {
            panic!("expected denial");
        };
        let resp = validator.deny_response(&req, &denial);
        assert_eq!(resp.status, 400);
        assert_eq!(
            resp.body,
            json!({"error": "parameter \"id\" in path has an error: value abc is not a valid integer"})
        );

        let custom = RequestValidator::new(
            contract(),
            ValidatorOptions::new()
                .authentication_func(admin_only())
                .error_handler(|_req, denial| {
                    HandlerResponse::json(denial.status.as_u16(), json!({"stage": denial.stage.as_str()}))
                }),
        )
        .unwrap();
        let resp = custom.deny_response(&req, &denial);
        assert_eq!(resp.body, json!({"stage": "validating"}));
    }
}
