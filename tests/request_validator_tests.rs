use brrtgate::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
use brrtgate::gate::{Stage, ValidatorOptions};
use brrtgate::middleware::{get_user_data, get_validated_operation, RequestValidatorMiddleware, TracingMiddleware};
use brrtgate::security::{AuthContext, AuthenticationFunc, AuthenticationInput};
use brrtgate::spec::{load_contract_from_str, Contract, SpecFormat};
use brrtgate::{ConfigError, GateError};
use http::Method;
use serde_json::json;
use std::sync::{Arc, Mutex};

mod common;
use common::counters::CallCounter;
use common::fixtures::TEST_SCHEMA;

fn contract() -> Arc<Contract> {
    Arc::new(load_contract_from_str(TEST_SCHEMA, SpecFormat::Yaml).unwrap())
}

/// Allows "someScope", rejects "unauthorized" and everything else with
/// different messages. Records what the context carried on every call.
fn scope_authenticator(seen_user_data: Arc<Mutex<Vec<Option<String>>>>) -> AuthenticationFunc {
    Arc::new(move |ctx: &AuthContext<'_>, input: &AuthenticationInput<'_>| {
        assert!(!ctx.request().path.is_empty());
        seen_user_data
            .lock()
            .unwrap()
            .push(ctx.user_data_as::<String>().cloned());

        for scope in input.scopes {
            if scope == "someScope" {
                return Ok(());
            }
            if scope == "unauthorized" {
                anyhow::bail!("unauthorized");
            }
        }
        anyhow::bail!("forbidden")
    })
}

fn counting(status: u16, counter: &CallCounter) -> impl Fn(&HandlerRequest) -> HandlerResponse + Send + Sync + 'static {
    let counter = counter.clone();
    move |_req: &HandlerRequest| {
        counter.hit();
        HandlerResponse::empty(status)
    }
}

fn get(url: &str) -> HandlerRequest {
    HandlerRequest::from_url(Method::GET, url).unwrap()
}

fn post(url: &str, body: serde_json::Value) -> HandlerRequest {
    HandlerRequest::from_url(Method::POST, url)
        .unwrap()
        .with_json_body(&body)
        .unwrap()
}

#[test]
fn test_request_validator_end_to_end() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let options = ValidatorOptions::new()
        .authentication_func(scope_authenticator(Arc::clone(&seen)))
        .user_data("hi!".to_string());
    let gate = RequestValidatorMiddleware::new(contract(), options).unwrap();

    let mut dispatcher = Dispatcher::new();
    dispatcher.add_middleware(Arc::new(TracingMiddleware));
    dispatcher.add_middleware(Arc::new(gate));

    let called = CallCounter::new();
    dispatcher.add_handler(Method::GET, "/resource", counting(200, &called)).unwrap();

    // Wrong server
    let rec = dispatcher.dispatch(get("http://not.deepmap.ai/resource"));
    assert_eq!(rec.status, 400);
    assert_eq!(called.take(), 0, "Handler should not have been called");

    // Good request
    let rec = dispatcher.dispatch(get("http://deepmap.ai/resource"));
    assert_eq!(rec.status, 200);
    assert_eq!(called.take(), 1, "Handler should have been called");

    // Out-of-contract parameter
    let rec = dispatcher.dispatch(get("http://deepmap.ai/resource?id=500"));
    assert_eq!(rec.status, 400);
    assert_eq!(called.take(), 0);

    // Bad parameter type
    let rec = dispatcher.dispatch(get("http://deepmap.ai/resource?id=foo"));
    assert_eq!(rec.status, 400);
    assert_eq!(called.take(), 0);

    dispatcher.add_handler(Method::POST, "/resource", counting(204, &called)).unwrap();

    // Good body: the handler's own status passes through
    let rec = dispatcher.dispatch(post("http://deepmap.ai/resource", json!({"name": "Marcin"})));
    assert_eq!(rec.status, 204);
    assert_eq!(called.take(), 1);

    // Malformed body
    let rec = dispatcher.dispatch(post("http://deepmap.ai/resource", json!({"name": 7})));
    assert_eq!(rec.status, 400);
    assert_eq!(called.take(), 0);

    dispatcher
        .add_handler(Method::GET, "/protected_resource", counting(204, &called))
        .unwrap();
    let rec = dispatcher.dispatch(get("http://deepmap.ai/protected_resource"));
    assert_eq!(rec.status, 204);
    assert_eq!(called.take(), 1);

    dispatcher
        .add_handler(Method::GET, "/protected_resource2", counting(204, &called))
        .unwrap();
    let rec = dispatcher.dispatch(get("http://deepmap.ai/protected_resource2"));
    assert_eq!(rec.status, 400);
    assert_eq!(called.take(), 0);

    dispatcher
        .add_handler(Method::GET, "/protected_resource_401", counting(204, &called))
        .unwrap();
    let rec = dispatcher.dispatch(get("http://deepmap.ai/protected_resource_401"));
    assert_eq!(rec.status, 400);
    assert_eq!(called.take(), 0);

    // Every authentication call carried the configured user data
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|d| d.as_deref() == Some("hi!")), "{seen:?}");
}

#[test]
fn test_allowed_request_is_tagged_for_the_handler() {
    let gate = RequestValidatorMiddleware::new(
        contract(),
        ValidatorOptions::new()
            .authentication_func(scope_authenticator(Arc::default()))
            .user_data("hi!".to_string()),
    )
    .unwrap();

    let mut dispatcher = Dispatcher::new();
    dispatcher.add_middleware(Arc::new(gate));
    dispatcher
        .add_handler(Method::GET, "/resource", |req| {
            let op = get_validated_operation(req).map(|op| op.operation_id.to_string());
            let data = get_user_data(req)
                .and_then(|d| d.downcast_ref::<String>())
                .cloned();
            HandlerResponse::json(200, json!({ "operation": op, "user_data": data }))
        })
        .unwrap();

    let rec = dispatcher.dispatch(get("http://deepmap.ai/resource?id=42"));
    assert_eq!(rec.status, 200);
    assert_eq!(rec.body, json!({"operation": "getResource", "user_data": "hi!"}));
}

#[test]
fn test_denial_body_and_custom_error_handler() {
    let default_gate = RequestValidatorMiddleware::new(
        contract(),
        ValidatorOptions::new().authentication_func(scope_authenticator(Arc::default())),
    )
    .unwrap();
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_middleware(Arc::new(default_gate));
    let rec = dispatcher.dispatch(get("http://deepmap.ai/resource?id=5"));
    assert_eq!(rec.status, 400);
    let message = rec.body["error"].as_str().unwrap();
    assert!(message.starts_with("parameter \"id\" in query has an error"), "{message}");

    let custom_gate = RequestValidatorMiddleware::new(
        contract(),
        ValidatorOptions::new()
            .authentication_func(scope_authenticator(Arc::default()))
            .error_handler(|_req, denial| {
                HandlerResponse::json(
                    denial.status.as_u16(),
                    json!({"stage": denial.stage.as_str(), "kind": denial.error.kind()}),
                )
            }),
    )
    .unwrap();
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_middleware(Arc::new(custom_gate));
    let rec = dispatcher.dispatch(get("http://deepmap.ai/protected_resource2"));
    assert_eq!(rec.status, 400);
    assert_eq!(rec.body, json!({"stage": "authenticating", "kind": "authentication_denied"}));
}

#[test]
fn test_secured_contract_requires_authentication_func() {
    match RequestValidatorMiddleware::new(contract(), ValidatorOptions::new()) {
        Err(ConfigError::MissingAuthenticator { operations }) => {
            assert_eq!(operations.len(), 3);
            assert!(operations.iter().all(|op| op == "getProtectedResource"));
        }
        Err(other) => panic!("unexpected {other}"),
        Ok(_) => panic!("construction should fail without an authentication function"),
    }
}

#[test]
fn test_multi_error_and_exclude_body_options() {
    let contract = Arc::new(
        load_contract_from_str(
            r#"
openapi: 3.0.0
info: {title: options, version: "1"}
paths:
  /items:
    post:
      operationId: createItem
      parameters:
        - {name: limit, in: query, required: true, schema: {type: integer}}
        - {name: X-Trace, in: header, required: true, schema: {type: string}}
      requestBody:
        required: true
        content:
          application/json:
            schema: {type: object, required: [name]}
      responses:
        '201': {description: created}
"#,
            SpecFormat::Yaml,
        )
        .unwrap(),
    );

    let req = HandlerRequest::new(Method::POST, "/items?limit=many");

    let validator = brrtgate::RequestValidator::new(Arc::clone(&contract), ValidatorOptions::new()).unwrap();
    let denial = validator.check(&req).denial().cloned().unwrap();
    assert_eq!(denial.stage, Stage::Validating);
    assert!(matches!(denial.error, GateError::ParameterViolation { ref param, .. } if param == "limit"));

    let validator =
        brrtgate::RequestValidator::new(Arc::clone(&contract), ValidatorOptions::new().multi_error(true)).unwrap();
    match validator.check(&req).denial().map(|d| d.error.clone()) {
        Some(GateError::Multiple(errors)) => assert_eq!(errors.len(), 3),
        other => panic!("unexpected {other:?}"),
    }

    let validator = brrtgate::RequestValidator::new(
        contract,
        ValidatorOptions::new().multi_error(true).exclude_request_body(true),
    )
    .unwrap();
    let ok = HandlerRequest::new(Method::POST, "/items?limit=3").with_header("X-Trace", "t");
    assert!(validator.check(&ok).is_allowed());
}
