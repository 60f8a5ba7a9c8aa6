//! Dispatcher core module - request/response types and the middleware pipeline.

use super::request::{media_type_essence, parse_cookies, parse_query_params, split_target};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::middleware::{get_validated_operation, Middleware};
use crate::router::{template_specificity, ParamVec, Router};
use anyhow::Context;
use http::{Extensions, Method};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Maximum inline headers/cookies before heap allocation
/// Most requests have ≤16 headers
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage
///
/// Header names use `Arc<str>` and are stored lowercased.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// An HTTP request as seen by middleware and handlers.
///
/// `path` is the raw (percent-encoded) request path without query string.
/// `extensions` is the per-request state bag: middleware stores what it
/// learned about the request there (e.g. the validated operation and user data).
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Host header value, port included when non-default
    pub host: Option<String>,
    /// Request path
    pub path: String,
    /// Query string parameters in arrival order; keys may repeat
    pub query_params: ParamVec,
    /// HTTP headers with lowercased names (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    /// Cookies parsed from the Cookie header
    pub cookies: HeaderVec,
    /// Raw request body
    pub body: Option<Vec<u8>>,
    /// Per-request state shared between middleware and handlers
    pub extensions: Extensions,
}

impl HandlerRequest {
    /// Build a request from a method and a request target such as
    /// `/resource?id=10`.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            request_id: RequestId::new(),
            method,
            host: None,
            path: path.to_string(),
            query_params: parse_query_params(query),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: None,
            extensions: Extensions::new(),
        }
    }

    /// Build a request from an absolute URL; the URL's authority becomes the host.
    pub fn from_url(method: Method, url: &str) -> anyhow::Result<Self> {
        let parsed = url::Url::parse(url).with_context(|| format!("invalid request URL '{url}'"))?;
        let target = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };
        let mut req = Self::new(method, &target);
        req.host = parsed.host_str().map(|host| match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        });
        Ok(req)
    }

    /// Add a header. `Host`, `Cookie` and `X-Request-Id` also update the
    /// corresponding request fields.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.trim().to_ascii_lowercase();
        let value = value.into();
        match name.as_str() {
            "host" => self.host = Some(value.clone()),
            "cookie" => self.cookies.extend(parse_cookies(&value)),
            REQUEST_ID_HEADER => self.request_id = RequestId::from_header_or_new(Some(&value)),
            _ => {}
        }
        self.headers.push((Arc::from(name.as_str()), value));
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Attach a raw body and its `Content-Type` header.
    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.headers.retain(|(k, _)| k.as_ref() != "content-type");
        self.headers
            .push((Arc::from("content-type"), content_type.to_string()));
        self.body = Some(body.into());
        self
    }

    /// Attach a JSON body with `Content-Type: application/json`.
    pub fn with_json_body<T: Serialize>(self, body: &T) -> anyhow::Result<Self> {
        let bytes = serde_json::to_vec(body).context("failed to serialize request body")?;
        Ok(self.with_body("application/json", bytes))
    }

    /// Get the last query parameter with this name
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated query parameter, in arrival order
    #[must_use]
    pub fn get_query_values(&self, name: &str) -> Vec<&str> {
        self.query_params
            .iter()
            .filter(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated header
    #[must_use]
    pub fn get_header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Get a cookie by name
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Lowercased media type of the `Content-Type` header, if any
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.get_header("content-type").map(media_type_essence)
    }
}

/// Response produced by a handler or by middleware short-circuiting
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// HTTP response headers
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body as JSON; `Null` means no body
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a response without a body (e.g. `204 No Content`)
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    /// Create an error response: `{"error": message}`
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// A request handler. Runs synchronously on the dispatching thread.
pub type Handler = Arc<dyn Fn(&HandlerRequest) -> HandlerResponse + Send + Sync>;

#[derive(Clone)]
struct HandlerRoute {
    method: Method,
    template: String,
    regex: Regex,
    handler: Handler,
}

/// Runs requests through the middleware pipeline and into registered handlers
///
/// Handlers are registered by method and full path template (base path
/// included). Middleware runs in registration order: `before` hooks until one
/// answers early, then the handler, then every `after` hook.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Vec<HandlerRoute>,
    /// Ordered list of middleware to apply to requests/responses
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `method` and a path template like `/pets/{id}`.
    ///
    /// Registering the same method and template again replaces the handler.
    pub fn add_handler<F>(&mut self, method: Method, template: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(&HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
    {
        let (regex, _) = Router::path_to_regex(template)?;
        if let Some(pos) = self
            .handlers
            .iter()
            .position(|h| h.method == method && h.template == template)
        {
            self.handlers.remove(pos);
            warn!(method = %method, template = %template, "Replaced existing handler");
        }
        info!(
            method = %method,
            template = %template,
            total_handlers = self.handlers.len() + 1,
            "Handler registered successfully"
        );
        self.handlers.push(HandlerRoute {
            method,
            template: template.to_string(),
            regex,
            handler: Arc::new(handler),
        });
        // Stable: equally specific templates keep registration order
        self.handlers.sort_by_key(|h| template_specificity(&h.template));
        Ok(())
    }

    /// Add middleware to the processing pipeline
    ///
    /// Middleware is executed in the order it's added.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Run a request through middleware and the matching handler.
    pub fn dispatch(&self, mut request: HandlerRequest) -> HandlerResponse {
        let request_id = request.request_id;

        // D1: Middleware before execution
        debug!(
            request_id = %request_id,
            middleware_count = self.middlewares.len(),
            "Middleware before execution"
        );

        let mut early_resp: Option<HandlerResponse> = None;
        for (idx, mw) in self.middlewares.iter().enumerate() {
            let before = std::panic::catch_unwind(AssertUnwindSafe(|| mw.before(&mut request)))
                .unwrap_or_else(|panic| {
                    error!(
                        request_id = %request_id,
                        middleware_idx = idx,
                        panic_message = %panic_message(panic.as_ref()),
                        "Middleware panicked"
                    );
                    Some(HandlerResponse::error(500, "Middleware panicked"))
                });
            if let Some(resp) = before {
                debug!(
                    request_id = %request_id,
                    middleware_idx = idx,
                    middleware_name = std::any::type_name_of_val(mw.as_ref()),
                    status = resp.status,
                    "Middleware returned early response"
                );
                early_resp = Some(resp);
                break;
            }
        }

        let start = Instant::now();
        let mut response = match early_resp {
            Some(resp) => resp,
            None => self.invoke(&request),
        };
        let latency = start.elapsed();

        // D4: Middleware after execution
        for mw in &self.middlewares {
            mw.after(&request, &mut response, latency);
        }
        response
    }

    /// Handler for a request. A request the gate resolved runs the handler
    /// registered for that exact template; any other request runs the most
    /// specific handler whose template matches its path.
    fn select_handler(&self, request: &HandlerRequest) -> Option<&HandlerRoute> {
        let mut same_method = self.handlers.iter().filter(|h| h.method == request.method);
        match get_validated_operation(request) {
            Some(op) => same_method.find(|h| h.template == *op.path_pattern),
            None => same_method.find(|h| h.regex.is_match(&request.path)),
        }
    }

    fn invoke(&self, request: &HandlerRequest) -> HandlerResponse {
        let Some(route) = self.select_handler(request) else {
            // D2: Handler not found
            warn!(
                request_id = %request.request_id,
                method = %request.method,
                path = %request.path,
                available_handlers = self.handlers.len(),
                "Handler not found"
            );
            return HandlerResponse::error(404, "Not Found");
        };

        // D3: Handler execution
        debug!(
            request_id = %request.request_id,
            template = %route.template,
            "Handler execution start"
        );
        match std::panic::catch_unwind(AssertUnwindSafe(|| (route.handler)(request))) {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %request.request_id,
                    template = %route.template,
                    panic_message = %message,
                    "Handler panicked"
                );
                HandlerResponse::error(500, "Handler panicked")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Middleware;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_from_url_sets_host_path_and_query() {
        let req = HandlerRequest::from_url(Method::GET, "http://deepmap.ai/resource?id=50").unwrap();
        assert_eq!(req.host.as_deref(), Some("deepmap.ai"));
        assert_eq!(req.path, "/resource");
        assert_eq!(req.get_query_param("id"), Some("50"));

        let req = HandlerRequest::from_url(Method::GET, "http://localhost:8080/").unwrap();
        assert_eq!(req.host.as_deref(), Some("localhost:8080"));
    }

    #[test]
    fn test_with_header_special_cases() {
        let id = RequestId::new();
        let req = HandlerRequest::new(Method::GET, "/")
            .with_header("Host", "example.com")
            .with_header("Cookie", "a=1; b=2")
            .with_header("X-Request-Id", id.to_string());
        assert_eq!(req.host.as_deref(), Some("example.com"));
        assert_eq!(req.get_cookie("b"), Some("2"));
        assert_eq!(req.request_id, id);
        assert_eq!(req.get_header("x-request-id"), Some(id.to_string().as_str()));
    }

    #[test]
    fn test_with_json_body() {
        let req = HandlerRequest::new(Method::POST, "/resource")
            .with_json_body(&serde_json::json!({"name": "Marcin"}))
            .unwrap();
        assert_eq!(req.content_type().as_deref(), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(br#"{"name":"Marcin"}"#.as_slice()));
    }

    #[test]
    fn test_dispatch_unknown_route_is_404() {
        let dispatcher = Dispatcher::new();
        let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/nothing"));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_dispatch_recovers_from_panics() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .add_handler(Method::GET, "/boom", |_req| panic!("handler exploded"))
            .unwrap();
        let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/boom"));
        assert_eq!(resp.status, 500);
    }

    struct Counting {
        before: AtomicUsize,
        after: AtomicUsize,
        short_circuit: bool,
    }

    impl Middleware for Counting {
        fn before(&self, _req: &mut HandlerRequest) -> Option<HandlerResponse> {
            self.before.fetch_add(1, Ordering::SeqCst);
            self.short_circuit.then(|| HandlerResponse::error(400, "stop"))
        }

        fn after(&self, _req: &HandlerRequest, _res: &mut HandlerResponse, _latency: Duration) {
            self.after.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_early_response_skips_handler_and_later_before_hooks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = Arc::clone(&calls);
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .add_handler(Method::GET, "/x", move |_req| {
                handler_calls.fetch_add(1, Ordering::SeqCst);
                HandlerResponse::empty(204)
            })
            .unwrap();

        let first = Arc::new(Counting {
            before: AtomicUsize::new(0),
            after: AtomicUsize::new(0),
            short_circuit: true,
        });
        let second = Arc::new(Counting {
            before: AtomicUsize::new(0),
            after: AtomicUsize::new(0),
            short_circuit: false,
        });
        dispatcher.add_middleware(first.clone());
        dispatcher.add_middleware(second.clone());

        let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/x"));
        assert_eq!(resp.status, 400);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(first.before.load(Ordering::SeqCst), 1);
        assert_eq!(second.before.load(Ordering::SeqCst), 0);
        assert_eq!(first.after.load(Ordering::SeqCst), 1);
        assert_eq!(second.after.load(Ordering::SeqCst), 1);
    }

    const PETS: &str = r#"
openapi: 3.0.0
info: {title: pets, version: "1"}
paths:
  /pets/{petId}:
    get:
      operationId: getPet
      parameters:
        - {name: petId, in: path, required: true, schema: {type: string}}
      responses:
        '200': {description: ok}
  /pets/mine:
    put:
      operationId: putMine
      responses:
        '200': {description: ok}
"#;

    fn gated(contract: &str) -> Dispatcher {
        use crate::gate::ValidatorOptions;
        use crate::middleware::RequestValidatorMiddleware;
        use crate::spec::{load_contract_from_str, SpecFormat};

        let contract = load_contract_from_str(contract, SpecFormat::Yaml).unwrap();
        let gate = RequestValidatorMiddleware::new(Arc::new(contract), ValidatorOptions::new()).unwrap();
        let mut dispatcher = Dispatcher::new();
        dispatcher.add_middleware(Arc::new(gate));
        dispatcher
    }

    fn named(name: &'static str) -> impl Fn(&HandlerRequest) -> HandlerResponse + Send + Sync + 'static {
        move |_req| HandlerResponse::json(200, serde_json::json!(name))
    }

    #[test]
    fn test_gated_request_runs_handler_of_resolved_template() {
        let mut dispatcher = gated(PETS);
        // Registered first and not part of the contract
        dispatcher
            .add_handler(Method::PUT, "/pets/{petId}", named("wrong-handler"))
            .unwrap();
        dispatcher.add_handler(Method::PUT, "/pets/mine", named("putMine")).unwrap();

        let resp = dispatcher.dispatch(HandlerRequest::new(Method::PUT, "/pets/mine"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, serde_json::json!("putMine"));

        // The gate resolved getPet; a handler for another template never runs
        dispatcher.add_handler(Method::GET, "/pets/mine", named("undeclared")).unwrap();
        let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/pets/mine"));
        assert_eq!(resp.status, 404);

        dispatcher.add_handler(Method::GET, "/pets/{petId}", named("getPet")).unwrap();
        let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/pets/mine"));
        assert_eq!(resp.body, serde_json::json!("getPet"));
    }

    #[test]
    fn test_ungated_dispatch_prefers_most_specific_template() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .add_handler(Method::PUT, "/pets/{petId}", named("byId"))
            .unwrap();
        dispatcher.add_handler(Method::PUT, "/pets/mine", named("mine")).unwrap();

        let resp = dispatcher.dispatch(HandlerRequest::new(Method::PUT, "/pets/mine"));
        assert_eq!(resp.body, serde_json::json!("mine"));
        let resp = dispatcher.dispatch(HandlerRequest::new(Method::PUT, "/pets/7"));
        assert_eq!(resp.body, serde_json::json!("byId"));
    }

    struct Exploding;

    impl Middleware for Exploding {
        fn before(&self, _req: &mut HandlerRequest) -> Option<HandlerResponse> {
            panic!("middleware exploded")
        }
    }

    #[test]
    fn test_panicking_before_hook_becomes_500() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.add_handler(Method::GET, "/x", named("x")).unwrap();
        dispatcher.add_middleware(Arc::new(Exploding));
        let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/x"));
        assert_eq!(resp.status, 500);
    }
}
