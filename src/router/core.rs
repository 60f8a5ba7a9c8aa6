//! Router core module - request resolution.
//!
//! Resolution is two-staged: a declared server must accept the request host
//! and own the path prefix, then the remainder must match a path template
//! that declares the request method. Among those, the most specific template
//! wins. A template that matches the path but not the method never resolves.

use super::server::ServerMatcher;
use crate::spec::{template_placeholders, Contract, RouteMeta};
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of path/query parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/{id}/posts/{postId}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage.
///
/// Param names use `Arc<str>` since they come from the compiled templates;
/// values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of successfully resolving a request to a declared operation.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched operation (Arc to avoid expensive clones)
    pub route: Arc<RouteMeta>,
    /// Percent-decoded path parameters (e.g., `{id}` → `("id", "123")`)
    pub path_params: ParamVec,
    /// Base path of the server that accepted the request
    pub base_path: String,
}

impl RouteMatch {
    /// Get a path parameter by name
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convert path_params to HashMap
    /// Note: This allocates - use get_path_param() where possible
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Translate a `{placeholder}` template into an unanchored regex body.
///
/// Literal text is escaped; each placeholder matches one or more characters
/// other than `/`. Returns the body and the ordered placeholder names.
pub(crate) fn template_pattern(template: &str) -> (String, Vec<String>) {
    let names = template_placeholders(template);
    let mut pattern = String::with_capacity(template.len() + 8 * names.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        pattern.push_str(&regex::escape(&rest[..open]));
        pattern.push_str("([^/]+)");
        rest = &rest[open + close + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    (pattern, names)
}

/// Sort key for path templates: fewest placeholders first, then the longest
/// literal text. Lower keys are more specific.
pub(crate) fn template_specificity(template: &str) -> (usize, std::cmp::Reverse<usize>) {
    let names = template_placeholders(template);
    let placeholder_len: usize = names.iter().map(|n| n.len() + 2).sum();
    let literal_len = template.len().saturating_sub(placeholder_len);
    (names.len(), std::cmp::Reverse(literal_len))
}

#[derive(Debug, Clone)]
struct CompiledTemplate {
    pattern: Arc<str>,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    operations: Vec<Arc<RouteMeta>>,
}

/// Resolves `(method, host, path)` to a declared operation.
#[derive(Debug, Clone)]
pub struct Router {
    servers: Vec<ServerMatcher>,
    /// Ordered most specific first: fewest placeholders, then longest literal text.
    templates: Vec<CompiledTemplate>,
}

impl Router {
    /// Compile a router for every server and operation in `contract`.
    ///
    /// A contract without servers behaves as if it declared a single
    /// relative `/` server.
    pub fn new(contract: &Contract) -> Result<Self, regex::Error> {
        let mut servers = contract
            .servers
            .iter()
            .map(ServerMatcher::compile)
            .collect::<Result<Vec<_>, _>>()?;
        if servers.is_empty() {
            servers.push(ServerMatcher::implicit());
        }

        let mut templates: Vec<CompiledTemplate> = Vec::new();
        for route in &contract.routes {
            let route = Arc::new(route.clone());
            if let Some(existing) = templates
                .iter_mut()
                .find(|t| t.pattern == route.path_pattern)
            {
                existing.operations.push(route);
                continue;
            }
            let (regex, names) = Self::path_to_regex(&route.path_pattern)?;
            templates.push(CompiledTemplate {
                pattern: Arc::clone(&route.path_pattern),
                regex,
                param_names: names.into_iter().map(Arc::from).collect(),
                operations: vec![route],
            });
        }
        templates.sort_by_key(|t| template_specificity(&t.pattern));

        // RT5: Routing table loaded
        let routes_summary: Vec<String> = templates
            .iter()
            .take(10)
            .flat_map(|t| t.operations.iter().map(|op| op.key()))
            .collect();
        info!(
            routes_count = contract.routes.len(),
            templates_count = templates.len(),
            servers = ?servers.iter().map(|s| s.url.as_str()).collect::<Vec<_>>(),
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );

        Ok(Self { servers, templates })
    }

    /// Resolve a request.
    ///
    /// `host` is the request's Host header (port included, if any); `path` is
    /// the raw, still percent-encoded request path without query string.
    ///
    /// Returns `None` when no server accepts the host and path prefix, or when
    /// no template that matches the remaining path declares `method`.
    #[must_use]
    pub fn route(&self, method: &Method, host: Option<&str>, path: &str) -> Option<RouteMatch> {
        // RT1: Route match attempt
        debug!(
            method = %method,
            host = ?host,
            path = %path,
            "Route match attempt"
        );

        for server in self.servers.iter().filter(|s| s.accepts_host(host)) {
            let Some((base_path, rest)) = server.split_base(path) else {
                continue;
            };
            // RT2: most specific template that matches the path and declares the method
            let mut path_matched = false;
            let Some((template, route, caps)) = self.templates.iter().find_map(|t| {
                let caps = t.regex.captures(rest)?;
                path_matched = true;
                let route = t.operations.iter().find(|op| op.method == *method)?;
                Some((t, route, caps))
            }) else {
                if path_matched {
                    warn!(
                        method = %method,
                        path = %path,
                        server = %server.url,
                        "Path matched but no matching template declares the method"
                    );
                }
                continue;
            };

            let path_params: ParamVec = template
                .param_names
                .iter()
                .zip(caps.iter().skip(1))
                .filter_map(|(name, m)| {
                    let raw = m?.as_str();
                    let value = urlencoding::decode(raw)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    Some((Arc::clone(name), value))
                })
                .collect();

            // RT3: Route matched
            info!(
                method = %method,
                path = %path,
                operation_id = %route.operation_id,
                route_pattern = %route.path_pattern,
                server = %server.url,
                path_params = ?path_params,
                "Route matched"
            );

            return Some(RouteMatch {
                route: Arc::clone(route),
                path_params,
                base_path: base_path.to_string(),
            });
        }

        // RT4: No route found
        warn!(
            method = %method,
            host = ?host,
            path = %path,
            "No route matched"
        );
        None
    }

    /// Every compiled operation, most specific template first.
    pub fn routes(&self) -> impl Iterator<Item = &RouteMeta> {
        self.templates
            .iter()
            .flat_map(|t| t.operations.iter().map(|op| op.as_ref()))
    }

    /// Convert an OpenAPI path template to an anchored regex and extract
    /// parameter names
    ///
    /// `/users/{id}` becomes `^/users/([^/]+)$` with names `["id"]`.
    pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<String>), regex::Error> {
        let (body, names) = template_pattern(path);
        let regex = Regex::new(&format!("^{body}$"))?;
        Ok((regex, names))
    }
}
