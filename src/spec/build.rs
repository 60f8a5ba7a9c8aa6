use super::issues::{ContractIssue, ContractIssues};
use super::types::{
    Contract, MediaTypeMeta, ParameterLocation, ParameterMeta, ParameterStyle, RequestBodyMeta,
    RouteMeta, ServerMeta,
};
use super::SecurityScheme;
use oas3::spec::{ObjectOrReference, ObjectSchema, Parameter};
use oas3::OpenApiV3Spec;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Self-referencing schemas are expanded at most this deep.
const MAX_REF_DEPTH: usize = 32;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{([^{}/]+)\}").expect("placeholder pattern is valid")
});

/// Names of the `{placeholder}` segments in a path or server template, in order.
pub fn template_placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Resolve a JSON Schema `$ref` to the actual schema definition
///
/// Only local component references (`#/components/schemas/Name`) are
/// supported; anything else yields `None`.
pub fn resolve_schema_ref<'a>(spec: &'a OpenApiV3Spec, ref_path: &str) -> Option<&'a ObjectSchema> {
    let name = ref_path.strip_prefix("#/components/schemas/")?;
    spec.components
        .as_ref()?
        .schemas
        .get(name)
        .and_then(|schema_ref| match schema_ref {
            ObjectOrReference::Object(schema) => Some(schema),
            _ => None,
        })
}

/// Recursively inline every `$ref` in a schema value so that the result can
/// be compiled without access to the rest of the document.
pub fn expand_schema_refs(spec: &OpenApiV3Spec, value: &mut Value) {
    expand_at_depth(spec, value, 0);
}

fn expand_at_depth(spec: &OpenApiV3Spec, value: &mut Value, depth: usize) {
    if depth > MAX_REF_DEPTH {
        return;
    }
    match value {
        Value::Object(obj) => {
            if let Some(ref_path) = obj.get("$ref").and_then(|v| v.as_str()) {
                if let Some(schema) = resolve_schema_ref(spec, ref_path) {
                    if let Ok(mut new_val) = serde_json::to_value(schema) {
                        expand_at_depth(spec, &mut new_val, depth + 1);
                        *value = new_val;
                        return;
                    }
                }
            }
            for v in obj.values_mut() {
                expand_at_depth(spec, v, depth);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                expand_at_depth(spec, v, depth);
            }
        }
        _ => {}
    }
}

fn schema_value(spec: &OpenApiV3Spec, schema: &ObjectOrReference<ObjectSchema>) -> Option<Value> {
    let mut value = match schema {
        ObjectOrReference::Object(obj) => serde_json::to_value(obj).ok(),
        ObjectOrReference::Ref { ref_path, .. } => {
            resolve_schema_ref(spec, ref_path).and_then(|s| serde_json::to_value(s).ok())
        }
    }?;
    expand_schema_refs(spec, &mut value);
    Some(value)
}

/// Extract the security schemes declared under `components.securitySchemes`.
pub fn extract_security_schemes(spec: &OpenApiV3Spec) -> HashMap<String, SecurityScheme> {
    spec.components
        .as_ref()
        .map(|c| {
            c.security_schemes
                .iter()
                .filter_map(|(name, scheme)| match scheme {
                    ObjectOrReference::Object(obj) => Some((name.clone(), obj.clone())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn resolve_parameter_ref<'a>(spec: &'a OpenApiV3Spec, ref_path: &str) -> Option<&'a Parameter> {
    let name = ref_path.strip_prefix("#/components/parameters/")?;
    spec.components
        .as_ref()?
        .parameters
        .get(name)
        .and_then(|param_ref| match param_ref {
            ObjectOrReference::Object(param) => Some(param),
            _ => None,
        })
}

/// Extract parameter metadata from a parameter list, resolving component
/// references. Path parameters are always required.
pub fn extract_parameters(
    spec: &OpenApiV3Spec,
    params: &[ObjectOrReference<Parameter>],
) -> Vec<ParameterMeta> {
    let mut out = Vec::new();
    for p in params {
        let param = match p {
            ObjectOrReference::Object(obj) => Some(obj),
            ObjectOrReference::Ref { ref_path, .. } => resolve_parameter_ref(spec, ref_path),
        };

        if let Some(param) = param {
            let location = ParameterLocation::from(param.location);
            out.push(ParameterMeta {
                name: param.name.clone(),
                location,
                required: location == ParameterLocation::Path || param.required.unwrap_or(false),
                schema: param.schema.as_ref().and_then(|s| schema_value(spec, s)),
                style: param.style.map(ParameterStyle::from),
                explode: param.explode,
            });
        }
    }
    out
}

/// Merge path-level and operation-level parameters. An operation-level
/// parameter replaces a path-level one with the same name and location.
pub fn merge_parameters(path_level: Vec<ParameterMeta>, operation_level: Vec<ParameterMeta>) -> Vec<ParameterMeta> {
    let mut merged: Vec<ParameterMeta> = path_level
        .into_iter()
        .filter(|p| {
            !operation_level
                .iter()
                .any(|o| o.name == p.name && o.location == p.location)
        })
        .collect();
    merged.extend(operation_level);
    merged
}

/// Extract the request body declaration of an operation, one entry per
/// declared media type.
pub fn extract_request_body(
    spec: &OpenApiV3Spec,
    operation: &oas3::spec::Operation,
) -> Option<RequestBodyMeta> {
    match operation.request_body.as_ref()? {
        ObjectOrReference::Object(req_body) => {
            let content = req_body
                .content
                .iter()
                .map(|(media_type, media)| MediaTypeMeta {
                    media_type: media_type.trim().to_ascii_lowercase(),
                    schema: media.schema.as_ref().and_then(|s| schema_value(spec, s)),
                })
                .collect();
            Some(RequestBodyMeta {
                required: req_body.required.unwrap_or(false),
                content,
            })
        }
        _ => None,
    }
}

/// Split a server URL into host pattern and base path.
///
/// Absolute URLs (`scheme://host[:port]/base`) bind a host; relative URLs
/// (`/base`) accept any host. `{var}` placeholders are kept in the pattern.
pub fn parse_server_url(url: &str) -> Result<ServerMeta, String> {
    let trimmed = url.trim();
    let (host, path) = match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            if scheme.is_empty()
                || !scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '{' | '}'))
            {
                return Err(format!("invalid scheme in server URL '{url}'"));
            }
            let (authority, path) = match rest.find('/') {
                Some(idx) => (&rest[..idx], &rest[idx..]),
                None => (rest, ""),
            };
            if authority.is_empty() {
                return Err(format!("server URL '{url}' has no host"));
            }
            if !trimmed.contains('{') {
                url::Url::parse(trimmed).map_err(|e| format!("invalid server URL '{url}': {e}"))?;
            }
            (Some(authority.to_ascii_lowercase()), path)
        }
        None if trimmed.starts_with('/') || trimmed.is_empty() => (None, trimmed),
        None => return Err(format!("server URL '{url}' is neither absolute nor a path")),
    };

    let base_path = path.trim_end_matches('/').to_string();
    Ok(ServerMeta {
        url: url.to_string(),
        host,
        base_path,
    })
}

fn extract_servers(spec: &OpenApiV3Spec, issues: &mut Vec<ContractIssue>) -> Vec<ServerMeta> {
    let mut servers = Vec::new();
    for (idx, server) in spec.servers.iter().enumerate() {
        match parse_server_url(&server.url) {
            Ok(meta) => servers.push(meta),
            Err(message) => issues.push(ContractIssue::new(
                format!("servers[{idx}]"),
                "InvalidServerUrl",
                message,
            )),
        }
    }
    servers
}

fn check_path_placeholders(
    path: &str,
    method: &http::Method,
    parameters: &[ParameterMeta],
    issues: &mut Vec<ContractIssue>,
) {
    let location = format!("{method} {path}");
    let mut seen = HashSet::new();
    for name in template_placeholders(path) {
        if !seen.insert(name.clone()) {
            issues.push(ContractIssue::new(
                &location,
                "DuplicatePlaceholder",
                format!("placeholder '{{{name}}}' appears more than once"),
            ));
            continue;
        }
        if !parameters
            .iter()
            .any(|p| p.location == ParameterLocation::Path && p.name == name)
        {
            issues.push(ContractIssue::new(
                &location,
                "MissingPathParameter",
                format!("no path parameter declared for placeholder '{{{name}}}'"),
            ));
        }
    }
}

fn collect_routes(spec: &OpenApiV3Spec, issues: &mut Vec<ContractIssue>) -> Vec<RouteMeta> {
    let mut routes = Vec::new();
    let Some(paths_map) = spec.paths.as_ref() else {
        return routes;
    };

    for (path, item) in paths_map {
        let path_level = extract_parameters(spec, &item.parameters);
        for (method_str, operation) in item.methods() {
            let method: http::Method = method_str.clone();
            let parameters =
                merge_parameters(path_level.clone(), extract_parameters(spec, &operation.parameters));
            check_path_placeholders(path, &method, &parameters, issues);

            let operation_id = operation
                .operation_id
                .clone()
                .unwrap_or_else(|| format!("{method} {path}"));

            let security = if !operation.security.is_empty() {
                operation.security.clone()
            } else {
                spec.security.clone()
            };

            routes.push(RouteMeta {
                method,
                path_pattern: Arc::from(path.as_str()),
                operation_id: Arc::from(operation_id.as_str()),
                parameters,
                request_body: extract_request_body(spec, operation),
                security,
            });
        }
    }
    routes
}

impl Contract {
    /// Build a contract from an already parsed OpenAPI document.
    ///
    /// Structural problems are collected and returned together rather than
    /// stopping at the first one.
    pub fn from_spec(spec: &OpenApiV3Spec) -> Result<Contract, ContractIssues> {
        let mut issues = Vec::new();
        let servers = extract_servers(spec, &mut issues);
        let routes = collect_routes(spec, &mut issues);
        ContractIssues(issues).into_result()?;

        Ok(Contract {
            title: spec.info.title.clone(),
            servers,
            routes,
            security_schemes: extract_security_schemes(spec),
        })
    }
}
