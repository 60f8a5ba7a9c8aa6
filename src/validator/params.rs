//! Parameter extraction and coercion.
//!
//! Raw parameter text is turned into typed JSON according to the declared
//! schema type and serialization style before it is checked against the
//! compiled schema. Text that cannot be coerced is a violation in its own
//! right: `value foo is not a valid integer`.

use super::cache::SchemaCache;
use crate::dispatcher::HandlerRequest;
use crate::error::GateError;
use crate::router::RouteMatch;
use crate::spec::{ParameterLocation, ParameterMeta, ParameterStyle};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Primary JSON type of a schema; in type unions the first non-null entry.
pub(crate) fn schema_type(schema: Option<&Value>) -> Option<&str> {
    match schema?.get("type")? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

fn not_a(raw: &str, expected: &str) -> String {
    format!("value {raw} is not a valid {expected}")
}

/// Coerce a single scalar according to the schema's primitive type.
/// Anything that is not integer, number or boolean stays a string.
pub fn coerce_primitive(raw: &str, schema: Option<&Value>) -> Result<Value, String> {
    match schema_type(schema) {
        Some("integer") => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| not_a(raw, "integer")),
        Some("number") => {
            if let Ok(i) = raw.parse::<i64>() {
                return Ok(Value::from(i));
            }
            raw.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| not_a(raw, "number"))
        }
        Some("boolean") => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(not_a(raw, "boolean")),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn coerce_properties<'a>(
    pairs: impl IntoIterator<Item = (String, &'a str)>,
    schema: Option<&Value>,
) -> Result<Value, String> {
    let properties = schema.and_then(|s| s.get("properties"));
    let mut object = Map::new();
    for (key, raw) in pairs {
        let prop_schema = properties.and_then(|p| p.get(&key));
        object.insert(key, coerce_primitive(raw, prop_schema)?);
    }
    Ok(Value::Object(object))
}

/// Drop the label (`.`) or matrix (`;name=`) prefix of a path value.
fn strip_style_prefix<'r>(raw: &'r str, param: &ParameterMeta) -> &'r str {
    match param.effective_style() {
        ParameterStyle::Label => raw.strip_prefix('.').unwrap_or(raw),
        ParameterStyle::Matrix => {
            let prefix = format!(";{}=", param.name);
            raw.strip_prefix(prefix.as_str()).unwrap_or(raw)
        }
        _ => raw,
    }
}

fn coerce_array(values: &[&str], param: &ParameterMeta) -> Result<Value, String> {
    let items = param.schema.as_ref().and_then(|s| s.get("items"));
    let style = param.effective_style();
    let explode = param.effective_explode();

    let parts: Vec<&str> = match values {
        [] => Vec::new(),
        [single] if !(explode && style == ParameterStyle::Form) => {
            let single = strip_style_prefix(single, param);
            if single.is_empty() {
                Vec::new()
            } else {
                let delimiter = style.array_delimiter(explode);
                let prefix = format!("{}=", param.name);
                single
                    .split(delimiter)
                    .map(|p| {
                        if style == ParameterStyle::Matrix {
                            p.strip_prefix(prefix.as_str()).unwrap_or(p)
                        } else {
                            p
                        }
                    })
                    .collect()
            }
        }
        many => many.to_vec(),
    };

    parts
        .into_iter()
        .map(|p| coerce_primitive(p, items))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn coerce_object_text(raw: &str, param: &ParameterMeta) -> Result<Value, String> {
    let raw = strip_style_prefix(raw, param);
    if raw.trim_start().starts_with('{') {
        return serde_json::from_str::<Value>(raw)
            .ok()
            .filter(Value::is_object)
            .ok_or_else(|| not_a(raw, "object"));
    }

    let style = param.effective_style();
    let schema = param.schema.as_ref();
    if param.effective_explode() {
        let delimiter = style.array_delimiter(true);
        let pairs = raw
            .split(delimiter)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.split_once('=')
                    .map(|(k, v)| (k.to_string(), v))
                    .ok_or_else(|| not_a(raw, "object"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        coerce_properties(pairs, schema)
    } else {
        let tokens: Vec<&str> = raw.split(',').collect();
        if tokens.len() % 2 != 0 {
            return Err(not_a(raw, "object"));
        }
        coerce_properties(
            tokens.chunks(2).map(|kv| (kv[0].to_string(), kv[1])),
            schema,
        )
    }
}

/// Coerce the raw occurrences of a parameter into a typed value.
///
/// Arrays take either one occurrence per item or a single delimited
/// occurrence depending on style and explode; scalars use the last occurrence.
pub fn coerce_values(values: &[&str], param: &ParameterMeta) -> Result<Value, String> {
    match schema_type(param.schema.as_ref()) {
        Some("array") => coerce_array(values, param),
        Some("object") => match values.last() {
            Some(raw) => coerce_object_text(raw, param),
            None => Ok(Value::Object(Map::new())),
        },
        _ => match values.last() {
            Some(raw) => coerce_primitive(strip_style_prefix(raw, param), param.schema.as_ref()),
            None => Ok(Value::Null),
        },
    }
}

/// Object query parameters spread over several keys: `name[prop]=v` for
/// deepObject, or one key per declared property for exploded form style.
fn query_object_pairs<'r>(req: &'r HandlerRequest, param: &ParameterMeta) -> Vec<(String, &'r str)> {
    match param.effective_style() {
        ParameterStyle::DeepObject => {
            let prefix = format!("{}[", param.name);
            req.query_params
                .iter()
                .filter_map(|(k, v)| {
                    let prop = k.strip_prefix(prefix.as_str())?.strip_suffix(']')?;
                    Some((prop.to_string(), v.as_str()))
                })
                .collect()
        }
        _ => {
            let declared = param
                .schema
                .as_ref()
                .and_then(|s| s.get("properties"))
                .and_then(Value::as_object);
            let Some(declared) = declared else {
                return Vec::new();
            };
            req.query_params
                .iter()
                .filter(|(k, _)| declared.contains_key(k.as_ref()))
                .map(|(k, v)| (k.to_string(), v.as_str()))
                .collect()
        }
    }
}

/// Extract and coerce a parameter. `Ok(None)` means it was not sent.
pub(crate) fn extract_param(
    req: &HandlerRequest,
    matched: &RouteMatch,
    param: &ParameterMeta,
) -> Result<Option<Value>, String> {
    let values: Vec<&str> = match param.location {
        ParameterLocation::Path => matched.get_path_param(&param.name).into_iter().collect(),
        ParameterLocation::Query => {
            let is_object = schema_type(param.schema.as_ref()) == Some("object");
            let spread = param.effective_style() == ParameterStyle::DeepObject
                || (param.effective_style() == ParameterStyle::Form && param.effective_explode());
            if is_object && spread {
                let pairs = query_object_pairs(req, param);
                if pairs.is_empty() {
                    return Ok(None);
                }
                return coerce_properties(pairs, param.schema.as_ref()).map(Some);
            }
            req.get_query_values(&param.name)
        }
        ParameterLocation::Header => req.get_header_values(&param.name),
        ParameterLocation::Cookie => req.get_cookie(&param.name).into_iter().collect(),
    };

    if values.is_empty() {
        return Ok(None);
    }
    coerce_values(&values, param).map(Some)
}

/// Check one declared parameter of the matched operation.
pub(crate) fn check_parameter(
    req: &HandlerRequest,
    matched: &RouteMatch,
    param: &ParameterMeta,
    cache: &SchemaCache,
) -> Result<(), GateError> {
    let violation = |reason: String| {
        debug!(
            request_id = %req.request_id,
            param = %param.name,
            location = %param.location,
            reason = %reason,
            "Parameter violation"
        );
        GateError::ParameterViolation {
            param: param.name.clone(),
            location: param.location,
            reason,
        }
    };

    let value = match extract_param(req, matched, param) {
        Ok(Some(value)) => value,
        Ok(None) if param.required => return Err(violation("value is required but missing".to_string())),
        Ok(None) => return Ok(()),
        Err(reason) => return Err(violation(reason)),
    };

    if let Some(validator) = cache.parameter(&matched.route, param.location, &param.name) {
        if let Err(err) = validator.validate(&value) {
            return Err(violation(err.to_string()));
        }
    }
    Ok(())
}
