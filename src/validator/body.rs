use super::cache::SchemaCache;
use super::params::{coerce_primitive, schema_type};
use crate::dispatcher::HandlerRequest;
use crate::error::GateError;
use crate::spec::RouteMeta;
use serde_json::{Map, Value};
use tracing::debug;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

fn decode_form(body: &[u8], schema: Option<&Value>) -> Result<Value, String> {
    let properties = schema.and_then(|s| s.get("properties"));
    let mut object = Map::new();
    for (key, raw) in url::form_urlencoded::parse(body) {
        let prop_schema = properties.and_then(|p| p.get(&*key));
        if schema_type(prop_schema) == Some("array") {
            let item = coerce_primitive(&raw, prop_schema.and_then(|s| s.get("items")))?;
            match object
                .entry(key.into_owned())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => items.push(item),
                other => *other = Value::Array(vec![item]),
            }
        } else {
            let value = coerce_primitive(&raw, prop_schema)?;
            object.insert(key.into_owned(), value);
        }
    }
    Ok(Value::Object(object))
}

/// Decode a request body by its media type.
///
/// `Ok(None)` means there is no decoder for the media type; such bodies
/// pass unless the operation declares a schema for them.
pub fn decode_body(body: &[u8], media_type: &str, schema: Option<&Value>) -> Result<Option<Value>, String> {
    if is_json(media_type) {
        return serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| format!("failed to decode JSON body: {e}"));
    }
    if media_type == FORM_URLENCODED {
        return decode_form(body, schema).map(Some);
    }
    if media_type.starts_with("text/") {
        return std::str::from_utf8(body)
            .map(|s| Some(Value::String(s.to_string())))
            .map_err(|_| "body is not valid UTF-8 text".to_string());
    }
    Ok(None)
}

/// Check the request body of the matched operation.
pub(crate) fn check_body(req: &HandlerRequest, route: &RouteMeta, cache: &SchemaCache) -> Result<(), GateError> {
    let violation = |reason: String| {
        debug!(
            request_id = %req.request_id,
            operation_id = %route.operation_id,
            reason = %reason,
            "Body violation"
        );
        GateError::BodyViolation { reason }
    };

    let Some(declared) = &route.request_body else {
        return Ok(());
    };
    let Some(body) = req.body.as_deref().filter(|b| !b.is_empty()) else {
        if declared.required {
            return Err(violation("request body is required".to_string()));
        }
        return Ok(());
    };

    let Some(content_type) = req.content_type() else {
        return Err(violation("header Content-Type is required".to_string()));
    };
    let Some(media) = declared.select(&content_type) else {
        return Err(violation(format!(
            "content type {content_type} is not declared for this operation"
        )));
    };

    let decoded = decode_body(body, &content_type, media.schema.as_ref()).map_err(&violation)?;
    let Some(validator) = cache.body(route, &media.media_type) else {
        return Ok(());
    };
    let Some(value) = decoded else {
        return Err(violation(format!("no decoder for content type {content_type}")));
    };
    if let Err(err) = validator.validate(&value) {
        return Err(violation(err.to_string()));
    }
    Ok(())
}
