use super::types::Contract;
use anyhow::Context;
use oas3::OpenApiV3Spec;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Serialization of a contract document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    /// Guess the format from a file extension; anything other than
    /// `.json` is treated as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SpecFormat::Json,
            _ => SpecFormat::Yaml,
        }
    }
}

fn strip_unknown_verbs(val: &mut serde_json::Value) {
    const METHODS: [&str; 8] = ["get", "post", "put", "delete", "patch", "options", "head", "trace"];

    if let Some(serde_json::Value::Object(paths_map)) = val.get_mut("paths") {
        for item in paths_map.values_mut() {
            if let serde_json::Value::Object(obj) = item {
                obj.retain(|k, _| {
                    let lk = k.to_ascii_lowercase();
                    match lk.as_str() {
                        "summary" | "description" | "servers" | "parameters" | "$ref" => true,
                        m if METHODS.contains(&m) => true,
                        _ => k.starts_with("x-"),
                    }
                });
            }
        }
    }
}

/// Keys whose values are instance data, not schemas.
const INSTANCE_KEYS: [&str; 5] = ["example", "examples", "default", "enum", "const"];

/// Rewrite OpenAPI 3.0 schema keywords into their JSON Schema forms.
///
/// `nullable: true` becomes a `"null"` member of `type` (and of `enum`), and
/// boolean `exclusiveMinimum`/`exclusiveMaximum` take over the numeric bound
/// of `minimum`/`maximum`. Documents declaring another version are untouched.
fn normalize_openapi_30(val: &mut Value) {
    let is_30 = val
        .get("openapi")
        .and_then(Value::as_str)
        .is_some_and(|v| v.starts_with("3.0"));
    if is_30 {
        normalize_schema_keywords(val);
    }
}

fn normalize_schema_keywords(val: &mut Value) {
    match val {
        Value::Object(obj) => {
            if let Some(Value::Bool(nullable)) = obj.get("nullable").cloned() {
                obj.remove("nullable");
                if nullable {
                    let with_null = match obj.get("type") {
                        Some(Value::String(t)) => Some(vec![Value::from(t.as_str()), Value::from("null")]),
                        Some(Value::Array(types)) if !types.iter().any(|t| t.as_str() == Some("null")) => {
                            let mut types = types.clone();
                            types.push(Value::from("null"));
                            Some(types)
                        }
                        _ => None,
                    };
                    if let Some(types) = with_null {
                        obj.insert("type".to_string(), Value::Array(types));
                    }
                    if let Some(Value::Array(values)) = obj.get_mut("enum") {
                        if !values.contains(&Value::Null) {
                            values.push(Value::Null);
                        }
                    }
                }
            }
            for (exclusive, bound) in [("exclusiveMinimum", "minimum"), ("exclusiveMaximum", "maximum")] {
                if let Some(Value::Bool(flag)) = obj.get(exclusive).cloned() {
                    obj.remove(exclusive);
                    if flag {
                        if let Some(limit) = obj.remove(bound) {
                            obj.insert(exclusive.to_string(), limit);
                        }
                    }
                }
            }
            for (key, child) in obj.iter_mut() {
                if !INSTANCE_KEYS.contains(&key.as_str()) {
                    normalize_schema_keywords(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_schema_keywords),
        _ => {}
    }
}

/// Parse a contract document held in memory.
pub fn load_contract_from_str(content: &str, format: SpecFormat) -> anyhow::Result<Contract> {
    let mut value: serde_json::Value = match format {
        SpecFormat::Json => serde_json::from_str(content).context("contract is not valid JSON")?,
        SpecFormat::Yaml => {
            // Via serde_yaml::Value so that unquoted numeric keys (`200:`) become strings.
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(content).context("contract is not valid YAML")?;
            serde_json::to_value(yaml).context("contract YAML cannot be represented as JSON")?
        }
    };

    strip_unknown_verbs(&mut value);
    normalize_openapi_30(&mut value);
    let spec: OpenApiV3Spec =
        serde_json::from_value(value).context("document is not an OpenAPI 3 contract")?;
    let contract = Contract::from_spec(&spec)?;
    Ok(contract)
}

/// Load a contract from a `.yaml`, `.yml` or `.json` file.
pub fn load_contract(path: impl AsRef<Path>) -> anyhow::Result<Contract> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read contract {}", path.display()))?;
    let contract = load_contract_from_str(&content, SpecFormat::from_path(path))
        .with_context(|| format!("failed to load contract {}", path.display()))?;

    info!(
        spec_path = %path.display(),
        title = %contract.title,
        routes_count = contract.routes.len(),
        servers_count = contract.servers.len(),
        security_schemes = contract.security_schemes.len(),
        "Contract loaded"
    );
    Ok(contract)
}
