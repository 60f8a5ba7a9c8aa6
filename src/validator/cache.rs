//! # Schema Cache
//!
//! Every parameter and request body schema of a contract is compiled once,
//! when the request validator is built. Requests only ever read the cache, so
//! it needs no locking and a schema that does not compile surfaces as a
//! construction error instead of a per-request failure.
//!
//! ## Cache Key Structure
//!
//! Keys are formatted as `{METHOD} {path}:{kind}:{name}`:
//! - `{METHOD} {path}` identifies the operation (operation ids may repeat)
//! - `kind` is `path`, `query`, `header`, `cookie` or `body`
//! - `name` is the parameter name or the body media type

use crate::error::ConfigError;
use crate::spec::{Contract, ParameterLocation, RouteMeta};
use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct SchemaCache {
    validators: HashMap<String, Arc<Validator>>,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("compiled", &self.validators.len())
            .finish()
    }
}

fn cache_key(route: &RouteMeta, kind: &str, name: &str) -> String {
    format!("{} {}:{}:{}", route.method, route.path_pattern, kind, name)
}

fn compile(key: &str, schema: &Value) -> Result<Arc<Validator>, ConfigError> {
    jsonschema::validator_for(schema)
        .map(Arc::new)
        .map_err(|e| ConfigError::InvalidSchema {
            location: key.to_string(),
            reason: e.to_string(),
        })
}

impl SchemaCache {
    /// Compile every parameter and body schema in `contract`, failing on the
    /// first schema that does not compile.
    pub fn precompile(contract: &Contract) -> Result<Self, ConfigError> {
        let (cache, mut errors) = Self::compile_all(contract);
        if errors.is_empty() {
            Ok(cache)
        } else {
            Err(errors.swap_remove(0))
        }
    }

    /// Compile every schema, keeping the ones that compile and one
    /// [`ConfigError::InvalidSchema`] per schema that does not.
    pub fn compile_all(contract: &Contract) -> (Self, Vec<ConfigError>) {
        let mut validators = HashMap::new();
        let mut errors = Vec::new();

        let mut add = |key: String, schema: &Value| match compile(&key, schema) {
            Ok(validator) => {
                validators.insert(key, validator);
            }
            Err(err) => {
                warn!(cache_key = %key, error = %err, "Schema does not compile");
                errors.push(err);
            }
        };

        for route in &contract.routes {
            for param in &route.parameters {
                if let Some(schema) = &param.schema {
                    let key = cache_key(route, param.location.as_str(), &param.name);
                    debug!(cache_key = %key, "Compiling parameter schema");
                    add(key, schema);
                }
            }
            if let Some(body) = &route.request_body {
                for media in &body.content {
                    if let Some(schema) = &media.schema {
                        let key = cache_key(route, "body", &media.media_type);
                        debug!(cache_key = %key, "Compiling body schema");
                        add(key, schema);
                    }
                }
            }
        }

        info!(
            compiled_schemas = validators.len(),
            failed_schemas = errors.len(),
            routes_count = contract.routes.len(),
            "Schema cache precompiled"
        );
        (Self { validators }, errors)
    }

    pub fn parameter(&self, route: &RouteMeta, location: ParameterLocation, name: &str) -> Option<&Validator> {
        self.validators
            .get(&cache_key(route, location.as_str(), name))
            .map(Arc::as_ref)
    }

    pub fn body(&self, route: &RouteMeta, media_type: &str) -> Option<&Validator> {
        self.validators
            .get(&cache_key(route, "body", media_type))
            .map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{MediaTypeMeta, ParameterMeta, RequestBodyMeta};
    use http::Method;
    use serde_json::json;

    fn contract_with(schema: Value) -> Contract {
        Contract {
            title: "cache".into(),
            servers: Vec::new(),
            routes: vec![RouteMeta {
                method: Method::POST,
                path_pattern: Arc::from("/resource"),
                operation_id: Arc::from("createResource"),
                parameters: vec![ParameterMeta {
                    name: "id".into(),
                    location: ParameterLocation::Query,
                    required: false,
                    schema: Some(json!({"type": "integer", "minimum": 10})),
                    style: None,
                    explode: None,
                }],
                request_body: Some(RequestBodyMeta {
                    required: true,
                    content: vec![MediaTypeMeta {
                        media_type: "application/json".into(),
                        schema: Some(schema),
                    }],
                }),
                security: Vec::new(),
            }],
            security_schemes: HashMap::new(),
        }
    }

    #[test]
    fn test_precompiles_parameters_and_bodies() {
        let contract = contract_with(json!({"type": "object"}));
        let cache = SchemaCache::precompile(&contract).unwrap();
        assert_eq!(cache.len(), 2);

        let route = &contract.routes[0];
        let id = cache.parameter(route, ParameterLocation::Query, "id").unwrap();
        assert!(id.is_valid(&json!(50)));
        assert!(!id.is_valid(&json!(5)));
        assert!(cache.parameter(route, ParameterLocation::Header, "id").is_none());
        assert!(cache.body(route, "application/json").is_some());
    }

    #[test]
    fn test_compile_all_reports_every_broken_schema() {
        let mut contract = contract_with(json!({"type": 12}));
        contract.routes[0].parameters[0].schema = Some(json!({"minimum": "ten"}));
        let (cache, errors) = SchemaCache::compile_all(&contract);
        assert!(cache.is_empty());
        let locations: Vec<String> = errors
            .iter()
            .map(|e| match e {
                ConfigError::InvalidSchema { location, .. } => location.clone(),
                other => panic!("unexpected error {other:?}"),
            })
            .collect();
        assert_eq!(
            locations,
            vec!["POST /resource:query:id", "POST /resource:body:application/json"]
        );
    }

    #[test]
    fn test_invalid_schema_is_a_construction_error() {
        let contract = contract_with(json!({"type": 12}));
        let err = SchemaCache::precompile(&contract).unwrap_err();
        match err {
            ConfigError::InvalidSchema { location, .. } => {
                assert_eq!(location, "POST /resource:body:application/json");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
