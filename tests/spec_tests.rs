use brrtgate::dispatcher::HandlerRequest;
use brrtgate::gate::{RequestValidator, ValidatorOptions};
use brrtgate::spec::{load_contract, load_contract_from_str, ContractIssues, ParameterLocation, SpecFormat};
use std::sync::Arc;
use http::Method;
use serde_json::json;

mod common;
use common::fixtures::TEST_SCHEMA;
use common::temp_files;

const PETSTORE: &str = r#"openapi: 3.1.0
info:
  title: Pet Store
  version: 1.0.0
servers:
  - url: https://{region}.pets.example/v1
security:
  - ApiKey: []
paths:
  /pets/{petId}:
    parameters:
      - $ref: '#/components/parameters/PetId'
      - name: verbose
        in: query
        schema:
          type: boolean
    get:
      operationId: getPet
      parameters:
        - name: verbose
          in: query
          required: true
          schema:
            type: string
      responses:
        '200':
          description: ok
    put:
      operationId: replacePet
      security:
        - {}
      requestBody:
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Pet'
      responses:
        '204':
          description: replaced
components:
  parameters:
    PetId:
      name: petId
      in: path
      schema:
        type: integer
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name:
          type: string
        owner:
          $ref: '#/components/schemas/Owner'
    Owner:
      type: object
      properties:
        email:
          type: string
  securitySchemes:
    ApiKey:
      type: apiKey
      in: header
      name: X-Api-Key
"#;

#[test]
fn test_load_yaml_file() {
    let file = temp_files::create_temp_yaml(TEST_SCHEMA);
    let contract = load_contract(file.path()).unwrap();

    assert_eq!(contract.title, "TestServer");
    assert_eq!(contract.servers.len(), 1);
    assert_eq!(contract.servers[0].host.as_deref(), Some("deepmap.ai"));
    assert_eq!(contract.servers[0].base_path, "");
    assert_eq!(contract.routes.len(), 5);
    assert_eq!(contract.secured_routes().count(), 3);
    assert!(contract.security_scheme("BearerAuth").is_some());

    let get = contract.find_operation("getResource").unwrap();
    assert_eq!(get.method, Method::GET);
    let id = get.parameter("id", ParameterLocation::Query).unwrap();
    assert!(!id.required);
    assert_eq!(id.schema.as_ref().unwrap()["maximum"], json!(100));
}

#[test]
fn test_load_json_file() {
    let yaml: serde_yaml::Value = serde_yaml::from_str(TEST_SCHEMA).unwrap();
    let file = temp_files::create_temp_json(&serde_json::to_string(&yaml).unwrap());
    let contract = load_contract(file.path()).unwrap();
    assert_eq!(contract.routes.len(), 5);
}

#[test]
fn test_refs_merging_and_security_inheritance() {
    let file = temp_files::create_temp_yaml(PETSTORE);
    let contract = load_contract(file.path()).unwrap();

    let get = contract.find_operation("getPet").unwrap();
    // Path parameters are always required, even when the contract omits it
    let pet_id = get.parameter("petId", ParameterLocation::Path).unwrap();
    assert!(pet_id.required);
    assert_eq!(pet_id.schema.as_ref().unwrap()["type"], "integer");
    // The operation-level `verbose` replaces the path-level one
    let verbose = get.parameter("verbose", ParameterLocation::Query).unwrap();
    assert!(verbose.required);
    assert_eq!(verbose.schema.as_ref().unwrap()["type"], "string");
    assert_eq!(get.parameters.len(), 2);
    // Global security applies
    assert!(get.requires_security());

    // An empty alternative opts out of the global requirement
    let put = contract.find_operation("replacePet").unwrap();
    assert!(!put.requires_security());
    let body = put.request_body.as_ref().unwrap();
    assert!(!body.required);
    let schema = body.select("application/json").unwrap().schema.clone().unwrap();
    assert_eq!(schema["required"], json!(["name"]));
    assert_eq!(schema["properties"]["owner"]["properties"]["email"]["type"], "string");
}

#[test]
fn test_contract_issues_are_reported_together() {
    let broken = r#"openapi: 3.0.0
info:
  title: Broken
  version: 1.0.0
paths:
  /a/{x}/b/{x}:
    get:
      parameters:
        - name: x
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: ok
  /c/{y}:
    get:
      responses:
        '200':
          description: ok
"#;
    let file = temp_files::create_temp_yaml(broken);
    let err = load_contract(file.path()).unwrap_err();
    let issues = err.downcast_ref::<ContractIssues>().unwrap();
    let kinds: Vec<&str> = issues.iter().map(|i| i.kind.as_str()).collect();
    assert_eq!(issues.len(), 2, "{issues}");
    assert!(kinds.contains(&"DuplicatePlaceholder"));
    assert!(kinds.contains(&"MissingPathParameter"));
}

#[test]
fn test_missing_file_is_an_error() {
    let err = load_contract("/definitely/not/here.yaml").unwrap_err();
    assert!(format!("{err:#}").contains("failed to read contract"));
}

const OPENAPI_30_KEYWORDS: &str = r#"
openapi: 3.0.3
info: {title: keywords, version: "1"}
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - name: limit
          in: query
          schema:
            type: integer
            minimum: 10
            exclusiveMinimum: true
            maximum: 20
            exclusiveMaximum: false
      responses:
        '200': {description: ok}
    post:
      operationId: createPet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name:
                  type: string
                  nullable: true
                tag:
                  type: string
      responses:
        '201': {description: created}
"#;

fn keywords_validator() -> RequestValidator {
    let contract = load_contract_from_str(OPENAPI_30_KEYWORDS, SpecFormat::Yaml).unwrap();
    RequestValidator::new(Arc::new(contract), ValidatorOptions::new()).unwrap()
}

fn post_pet(body: serde_json::Value) -> HandlerRequest {
    HandlerRequest::new(Method::POST, "/pets").with_json_body(&body).unwrap()
}

#[test]
fn test_openapi_30_nullable_property() {
    let v = keywords_validator();
    assert!(v.check(&post_pet(json!({"name": null}))).is_allowed());
    assert!(v.check(&post_pet(json!({"name": "Rex"}))).is_allowed());
    // Only `name` is nullable
    assert!(!v.check(&post_pet(json!({"name": "Rex", "tag": null}))).is_allowed());
}

#[test]
fn test_openapi_30_boolean_exclusive_bounds() {
    let v = keywords_validator();
    let get = |target: &str| HandlerRequest::new(Method::GET, target);
    assert!(!v.check(&get("/pets?limit=10")).is_allowed());
    assert!(v.check(&get("/pets?limit=11")).is_allowed());
    assert!(v.check(&get("/pets?limit=20")).is_allowed());
    assert!(!v.check(&get("/pets?limit=21")).is_allowed());
}
