use crate::dispatcher::HandlerRequest;
use crate::gate::{Outcome, RequestValidator, ValidatorOptions};
use crate::security::{AuthContext, AuthenticationFunc, AuthenticationInput};
use crate::spec::{load_contract, Contract, ContractIssues};
use crate::validator::SchemaCache;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Exit code for a request the contract rejects.
pub const EXIT_DENIED: u8 = 2;
/// Exit code for an unusable contract or invocation.
pub const EXIT_FAILURE: u8 = 1;

/// Command-line interface for brrtgate
#[derive(Parser, Debug)]
#[command(name = "brrtgate")]
#[command(version, about = "Check HTTP requests against an OpenAPI contract", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "BRRTGATE_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a contract and report every problem found in it
    ///
    /// Errors (exit 1): structural contract issues and schemas that do not
    /// compile. Warnings: security requirements naming undeclared schemes and
    /// operations without an operationId.
    Lint {
        /// Path to the OpenAPI contract (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// List the servers and operations of a contract
    Routes {
        /// Path to the OpenAPI contract (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// Check a single request against a contract
    ///
    /// Prints the outcome as JSON. Exit code 0 when allowed, 2 when denied.
    Check {
        /// Path to the OpenAPI contract (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,

        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Absolute request URL, e.g. http://api.example.com/v1/items?id=1
        #[arg(short, long)]
        url: String,

        /// Request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        header: Vec<String>,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,

        /// Content type of the body
        #[arg(long, default_value = "application/json")]
        content_type: String,

        /// Treat every security requirement as satisfied
        #[arg(long, default_value_t = false)]
        assume_authenticated: bool,
    },
}

/// Execute a parsed command line.
///
/// # Errors
///
/// Returns an error when the contract cannot be read or parsed, or when the
/// request given to `check` is malformed.
pub fn run_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Lint { spec } => lint(&spec),
        Commands::Routes { spec } => routes(&spec),
        Commands::Check {
            spec,
            method,
            url,
            header,
            body,
            content_type,
            assume_authenticated,
        } => {
            let contract = Arc::new(load_contract(&spec)?);
            let req = build_request(&method, &url, &header, body.as_deref(), &content_type)?;
            check(contract, &req, assume_authenticated)
        }
    }
}

fn lint(spec: &Path) -> anyhow::Result<ExitCode> {
    let contract = match load_contract(spec) {
        Ok(contract) => contract,
        Err(err) => {
            let Some(issues) = err.downcast_ref::<ContractIssues>() else {
                return Err(err);
            };
            println!("❌ {}: {} issue(s)", spec.display(), issues.len());
            for issue in issues.iter() {
                println!("  error {issue}");
            }
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    };

    let (_, schema_errors) = SchemaCache::compile_all(&contract);
    for err in &schema_errors {
        println!("  error {err}");
    }
    let errors = schema_errors.len();

    let mut warnings = 0usize;
    for route in &contract.routes {
        if route.operation_id.contains(' ') {
            println!("  warn  [MissingOperationId] {}: operation has no operationId", route.key());
            warnings += 1;
        }
        for scheme in route.security.iter().flat_map(|alt| alt.0.keys()) {
            if contract.security_scheme(scheme).is_none() {
                println!(
                    "  warn  [UndeclaredSecurityScheme] {}: scheme {scheme} is not declared in components",
                    route.key()
                );
                warnings += 1;
            }
        }
    }

    if errors > 0 {
        println!("❌ {}: {errors} error(s), {warnings} warning(s)", spec.display());
        return Ok(ExitCode::from(EXIT_FAILURE));
    }
    println!(
        "✅ {}: {} operation(s), {} secured, {warnings} warning(s)",
        contract.title,
        contract.routes.len(),
        contract.secured_routes().count()
    );
    Ok(ExitCode::SUCCESS)
}

fn routes(spec: &Path) -> anyhow::Result<ExitCode> {
    let contract = load_contract(spec)?;
    if contract.servers.is_empty() {
        println!("server /");
    }
    for server in &contract.servers {
        println!("server {}", server.url);
    }
    for route in &contract.routes {
        let secured = if route.requires_security() { " [secured]" } else { "" };
        println!(
            "{:<7} {:<40} {}{secured}",
            route.method.as_str(),
            route.path_pattern,
            route.operation_id
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn parse_method(method: &str) -> anyhow::Result<Method> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method '{method}'"))
}

pub(crate) fn parse_header(header: &str) -> anyhow::Result<(&str, &str)> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| anyhow!("header '{header}' must look like 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("header '{header}' has an empty name"));
    }
    Ok((name, value.trim()))
}

pub(crate) fn build_request(
    method: &str,
    url: &str,
    headers: &[String],
    body: Option<&str>,
    content_type: &str,
) -> anyhow::Result<HandlerRequest> {
    let mut req = HandlerRequest::from_url(parse_method(method)?, url)?;
    for header in headers {
        let (name, value) = parse_header(header)?;
        req = req.with_header(name, value);
    }
    if let Some(body) = body {
        req = req.with_body(content_type, body.as_bytes().to_vec());
    }
    Ok(req)
}

fn cli_authentication(assume_authenticated: bool) -> AuthenticationFunc {
    Arc::new(move |_ctx: &AuthContext<'_>, input: &AuthenticationInput<'_>| {
        if assume_authenticated {
            Ok(())
        } else {
            Err(anyhow!(
                "scheme {} requires authentication (pass --assume-authenticated to skip)",
                input.scheme_name
            ))
        }
    })
}

pub(crate) fn outcome_json(outcome: &Outcome) -> Value {
    match outcome {
        Outcome::Allowed(matched) => {
            let params: Map<String, Value> = matched
                .path_params
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                .collect();
            json!({
                "outcome": "allowed",
                "operation_id": &*matched.route.operation_id,
                "path_params": params,
            })
        }
        Outcome::Denied(denial) => json!({
            "outcome": "denied",
            "stage": denial.stage.as_str(),
            "kind": denial.error.kind(),
            "status": denial.status.as_u16(),
            "error": denial.error.to_string(),
        }),
    }
}

fn check(contract: Arc<Contract>, req: &HandlerRequest, assume_authenticated: bool) -> anyhow::Result<ExitCode> {
    let options = ValidatorOptions::from_env().authentication_func(cli_authentication(assume_authenticated));
    let validator = RequestValidator::new(contract, options).context("cannot build request validator")?;
    let outcome = validator.check(req);
    let rendered = serde_json::to_string_pretty(&outcome_json(&outcome))?;
    println!("{rendered}");
    Ok(if outcome.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DENIED)
    })
}
