use super::{AuthContext, AuthenticationFunc, AuthenticationInput};
use crate::dispatcher::HandlerRequest;
use crate::spec::SecurityScheme;
use anyhow::{anyhow, bail, Context};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Ready-made authentication function for HTTP bearer schemes.
///
/// Tokens have the form `header.payload.signature`. The signature part must
/// equal the configured shared `signature`, and the payload is base64 JSON
/// whose whitespace separated `scope` claim must contain every scope the
/// operation requires.
///
/// This is a pre-shared-secret check meant for tests and internal services,
/// not a JWT verifier.
#[derive(Debug, Clone)]
pub struct BearerScopeAuthenticator {
    signature: String,
    cookie_name: Option<String>,
}

impl BearerScopeAuthenticator {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            cookie_name: None,
        }
    }

    /// Also look for the token in this cookie (checked before the header).
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    fn extract_token<'a>(&self, req: &'a HandlerRequest) -> Option<&'a str> {
        if let Some(token) = self.cookie_name.as_deref().and_then(|name| req.get_cookie(name)) {
            return Some(token);
        }
        req.get_header("authorization")
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .map(str::trim)
    }

    /// Verify a raw token against the required scopes.
    pub fn validate_token(&self, token: &str, scopes: &[String]) -> anyhow::Result<()> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(sig)) = (parts.next(), parts.next(), parts.next()) else {
            bail!("malformed bearer token");
        };
        if sig != self.signature {
            bail!("invalid token signature");
        }

        let payload_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| general_purpose::STANDARD.decode(payload))
            .context("invalid base64 token payload")?;
        let claims: Value = serde_json::from_slice(&payload_bytes).context("invalid JSON token payload")?;

        let granted = claims.get("scope").and_then(Value::as_str).unwrap_or("");
        let missing: Vec<&str> = scopes
            .iter()
            .map(String::as_str)
            .filter(|required| !granted.split_whitespace().any(|g| g == *required))
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!("token is missing scopes: {}", missing.join(" ")));
        }
        Ok(())
    }

    /// Check one security entry; non-bearer schemes are rejected.
    pub fn authenticate(&self, ctx: &AuthContext<'_>, input: &AuthenticationInput<'_>) -> anyhow::Result<()> {
        match input.scheme {
            SecurityScheme::Http { scheme, .. } if scheme.eq_ignore_ascii_case("bearer") => {}
            _ => bail!("scheme {} is not an HTTP bearer scheme", input.scheme_name),
        }
        let token = self
            .extract_token(ctx.request())
            .ok_or_else(|| anyhow!("missing bearer token"))?;
        self.validate_token(token, input.scopes)?;
        debug!(
            request_id = %ctx.request().request_id,
            scheme = %input.scheme_name,
            "Bearer token accepted"
        );
        Ok(())
    }

    pub fn into_authentication_func(self) -> AuthenticationFunc {
        Arc::new(move |ctx: &AuthContext<'_>, input: &AuthenticationInput<'_>| self.authenticate(ctx, input))
    }
}

/// Shorthand for `BearerScopeAuthenticator::new(signature).into_authentication_func()`.
pub fn bearer_scope_authenticator(signature: impl Into<String>) -> AuthenticationFunc {
    BearerScopeAuthenticator::new(signature).into_authentication_func()
}
