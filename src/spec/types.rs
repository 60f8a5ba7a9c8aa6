use super::{SecurityRequirement, SecurityScheme};
use http::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// Position in the fixed validation order: path, query, header, cookie.
    pub fn rank(self) -> u8 {
        match self {
            ParameterLocation::Path => 0,
            ParameterLocation::Query => 1,
            ParameterLocation::Header => 2,
            ParameterLocation::Cookie => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    /// Array item delimiter for this serialization style.
    pub fn array_delimiter(self, explode: bool) -> char {
        match self {
            ParameterStyle::SpaceDelimited => ' ',
            ParameterStyle::PipeDelimited => '|',
            ParameterStyle::Label if explode => '.',
            ParameterStyle::Matrix if explode => ';',
            _ => ',',
        }
    }
}

impl From<oas3::spec::ParameterStyle> for ParameterStyle {
    fn from(style: oas3::spec::ParameterStyle) -> Self {
        use oas3::spec::ParameterStyle as PS;
        match style {
            PS::Matrix => ParameterStyle::Matrix,
            PS::Label => ParameterStyle::Label,
            PS::Form => ParameterStyle::Form,
            PS::Simple => ParameterStyle::Simple,
            PS::SpaceDelimited => ParameterStyle::SpaceDelimited,
            PS::PipeDelimited => ParameterStyle::PipeDelimited,
            PS::DeepObject => ParameterStyle::DeepObject,
        }
    }
}

impl std::fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<oas3::spec::ParameterIn> for ParameterLocation {
    fn from(loc: oas3::spec::ParameterIn) -> Self {
        match loc {
            oas3::spec::ParameterIn::Path => ParameterLocation::Path,
            oas3::spec::ParameterIn::Query => ParameterLocation::Query,
            oas3::spec::ParameterIn::Header => ParameterLocation::Header,
            oas3::spec::ParameterIn::Cookie => ParameterLocation::Cookie,
        }
    }
}

/// One declared operation: a (method, path template) pair and everything
/// needed to check a request against it.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    pub method: Method,
    pub path_pattern: Arc<str>,
    pub operation_id: Arc<str>,
    /// Merged path-level and operation-level parameters.
    pub parameters: Vec<ParameterMeta>,
    pub request_body: Option<RequestBodyMeta>,
    /// Effective security alternatives (operation-level, else global).
    pub security: Vec<SecurityRequirement>,
}

impl RouteMeta {
    /// `true` when at least one security alternative names a scheme.
    pub fn requires_security(&self) -> bool {
        self.security.iter().any(|alternative| !alternative.0.is_empty())
    }

    /// Stable identity for this operation; operation ids may repeat across a contract.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path_pattern)
    }

    pub fn parameter(&self, name: &str, location: ParameterLocation) -> Option<&ParameterMeta> {
        self.parameters
            .iter()
            .find(|p| p.location == location && p.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ParameterMeta {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Option<Value>,
    pub style: Option<ParameterStyle>,
    pub explode: Option<bool>,
}

impl ParameterMeta {
    /// Declared style, or the default for the parameter's location.
    pub fn effective_style(&self) -> ParameterStyle {
        self.style.unwrap_or(match self.location {
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
        })
    }

    /// Declared explode flag, or `true` only for form style.
    pub fn effective_explode(&self) -> bool {
        self.explode
            .unwrap_or(self.effective_style() == ParameterStyle::Form)
    }
}

#[derive(Debug, Clone)]
pub struct RequestBodyMeta {
    pub required: bool,
    pub content: Vec<MediaTypeMeta>,
}

impl RequestBodyMeta {
    /// Pick the declared media type for a request content type: exact
    /// match first, then `type/*`, then `*/*`.
    pub fn select(&self, content_type: &str) -> Option<&MediaTypeMeta> {
        let wanted = content_type.to_ascii_lowercase();
        if let Some(exact) = self.content.iter().find(|m| m.media_type == wanted) {
            return Some(exact);
        }
        let wildcard = wanted
            .split_once('/')
            .map(|(major, _)| format!("{major}/*"));
        if let Some(range) = wildcard.and_then(|w| self.content.iter().find(|m| m.media_type == w)) {
            return Some(range);
        }
        self.content.iter().find(|m| m.media_type == "*/*")
    }
}

#[derive(Debug, Clone)]
pub struct MediaTypeMeta {
    /// Lowercased media type essence, e.g. `application/json`.
    pub media_type: String,
    pub schema: Option<Value>,
}

/// A declared server, pre-split into the parts the router matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMeta {
    pub url: String,
    /// Host pattern (lowercased, may contain `{var}` placeholders); `None`
    /// for relative server URLs, which accept any host.
    pub host: Option<String>,
    /// Base path without trailing slash; empty for the root.
    pub base_path: String,
}

/// The loaded API contract. Immutable once built and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Contract {
    pub title: String,
    pub servers: Vec<ServerMeta>,
    pub routes: Vec<RouteMeta>,
    pub security_schemes: HashMap<String, SecurityScheme>,
}

impl Contract {
    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.security_schemes.get(name)
    }

    /// Operations that carry at least one security alternative.
    pub fn secured_routes(&self) -> impl Iterator<Item = &RouteMeta> {
        self.routes.iter().filter(|r| r.requires_security())
    }

    pub fn find_operation(&self, operation_id: &str) -> Option<&RouteMeta> {
        self.routes
            .iter()
            .find(|r| r.operation_id.as_ref() == operation_id)
    }
}
