use super::core::template_pattern;
use crate::spec::ServerMeta;
use regex::Regex;

/// Matches the host and base path of a declared server.
#[derive(Debug, Clone)]
pub(crate) struct ServerMatcher {
    pub(crate) url: String,
    host: Option<Regex>,
    base: Option<Regex>,
}

/// Lowercase and drop the default HTTP/HTTPS port so that `Example.com:80`
/// and `example.com` compare equal.
pub(crate) fn normalize_host(host: &str) -> String {
    let lower = host.trim().to_ascii_lowercase();
    for default_port in [":80", ":443"] {
        if let Some(stripped) = lower.strip_suffix(default_port) {
            return stripped.to_string();
        }
    }
    lower
}

impl ServerMatcher {
    /// Stand-in used when a contract declares no servers: any host, root path.
    pub(crate) fn implicit() -> Self {
        Self {
            url: "/".to_string(),
            host: None,
            base: None,
        }
    }

    pub(crate) fn compile(server: &ServerMeta) -> Result<Self, regex::Error> {
        let host = match &server.host {
            Some(pattern) => {
                let (body, _) = template_pattern(&normalize_host(pattern));
                Some(Regex::new(&format!("^{body}$"))?)
            }
            None => None,
        };
        let base = if server.base_path.is_empty() {
            None
        } else {
            let (body, _) = template_pattern(&server.base_path);
            Some(Regex::new(&format!("^{body}(?P<rest>/.*)?$"))?)
        };
        Ok(Self {
            url: server.url.clone(),
            host,
            base,
        })
    }

    /// Relative servers accept any host, including none at all.
    pub(crate) fn accepts_host(&self, host: Option<&str>) -> bool {
        match (&self.host, host) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(pattern), Some(host)) => pattern.is_match(&normalize_host(host)),
        }
    }

    /// Split a request path into this server's base path and the
    /// operation-relative remainder (`/` when nothing is left).
    pub(crate) fn split_base<'p>(&self, path: &'p str) -> Option<(&'p str, &'p str)> {
        match &self.base {
            None => path.starts_with('/').then_some(("", path)),
            Some(base) => {
                let caps = base.captures(path)?;
                match caps.name("rest") {
                    Some(rest) => Some((&path[..rest.start()], rest.as_str())),
                    None => Some((path, "/")),
                }
            }
        }
    }
}
