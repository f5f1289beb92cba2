//! Outbound request filters.
//!
//! Filters run in declared order after a route is selected and before the
//! request is forwarded. Each one sees the path produced by the previous
//! filter; the first one sees the original request path.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use regex::Regex;

use crate::config::schema::FilterConfig;
use crate::routing::{RouteError, UriVariables};

/// Reasons a filter refuses to produce an outbound request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("rewrite regex `{regex}` does not match path `{path}`")]
    RewriteNoMatch { regex: String, path: String },

    #[error("path template references unknown variable `{name}`")]
    UnknownVariable { name: String },

    #[error("filters produced an invalid path `{path}`")]
    InvalidPath { path: String },
}

/// The mutable outbound request state filters operate on.
#[derive(Debug)]
pub struct Exchange<'a> {
    pub path: String,
    pub headers: &'a mut HeaderMap,
    pub vars: &'a UriVariables,
}

/// A transformation of the outbound request.
pub trait Filter: Send + Sync + std::fmt::Debug {
    fn apply(&self, exchange: &mut Exchange<'_>) -> Result<(), FilterError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Variable(String),
}

/// Replaces the path. `{name}` expands a URI variable.
#[derive(Debug, Clone)]
pub struct SetPath {
    parts: Vec<TemplatePart>,
}

impl SetPath {
    pub fn new(template: &str) -> Result<Self, RouteError> {
        let mut parts = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let close = rest[open..].find('}').map(|i| open + i).ok_or_else(|| {
                RouteError::InvalidTemplate(template.to_string())
            })?;
            if open > 0 {
                parts.push(TemplatePart::Literal(rest[..open].to_string()));
            }
            let name = &rest[open + 1..close];
            if name.is_empty() {
                return Err(RouteError::InvalidTemplate(template.to_string()));
            }
            parts.push(TemplatePart::Variable(name.to_string()));
            rest = &rest[close + 1..];
        }
        if rest.contains('}') {
            return Err(RouteError::InvalidTemplate(template.to_string()));
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Literal(rest.to_string()));
        }
        Ok(Self { parts })
    }
}

impl Filter for SetPath {
    fn apply(&self, exchange: &mut Exchange<'_>) -> Result<(), FilterError> {
        let mut path = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => path.push_str(text),
                TemplatePart::Variable(name) => {
                    let value = exchange.vars.get(name).ok_or_else(|| FilterError::UnknownVariable {
                        name: name.clone(),
                    })?;
                    path.push_str(value);
                }
            }
        }
        exchange.path = normalize(path);
        Ok(())
    }
}

/// Regex replace on the path. A path the regex does not match is rejected.
#[derive(Debug, Clone)]
pub struct RewritePath {
    regex: Regex,
    replacement: String,
}

impl RewritePath {
    pub fn new(regex: &str, replacement: &str) -> Result<Self, RouteError> {
        let compiled = Regex::new(regex).map_err(|e| RouteError::InvalidRegex {
            pattern: regex.to_string(),
            reason: e.to_string(),
        })?;

        for group in replacement_groups(replacement) {
            let known = match group.parse::<usize>() {
                Ok(index) => index < compiled.captures_len(),
                Err(_) => compiled.capture_names().flatten().any(|n| n == group),
            };
            if !known {
                return Err(RouteError::UnknownGroup {
                    pattern: regex.to_string(),
                    group: group.to_string(),
                });
            }
        }

        Ok(Self {
            regex: compiled,
            replacement: replacement.to_string(),
        })
    }
}

impl Filter for RewritePath {
    fn apply(&self, exchange: &mut Exchange<'_>) -> Result<(), FilterError> {
        if !self.regex.is_match(&exchange.path) {
            return Err(FilterError::RewriteNoMatch {
                regex: self.regex.as_str().to_string(),
                path: exchange.path.clone(),
            });
        }
        let rewritten = self
            .regex
            .replace_all(&exchange.path, self.replacement.as_str())
            .into_owned();
        exchange.path = normalize(rewritten);
        Ok(())
    }
}

/// Group references (`$name`, `${name}`, `$1`) in a replacement template.
fn replacement_groups(replacement: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut rest = replacement;
    while let Some(dollar) = rest.find('$') {
        rest = &rest[dollar + 1..];
        if let Some(stripped) = rest.strip_prefix('$') {
            // `$$` is a literal dollar.
            rest = stripped;
            continue;
        }
        if let Some(braced) = rest.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                groups.push(&braced[..end]);
                rest = &braced[end + 1..];
            }
            continue;
        }
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if end > 0 {
            groups.push(&rest[..end]);
        }
        rest = &rest[end..];
    }
    groups
}

/// Prepends a fixed prefix.
#[derive(Debug, Clone)]
pub struct PrefixPath {
    prefix: String,
}

impl PrefixPath {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl Filter for PrefixPath {
    fn apply(&self, exchange: &mut Exchange<'_>) -> Result<(), FilterError> {
        exchange.path = normalize(format!("{}{}", self.prefix, exchange.path));
        Ok(())
    }
}

/// Drops the first `parts` path segments.
#[derive(Debug, Clone)]
pub struct StripPrefix {
    parts: usize,
}

impl StripPrefix {
    pub fn new(parts: usize) -> Self {
        Self { parts }
    }
}

impl Filter for StripPrefix {
    fn apply(&self, exchange: &mut Exchange<'_>) -> Result<(), FilterError> {
        let trailing = exchange.path.len() > 1 && exchange.path.ends_with('/');
        let kept: Vec<&str> = exchange
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .skip(self.parts)
            .collect();
        let mut path = format!("/{}", kept.join("/"));
        if trailing && path.len() > 1 {
            path.push('/');
        }
        exchange.path = path;
        Ok(())
    }
}

/// Appends a header to the outbound request.
#[derive(Debug, Clone)]
pub struct AddRequestHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl AddRequestHeader {
    pub fn new(name: &str, value: &str) -> Result<Self, RouteError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RouteError::InvalidHeader(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| RouteError::InvalidHeader(name.as_str().to_string()))?;
        Ok(Self { name, value })
    }
}

impl Filter for AddRequestHeader {
    fn apply(&self, exchange: &mut Exchange<'_>) -> Result<(), FilterError> {
        exchange.headers.append(self.name.clone(), self.value.clone());
        Ok(())
    }
}

/// Removes a header from the outbound request.
#[derive(Debug, Clone)]
pub struct RemoveRequestHeader {
    name: HeaderName,
}

impl RemoveRequestHeader {
    pub fn new(name: &str) -> Result<Self, RouteError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RouteError::InvalidHeader(name.to_string()))?;
        Ok(Self { name })
    }
}

impl Filter for RemoveRequestHeader {
    fn apply(&self, exchange: &mut Exchange<'_>) -> Result<(), FilterError> {
        exchange.headers.remove(&self.name);
        Ok(())
    }
}

fn normalize(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

/// Compile a declared filter.
pub fn compile_filter(config: &FilterConfig) -> Result<Box<dyn Filter>, RouteError> {
    let filter: Box<dyn Filter> = match config {
        FilterConfig::SetPath { template } => Box::new(SetPath::new(template)?),
        FilterConfig::RewritePath { regex, replacement } => {
            Box::new(RewritePath::new(regex, replacement)?)
        }
        FilterConfig::PrefixPath { prefix } => Box::new(PrefixPath::new(prefix)),
        FilterConfig::StripPrefix { parts } => Box::new(StripPrefix::new(*parts)),
        FilterConfig::AddRequestHeader { name, value } => Box::new(AddRequestHeader::new(name, value)?),
        FilterConfig::RemoveRequestHeader { name } => Box::new(RemoveRequestHeader::new(name)?),
    };
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(filter: &dyn Filter, path: &str, vars: &UriVariables) -> Result<String, FilterError> {
        let mut headers = HeaderMap::new();
        let mut exchange = Exchange {
            path: path.to_string(),
            headers: &mut headers,
            vars,
        };
        filter.apply(&mut exchange)?;
        Ok(exchange.path)
    }

    #[test]
    fn test_rewrite_named_capture() {
        let filter = RewritePath::new("/twitter/(?<handle>.*)", "/${handle}").unwrap();
        let vars = UriVariables::default();
        assert_eq!(run(&filter, "/twitter/alice", &vars).unwrap(), "/alice");
        assert_eq!(run(&filter, "/twitter/", &vars).unwrap(), "/");
    }

    #[test]
    fn test_rewrite_mismatch_is_rejected() {
        let filter = RewritePath::new("/twitter/(?<handle>.*)", "/${handle}").unwrap();
        let err = run(&filter, "/facebook/alice", &UriVariables::default()).unwrap_err();
        assert!(matches!(err, FilterError::RewriteNoMatch { .. }));
    }

    #[test]
    fn test_rewrite_checks_groups_at_compile_time() {
        assert!(RewritePath::new("/a/(?<x>.*)", "/${y}").is_err());
        assert!(RewritePath::new("/a/(.*)", "/$2").is_err());
        assert!(RewritePath::new("/a/(.*)", "/$1").is_ok());
        assert!(RewritePath::new("/a/(.*)", "/$$1").is_ok());
    }

    #[test]
    fn test_set_path_ignores_original() {
        let filter = SetPath::new("/guides").unwrap();
        let vars = UriVariables::default();
        for path in ["/", "/test", "/a/b/c"] {
            assert_eq!(run(&filter, path, &vars).unwrap(), "/guides");
        }
    }

    #[test]
    fn test_set_path_variables() {
        let filter = SetPath::new("/profiles/{user}").unwrap();
        let mut vars = UriVariables::default();
        vars.insert("user", "alice");
        assert_eq!(run(&filter, "/u/alice", &vars).unwrap(), "/profiles/alice");

        let err = run(&filter, "/u/alice", &UriVariables::default()).unwrap_err();
        assert_eq!(err, FilterError::UnknownVariable { name: "user".into() });

        assert!(SetPath::new("/broken/{user").is_err());
        assert!(SetPath::new("/broken/{}").is_err());
    }

    #[test]
    fn test_prefix_and_strip() {
        let vars = UriVariables::default();
        assert_eq!(run(&PrefixPath::new("/api/"), "/users", &vars).unwrap(), "/api/users");
        assert_eq!(run(&StripPrefix::new(1), "/api/users/7", &vars).unwrap(), "/users/7");
        assert_eq!(run(&StripPrefix::new(2), "/api/users/", &vars).unwrap(), "/");
        assert_eq!(run(&StripPrefix::new(1), "/api/users/", &vars).unwrap(), "/users/");
    }

    #[test]
    fn test_header_filters() {
        let add = AddRequestHeader::new("x-gateway", "stream-gateway").unwrap();
        let remove = RemoveRequestHeader::new("cookie").unwrap();
        let vars = UriVariables::default();

        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("session=1"));
        let mut exchange = Exchange {
            path: "/".into(),
            headers: &mut headers,
            vars: &vars,
        };
        add.apply(&mut exchange).unwrap();
        remove.apply(&mut exchange).unwrap();

        assert_eq!(headers.get("x-gateway").unwrap(), "stream-gateway");
        assert!(headers.get("cookie").is_none());
    }
}
