//! Route predicates.
//!
//! # Responsibilities
//! - Match path patterns (segment globs, case-sensitive)
//! - Match host patterns (segment globs, case-insensitive, port ignored)
//! - Match full-path regexes and export their named groups
//! - Match method and header conditions
//! - Combine conditions with AND / OR semantics
//!
//! # Design Decisions
//! - AND short-circuits on the first false sub-predicate
//! - OR keeps only the captures of the branch that matched
//! - Regex is only used when a route explicitly declares `path_regex`

use axum::http::{request::Parts, HeaderMap, HeaderName, Method};
use regex::Regex;

use crate::config::schema::PredicateConfig;
use crate::routing::pattern::SegmentPattern;
use crate::routing::RouteError;

/// The routing-relevant view of an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    /// Host without port, as sent by the client.
    pub host: Option<&'a str>,
    pub headers: Option<&'a HeaderMap>,
}

impl<'a> RequestView<'a> {
    pub fn new(method: &'a Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            query: None,
            host: None,
            headers: None,
        }
    }

    pub fn with_host(mut self, host: &'a str) -> Self {
        self.host = Some(strip_port(host));
        self
    }

    pub fn with_query(mut self, query: &'a str) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_headers(mut self, headers: &'a HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Build a view over request parts. The host comes from the `Host`
    /// header, falling back to the URI authority (HTTP/2).
    pub fn from_parts(parts: &'a Parts) -> Self {
        let host = parts
            .headers
            .get(axum::http::header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.host())
            .map(strip_port);

        Self {
            method: &parts.method,
            path: parts.uri.path(),
            query: parts.uri.query(),
            host,
            headers: Some(&parts.headers),
        }
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Named values captured while matching, for use by filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriVariables {
    entries: Vec<(String, String)>,
}

impl UriVariables {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition. Captures are
    /// pushed into `vars`.
    fn matches(&self, req: &RequestView<'_>, vars: &mut UriVariables) -> bool;
}

/// Matches the request path against a segment pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: SegmentPattern,
}

impl PathMatcher {
    pub fn new(pattern: &str) -> Result<Self, RouteError> {
        Ok(Self {
            pattern: SegmentPattern::path(pattern)?,
        })
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &RequestView<'_>, vars: &mut UriVariables) -> bool {
        self.pattern.matches(req.path, vars)
    }
}

/// Matches the Host header against a segment pattern.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    pattern: SegmentPattern,
}

impl HostMatcher {
    pub fn new(pattern: &str) -> Result<Self, RouteError> {
        Ok(Self {
            pattern: SegmentPattern::host(pattern)?,
        })
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &RequestView<'_>, vars: &mut UriVariables) -> bool {
        req.host
            .map(|host| self.pattern.matches(host, vars))
            .unwrap_or(false)
    }
}

/// Matches the whole request path against a regex.
#[derive(Debug, Clone)]
pub struct PathRegexMatcher {
    regex: Regex,
    exported: Vec<String>,
}

impl PathRegexMatcher {
    /// `captures` lists the named groups to export; empty exports all.
    pub fn new(pattern: &str, captures: &[String]) -> Result<Self, RouteError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| RouteError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let names: Vec<String> = regex.capture_names().flatten().map(str::to_string).collect();
        let exported = if captures.is_empty() {
            names
        } else {
            if let Some(missing) = captures.iter().find(|c| !names.contains(c)) {
                return Err(RouteError::UnknownGroup {
                    pattern: pattern.to_string(),
                    group: missing.clone(),
                });
            }
            captures.to_vec()
        };

        Ok(Self { regex, exported })
    }
}

impl Matcher for PathRegexMatcher {
    fn matches(&self, req: &RequestView<'_>, vars: &mut UriVariables) -> bool {
        let Some(caps) = self.regex.captures(req.path) else {
            return false;
        };
        for name in &self.exported {
            if let Some(value) = caps.name(name) {
                vars.insert(name.clone(), value.as_str());
            }
        }
        true
    }
}

/// Matches when the request method is one of a set.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: &[String]) -> Result<Self, RouteError> {
        if methods.is_empty() {
            return Err(RouteError::EmptyPredicate("method"));
        }
        let methods = methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| RouteError::InvalidMethod(m.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { methods })
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &RequestView<'_>, _vars: &mut UriVariables) -> bool {
        self.methods.contains(req.method)
    }
}

/// Matches a header by presence, optionally by value regex.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<Regex>,
}

impl HeaderMatcher {
    pub fn new(name: &str, regex: Option<&str>) -> Result<Self, RouteError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RouteError::InvalidHeader(name.to_string()))?;
        let value = regex
            .map(|r| {
                Regex::new(&format!("^(?:{})$", r)).map_err(|e| RouteError::InvalidRegex {
                    pattern: r.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self { name, value })
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &RequestView<'_>, _vars: &mut UriVariables) -> bool {
        let Some(headers) = req.headers else {
            return false;
        };
        headers.get_all(&self.name).iter().any(|v| match &self.value {
            None => true,
            Some(regex) => v.to_str().map(|s| regex.is_match(s)).unwrap_or(false),
        })
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &RequestView<'_>, vars: &mut UriVariables) -> bool {
        let mark = vars.len();
        // All matchers must pass; `all` stops at the first miss.
        if self.matchers.iter().all(|m| m.matches(req, vars)) {
            true
        } else {
            vars.truncate(mark);
            false
        }
    }
}

/// Combines multiple matchers with OR semantics, first branch wins.
#[derive(Debug)]
pub struct OrMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl OrMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for OrMatcher {
    fn matches(&self, req: &RequestView<'_>, vars: &mut UriVariables) -> bool {
        self.matchers.iter().any(|m| {
            let mark = vars.len();
            if m.matches(req, vars) {
                true
            } else {
                vars.truncate(mark);
                false
            }
        })
    }
}

/// Adapts a closure into a matcher, for predicates that config cannot express.
pub struct FnMatcher<F> {
    label: &'static str,
    f: F,
}

impl<F> FnMatcher<F>
where
    F: Fn(&RequestView<'_>) -> bool + Send + Sync,
{
    pub fn new(label: &'static str, f: F) -> Self {
        Self { label, f }
    }
}

impl<F> std::fmt::Debug for FnMatcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FnMatcher").field(&self.label).finish()
    }
}

impl<F> Matcher for FnMatcher<F>
where
    F: Fn(&RequestView<'_>) -> bool + Send + Sync,
{
    fn matches(&self, req: &RequestView<'_>, _vars: &mut UriVariables) -> bool {
        (self.f)(req)
    }
}

/// Compile a declared predicate into a matcher tree.
pub fn compile_predicate(config: &PredicateConfig) -> Result<Box<dyn Matcher>, RouteError> {
    let matcher: Box<dyn Matcher> = match config {
        PredicateConfig::Path { pattern } => Box::new(PathMatcher::new(pattern)?),
        PredicateConfig::Host { pattern } => Box::new(HostMatcher::new(pattern)?),
        PredicateConfig::PathRegex { pattern, captures } => {
            Box::new(PathRegexMatcher::new(pattern, captures)?)
        }
        PredicateConfig::Method { methods } => Box::new(MethodMatcher::new(methods)?),
        PredicateConfig::Header { name, regex } => Box::new(HeaderMatcher::new(name, regex.as_deref())?),
        PredicateConfig::And { predicates } => {
            if predicates.is_empty() {
                return Err(RouteError::EmptyPredicate("and"));
            }
            let matchers: Vec<Box<dyn Matcher>> =
                predicates.iter().map(compile_predicate).collect::<Result<_, _>>()?;
            Box::new(AndMatcher::new(matchers))
        }
        PredicateConfig::Or { predicates } => {
            if predicates.is_empty() {
                return Err(RouteError::EmptyPredicate("or"));
            }
            let matchers: Vec<Box<dyn Matcher>> =
                predicates.iter().map(compile_predicate).collect::<Result<_, _>>()?;
            Box::new(OrMatcher::new(matchers))
        }
    };
    Ok(matcher)
}
