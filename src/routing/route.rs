//! A compiled route and its programmatic builder.

use std::sync::Arc;

use axum::http::{HeaderMap, Uri};
use url::{Position, Url};

use crate::config::schema::RouteConfig;
use crate::resilience::fallback::{Fallback, FallbackRegistry, StaticFallback};
use crate::routing::filter::{
    compile_filter, AddRequestHeader, Exchange, Filter, FilterError, PrefixPath, RewritePath,
    SetPath, StripPrefix,
};
use crate::routing::matcher::{
    compile_predicate, AndMatcher, HostMatcher, Matcher, MethodMatcher, PathMatcher,
    PathRegexMatcher, RequestView, UriVariables,
};
use crate::routing::RouteError;

/// Predicate, filters, and upstream for one route id.
pub struct Route {
    id: String,
    predicate: Box<dyn Matcher>,
    filters: Vec<Box<dyn Filter>>,
    upstream: Url,
    /// `scheme://authority` of the upstream.
    origin: String,
    /// Upstream path without a trailing slash.
    base_path: String,
    fallback: Option<Arc<dyn Fallback>>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("predicate", &self.predicate)
            .field("filters", &self.filters)
            .field("upstream", &self.upstream.as_str())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Route {
    /// Start building a route in code.
    pub fn builder(id: impl Into<String>, uri: impl Into<String>) -> RouteBuilder {
        RouteBuilder::new(id, uri)
    }

    /// Compile a declared route.
    ///
    /// Errors are returned per config field (`uri`, `predicate`,
    /// `filters[n]`, `fallback`) so every problem is reported at once.
    pub fn from_config(
        config: &RouteConfig,
        fallbacks: &FallbackRegistry,
    ) -> Result<Self, Vec<(String, RouteError)>> {
        let mut errors = Vec::new();

        let upstream = parse_upstream(&config.uri).map_err(|e| errors.push(("uri".to_string(), e)));
        let predicate =
            compile_predicate(&config.predicate).map_err(|e| errors.push(("predicate".to_string(), e)));

        let mut filters = Vec::with_capacity(config.filters.len());
        for (i, filter) in config.filters.iter().enumerate() {
            match compile_filter(filter) {
                Ok(f) => filters.push(f),
                Err(e) => errors.push((format!("filters[{}]", i), e)),
            }
        }

        let declared = config
            .fallback
            .as_ref()
            .map(StaticFallback::from_config)
            .transpose()
            .map_err(|e| errors.push(("fallback".to_string(), e)));

        let (Ok(upstream), Ok(predicate), Ok(declared)) = (upstream, predicate, declared) else {
            return Err(errors);
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        let fallback = fallbacks
            .get(&config.id)
            .or_else(|| declared.map(|f| Arc::new(f) as Arc<dyn Fallback>));

        Ok(Self::assemble(config.id.clone(), predicate, filters, upstream, fallback))
    }

    fn assemble(
        id: String,
        predicate: Box<dyn Matcher>,
        filters: Vec<Box<dyn Filter>>,
        upstream: Url,
        fallback: Option<Arc<dyn Fallback>>,
    ) -> Self {
        let origin = upstream[..Position::BeforePath].to_string();
        let base_path = upstream.path().trim_end_matches('/').to_string();
        Self {
            id,
            predicate,
            filters,
            upstream,
            origin,
            base_path,
            fallback,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn fallback(&self) -> Option<&Arc<dyn Fallback>> {
        self.fallback.as_ref()
    }

    /// Evaluate the predicate. Captures land in `vars` only on a match.
    pub fn matches(&self, req: &RequestView<'_>, vars: &mut UriVariables) -> bool {
        self.predicate.matches(req, vars)
    }

    /// Run the filters and resolve the outbound URI.
    ///
    /// The target is the upstream base URI, then the effective path, then
    /// the original query string.
    pub fn rewrite(
        &self,
        req: &RequestView<'_>,
        vars: &UriVariables,
        headers: &mut HeaderMap,
    ) -> Result<Uri, FilterError> {
        let mut exchange = Exchange {
            path: req.path.to_string(),
            headers,
            vars,
        };
        for filter in &self.filters {
            filter.apply(&mut exchange)?;
        }

        let mut target = format!("{}{}{}", self.origin, self.base_path, exchange.path);
        if let Some(query) = req.query {
            target.push('?');
            target.push_str(query);
        }

        target
            .parse::<Uri>()
            .map_err(|_| FilterError::InvalidPath { path: exchange.path })
    }
}

fn parse_upstream(uri: &str) -> Result<Url, RouteError> {
    let url = Url::parse(uri).map_err(|e| RouteError::InvalidUpstream {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RouteError::InvalidUpstream {
            uri: uri.to_string(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(RouteError::InvalidUpstream {
            uri: uri.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Fluent construction of a route in code.
///
/// Predicates added through the builder are AND-ed in the order given.
pub struct RouteBuilder {
    id: String,
    uri: String,
    predicates: Vec<Box<dyn Matcher>>,
    filters: Vec<Box<dyn Filter>>,
    fallback: Option<Arc<dyn Fallback>>,
    error: Option<RouteError>,
}

impl RouteBuilder {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            predicates: Vec::new(),
            filters: Vec::new(),
            fallback: None,
            error: None,
        }
    }

    fn try_predicate(mut self, matcher: Result<impl Matcher + 'static, RouteError>) -> Self {
        match matcher {
            Ok(m) => self.predicates.push(Box::new(m)),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    fn try_filter(mut self, filter: Result<impl Filter + 'static, RouteError>) -> Self {
        match filter {
            Ok(f) => self.filters.push(Box::new(f)),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn path(self, pattern: &str) -> Self {
        self.try_predicate(PathMatcher::new(pattern))
    }

    pub fn host(self, pattern: &str) -> Self {
        self.try_predicate(HostMatcher::new(pattern))
    }

    pub fn path_regex(self, pattern: &str, captures: &[&str]) -> Self {
        let captures: Vec<String> = captures.iter().map(|c| c.to_string()).collect();
        self.try_predicate(PathRegexMatcher::new(pattern, &captures))
    }

    pub fn method(self, methods: &[&str]) -> Self {
        let methods: Vec<String> = methods.iter().map(|m| m.to_string()).collect();
        self.try_predicate(MethodMatcher::new(&methods))
    }

    /// Add a custom predicate.
    pub fn predicate(mut self, matcher: impl Matcher + 'static) -> Self {
        self.predicates.push(Box::new(matcher));
        self
    }

    pub fn set_path(self, template: &str) -> Self {
        self.try_filter(SetPath::new(template))
    }

    pub fn rewrite_path(self, regex: &str, replacement: &str) -> Self {
        self.try_filter(RewritePath::new(regex, replacement))
    }

    pub fn prefix_path(self, prefix: &str) -> Self {
        self.filter(PrefixPath::new(prefix))
    }

    pub fn strip_prefix(self, parts: usize) -> Self {
        self.filter(StripPrefix::new(parts))
    }

    pub fn add_request_header(self, name: &str, value: &str) -> Self {
        self.try_filter(AddRequestHeader::new(name, value))
    }

    /// Add a custom filter.
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn fallback(mut self, fallback: impl Fallback + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn build(mut self) -> Result<Route, RouteError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let upstream = parse_upstream(&self.uri)?;
        let predicate: Box<dyn Matcher> = match self.predicates.len() {
            0 => return Err(RouteError::EmptyPredicate("route")),
            1 => self.predicates.remove(0),
            _ => Box::new(AndMatcher::new(self.predicates)),
        };
        Ok(Route::assemble(self.id, predicate, self.filters, upstream, self.fallback))
    }
}
