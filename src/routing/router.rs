//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Select the first route whose predicate holds
//! - Resolve the upstream target, or return an explicit error
//! - Publish replacement tables atomically
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) ordered scan; route tables are small
//! - Explicit NoMatch rather than silent default

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::{HeaderMap, Uri};

use crate::config::schema::RouteConfig;
use crate::config::validation::ValidationError;
use crate::error::GatewayError;
use crate::resilience::fallback::FallbackRegistry;
use crate::routing::matcher::{RequestView, UriVariables};
use crate::routing::route::{Route, RouteBuilder};
use crate::routing::RouteError;

/// An ordered, immutable set of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Arc<Vec<Route>>,
    generation: u64,
}

/// A selected route and the variables its predicate captured.
#[derive(Debug)]
pub struct RouteMatch<'t> {
    pub route: &'t Route,
    pub vars: UriVariables,
}

/// A selected route and the URI the request will be forwarded to.
#[derive(Debug)]
pub struct Resolved<'t> {
    pub route: &'t Route,
    pub target: Uri,
}

impl RouteTable {
    /// Build a table from compiled routes. Ids must be unique.
    pub fn new(routes: Vec<Route>) -> Result<Self, RouteError> {
        let mut seen = HashSet::new();
        for route in &routes {
            if !seen.insert(route.id()) {
                return Err(RouteError::DuplicateId(route.id().to_string()));
            }
        }
        Ok(Self {
            routes: Arc::new(routes),
            generation: 0,
        })
    }

    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Compile declared routes, collecting every problem found.
    pub fn from_config(
        configs: &[RouteConfig],
        fallbacks: &FallbackRegistry,
    ) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut routes = Vec::with_capacity(configs.len());
        let mut seen = HashSet::new();

        for (i, config) in configs.iter().enumerate() {
            if config.id.trim().is_empty() {
                errors.push(ValidationError::new(format!("routes[{}].id", i), "must not be empty"));
            } else if !seen.insert(config.id.as_str()) {
                errors.push(ValidationError::new(
                    format!("routes[{}].id", i),
                    RouteError::DuplicateId(config.id.clone()).to_string(),
                ));
            }

            match Route::from_config(config, fallbacks) {
                Ok(route) => routes.push(route),
                Err(route_errors) => {
                    errors.extend(route_errors.into_iter().map(|(field, e)| {
                        ValidationError::new(format!("routes[{}].{}", i, field), e.to_string())
                    }));
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            routes: Arc::new(routes),
            generation: 0,
        })
    }

    /// First route whose predicate holds, in declaration order.
    pub fn find(&self, req: &RequestView<'_>) -> Option<RouteMatch<'_>> {
        let mut vars = UriVariables::default();
        for route in self.routes.iter() {
            if route.matches(req, &mut vars) {
                return Some(RouteMatch { route, vars });
            }
            vars.truncate(0);
        }
        None
    }

    /// Select a route and compute the outbound target.
    ///
    /// Filters may edit `headers`, which become the outbound headers.
    pub fn resolve(
        &self,
        req: &RequestView<'_>,
        headers: &mut HeaderMap,
    ) -> Result<Resolved<'_>, GatewayError> {
        let RouteMatch { route, vars } = self.find(req).ok_or_else(|| GatewayError::NoMatch {
            method: req.method.to_string(),
            path: req.path.to_string(),
        })?;

        let target = route
            .rewrite(req, &vars, headers)
            .map_err(|source| GatewayError::Filter {
                route_id: route.id().to_string(),
                source,
            })?;

        Ok(Resolved { route, target })
    }

    pub fn get(&self, id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.id() == id)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Incremented each time a table is published through
    /// [`SharedRouteTable::replace`].
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Collects routes built in code.
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<RouteBuilder>,
}

impl RouteTableBuilder {
    pub fn route(mut self, route: RouteBuilder) -> Self {
        self.routes.push(route);
        self
    }

    pub fn build(self) -> Result<RouteTable, RouteError> {
        let routes = self
            .routes
            .into_iter()
            .map(RouteBuilder::build)
            .collect::<Result<Vec<_>, _>>()?;
        RouteTable::new(routes)
    }
}

/// The live route table, replaced atomically on reload.
///
/// Readers take a snapshot and keep it for the whole request, so a swap
/// never affects requests already in flight.
#[derive(Debug)]
pub struct SharedRouteTable {
    current: ArcSwap<RouteTable>,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Publish a new table and return its generation.
    ///
    /// Concurrent writers each get a distinct generation; the last swap
    /// to land is the one readers see.
    pub fn replace(&self, table: RouteTable) -> u64 {
        let routes = table.routes;
        let previous = self.current.rcu(|current| RouteTable {
            routes: routes.clone(),
            generation: current.generation + 1,
        });
        previous.generation + 1
    }
}
