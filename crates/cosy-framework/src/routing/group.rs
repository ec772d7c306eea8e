//! Route groups.
//!
//! A group callback receives a [`RouteGroup`] carrying the scope accumulated
//! from every enclosing group; nothing is pushed onto the router itself.

use cosy_core::Method;

use super::compiler::join_paths;
use super::route::Route;
use super::router::{RouteRegistrar, Router};
use crate::error::RouteResult;
use crate::handler::BoxedEndpoint;
use crate::middleware::{IntoMiddleware, RouteMiddleware};

/// Options for one level of grouping.
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    prefix: Option<String>,
    middleware: Vec<RouteMiddleware>,
    name: Option<String>,
    domain: Option<String>,
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn middleware(mut self, middleware: impl IntoMiddleware) -> Self {
        self.middleware
            .push(RouteMiddleware::Handler(middleware.into_middleware()));
        self
    }

    pub fn middleware_named(mut self, name: impl Into<String>) -> Self {
        self.middleware.push(RouteMiddleware::Named(name.into()));
        self
    }

    /// Name prefix for routes named inside the group.
    ///
    /// Prefixes do not stack: a nested group's name replaces the outer one,
    /// so `api.` around `admin.` names routes `admin.*`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// A bare string is a prefix.
impl From<&str> for GroupOptions {
    fn from(prefix: &str) -> Self {
        Self::new().prefix(prefix)
    }
}

impl From<String> for GroupOptions {
    fn from(prefix: String) -> Self {
        Self::new().prefix(prefix)
    }
}

/// Settings accumulated across nested groups.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupScope {
    pub(crate) prefix: String,
    pub(crate) middleware: Vec<RouteMiddleware>,
    pub(crate) name: Option<String>,
    pub(crate) domain: Option<String>,
}

impl GroupScope {
    /// Prefixes join, middleware lists concatenate outer-first, and name and
    /// domain are replaced only when the inner options set them.
    pub(crate) fn merge(&self, options: GroupOptions) -> Self {
        let prefix = match &options.prefix {
            Some(inner) => join_paths(&self.prefix, inner),
            None => self.prefix.clone(),
        };
        let mut middleware = self.middleware.clone();
        middleware.extend(options.middleware);

        Self {
            prefix,
            middleware,
            name: options.name.or_else(|| self.name.clone()),
            domain: options.domain.or_else(|| self.domain.clone()),
        }
    }
}

/// Registration handle inside a group.
pub struct RouteGroup<'r> {
    router: &'r mut Router,
    scope: GroupScope,
}

impl<'r> RouteGroup<'r> {
    pub(crate) fn new(router: &'r mut Router, scope: GroupScope) -> Self {
        Self { router, scope }
    }

    /// The full prefix in effect.
    pub fn prefix(&self) -> &str {
        &self.scope.prefix
    }
}

impl RouteRegistrar for RouteGroup<'_> {
    fn add_route(
        &mut self,
        methods: Vec<Method>,
        path: &str,
        endpoint: BoxedEndpoint,
    ) -> RouteResult<&mut Route> {
        self.router.register(&self.scope, methods, path, endpoint)
    }

    fn group<F>(&mut self, options: impl Into<GroupOptions>, routes: F) -> RouteResult<()>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> RouteResult<()>,
    {
        let scope = self.scope.merge(options.into());
        routes(&mut RouteGroup::new(&mut *self.router, scope))
    }
}
