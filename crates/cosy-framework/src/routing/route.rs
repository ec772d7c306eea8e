use std::collections::HashMap;

use cosy_core::{Method, Params};

use super::compiler::{CompiledRoute, compile_with};
use crate::error::RouteResult;
use crate::handler::BoxedEndpoint;
use crate::middleware::{IntoMiddleware, RouteMiddleware};

/// The methods an `any` route answers.
pub const ANY_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::HEAD,
];

/// A registered route.
///
/// Setters return `&mut Self` so they chain off a registration call:
///
/// ```rust,ignore
/// router
///     .get("/users/:id", show_user)?
///     .name("users.show")
///     .middleware_named("auth")
///     .where_param("id", r"\d+")?;
/// ```
pub struct Route {
    methods: Vec<Method>,
    compiled: CompiledRoute,
    constraints: HashMap<String, String>,
    endpoint: BoxedEndpoint,
    middleware: Vec<RouteMiddleware>,
    name: Option<String>,
    name_prefix: Option<String>,
    domain: Option<String>,
}

impl Route {
    pub(crate) fn new(methods: Vec<Method>, compiled: CompiledRoute, endpoint: BoxedEndpoint) -> Self {
        Self {
            methods,
            compiled,
            constraints: HashMap::new(),
            endpoint,
            middleware: Vec::new(),
            name: None,
            name_prefix: None,
            domain: None,
        }
    }

    pub(crate) fn with_scope(
        mut self,
        middleware: Vec<RouteMiddleware>,
        name_prefix: Option<String>,
        domain: Option<String>,
    ) -> Self {
        self.middleware = middleware;
        self.name_prefix = name_prefix;
        self.domain = domain;
        self
    }

    /// Names the route. Inside a named group the group name is prepended.
    pub fn name(&mut self, name: &str) -> &mut Self {
        let prefix = self.name_prefix.as_deref().unwrap_or_default();
        self.name = Some(format!("{prefix}{name}"));
        self
    }

    /// Appends a middleware that runs after any inherited from groups.
    pub fn middleware(&mut self, middleware: impl IntoMiddleware) -> &mut Self {
        self.middleware
            .push(RouteMiddleware::Handler(middleware.into_middleware()));
        self
    }

    /// Appends a middleware (or group) by its registered name.
    pub fn middleware_named(&mut self, name: impl Into<String>) -> &mut Self {
        self.middleware.push(RouteMiddleware::Named(name.into()));
        self
    }

    /// Restricts the route to requests for `domain`.
    pub fn domain(&mut self, domain: impl Into<String>) -> &mut Self {
        self.domain = Some(domain.into());
        self
    }

    /// Constrains a parameter with a regular expression and recompiles.
    pub fn where_param(&mut self, param: &str, pattern: &str) -> RouteResult<&mut Self> {
        let mut constraints = self.constraints.clone();
        constraints.insert(param.to_string(), pattern.to_string());
        self.compiled = compile_with(self.compiled.template(), &constraints)?;
        self.constraints = constraints;
        Ok(self)
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// The normalized path template.
    pub fn path(&self) -> &str {
        self.compiled.template()
    }

    pub fn compiled(&self) -> &CompiledRoute {
        &self.compiled
    }

    pub fn endpoint(&self) -> &BoxedEndpoint {
        &self.endpoint
    }

    pub fn route_middleware(&self) -> &[RouteMiddleware] {
        &self.middleware
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn route_domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Whether a request for `host` may use this route. Ports are ignored
    /// and the comparison is case-insensitive. Routes without a domain
    /// accept any host.
    pub fn matches_host(&self, host: Option<&str>) -> bool {
        let Some(domain) = &self.domain else {
            return true;
        };
        host.map(|h| h.split(':').next().unwrap_or(h))
            .is_some_and(|h| h.eq_ignore_ascii_case(domain))
    }

    pub fn matches(&self, path: &str) -> Option<Params> {
        self.compiled.matches(path)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("path", &self.path())
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}
