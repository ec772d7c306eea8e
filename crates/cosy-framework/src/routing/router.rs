use cosy_core::{Method, Params};
use tracing::debug;

use super::compiler::{compile, join_paths};
use super::group::{GroupOptions, GroupScope, RouteGroup};
use super::route::{ANY_METHODS, Route};
use crate::error::{RouteError, RouteResult};
use crate::handler::{BoxedEndpoint, Handler, into_endpoint};

/// A resolved route and the parameters extracted from the path.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: Params,
}

/// Route registration, shared by [`Router`] and [`RouteGroup`].
///
/// Every method normalizes the path, applies the enclosing group scope and
/// appends the route. Registration order is resolution order.
pub trait RouteRegistrar {
    fn add_route(
        &mut self,
        methods: Vec<Method>,
        path: &str,
        endpoint: BoxedEndpoint,
    ) -> RouteResult<&mut Route>;

    /// Registers routes inside a nested scope.
    fn group<F>(&mut self, options: impl Into<GroupOptions>, routes: F) -> RouteResult<()>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> RouteResult<()>;

    fn get<H: Handler<T>, T: 'static>(&mut self, path: &str, handler: H) -> RouteResult<&mut Route> {
        self.add_route(vec![Method::GET], path, into_endpoint(handler))
    }

    fn post<H: Handler<T>, T: 'static>(&mut self, path: &str, handler: H) -> RouteResult<&mut Route> {
        self.add_route(vec![Method::POST], path, into_endpoint(handler))
    }

    fn put<H: Handler<T>, T: 'static>(&mut self, path: &str, handler: H) -> RouteResult<&mut Route> {
        self.add_route(vec![Method::PUT], path, into_endpoint(handler))
    }

    fn patch<H: Handler<T>, T: 'static>(&mut self, path: &str, handler: H) -> RouteResult<&mut Route> {
        self.add_route(vec![Method::PATCH], path, into_endpoint(handler))
    }

    fn delete<H: Handler<T>, T: 'static>(&mut self, path: &str, handler: H) -> RouteResult<&mut Route> {
        self.add_route(vec![Method::DELETE], path, into_endpoint(handler))
    }

    fn options<H: Handler<T>, T: 'static>(&mut self, path: &str, handler: H) -> RouteResult<&mut Route> {
        self.add_route(vec![Method::OPTIONS], path, into_endpoint(handler))
    }

    fn head<H: Handler<T>, T: 'static>(&mut self, path: &str, handler: H) -> RouteResult<&mut Route> {
        self.add_route(vec![Method::HEAD], path, into_endpoint(handler))
    }

    /// Answers every standard method.
    fn any<H: Handler<T>, T: 'static>(&mut self, path: &str, handler: H) -> RouteResult<&mut Route> {
        self.add_route(ANY_METHODS.to_vec(), path, into_endpoint(handler))
    }

    fn match_methods<I, H, T>(&mut self, methods: I, path: &str, handler: H) -> RouteResult<&mut Route>
    where
        I: IntoIterator<Item = Method>,
        H: Handler<T>,
        T: 'static,
    {
        self.add_route(methods.into_iter().collect(), path, into_endpoint(handler))
    }
}

/// The route table.
///
/// Registration needs `&mut Router`; serving only needs `&Router`, so a
/// router shared behind an `Arc` is effectively frozen.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(
        &mut self,
        scope: &GroupScope,
        methods: Vec<Method>,
        path: &str,
        endpoint: BoxedEndpoint,
    ) -> RouteResult<&mut Route> {
        let compiled = compile(&join_paths(&scope.prefix, path))?;
        debug!(methods = ?methods, path = compiled.template(), "Registering route");

        let route = Route::new(methods, compiled, endpoint).with_scope(
            scope.middleware.clone(),
            scope.name.clone(),
            scope.domain.clone(),
        );
        self.routes.push(route);
        let last = self.routes.len() - 1;
        Ok(&mut self.routes[last])
    }

    /// First route (in registration order) that allows `method` and matches
    /// `path`, ignoring domains.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.allows(method))
            .find_map(|route| route.matches(path).map(|params| RouteMatch { route, params }))
    }

    /// Like [`resolve`](Self::resolve), also skipping routes bound to another
    /// domain.
    pub fn resolve_for_host(
        &self,
        method: &Method,
        host: Option<&str>,
        path: &str,
    ) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.allows(method) && route.matches_host(host))
            .find_map(|route| route.matches(path).map(|params| RouteMatch { route, params }))
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

    pub fn route_by_name(&self, name: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.route_name() == Some(name))
    }

    /// Generates the path of a named route.
    pub fn url(&self, name: &str, params: &Params) -> RouteResult<String> {
        self.route_by_name(name)
            .ok_or_else(|| RouteError::UnknownRoute(name.to_string()))?
            .compiled()
            .build(params)
    }
}

impl RouteRegistrar for Router {
    fn add_route(
        &mut self,
        methods: Vec<Method>,
        path: &str,
        endpoint: BoxedEndpoint,
    ) -> RouteResult<&mut Route> {
        self.register(&GroupScope::default(), methods, path, endpoint)
    }

    fn group<F>(&mut self, options: impl Into<GroupOptions>, routes: F) -> RouteResult<()>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> RouteResult<()>,
    {
        let scope = GroupScope::default().merge(options.into());
        routes(&mut RouteGroup::new(self, scope))
    }
}
