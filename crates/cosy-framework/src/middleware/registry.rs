//! Named middleware, middleware groups and the global list.

use std::collections::HashMap;

use tracing::debug;

use super::{BoxedMiddleware, IntoMiddleware};
use crate::error::DispatchError;

/// A middleware reference attached to a route or group: either the
/// middleware itself or a name to look up in the [`MiddlewareRegistry`].
#[derive(Clone)]
pub enum RouteMiddleware {
    Handler(BoxedMiddleware),
    Named(String),
}

impl RouteMiddleware {
    pub fn handler(middleware: impl IntoMiddleware) -> Self {
        Self::Handler(middleware.into_middleware())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl From<&str> for RouteMiddleware {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for RouteMiddleware {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<BoxedMiddleware> for RouteMiddleware {
    fn from(middleware: BoxedMiddleware) -> Self {
        Self::Handler(middleware)
    }
}

impl std::fmt::Debug for RouteMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handler(m) => f.debug_tuple("Handler").field(&m.name()).finish(),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// Registry of named middleware and groups, plus the global list that runs
/// for every matched route.
#[derive(Default)]
pub struct MiddlewareRegistry {
    named: HashMap<String, BoxedMiddleware>,
    groups: HashMap<String, Vec<BoxedMiddleware>>,
    global: Vec<BoxedMiddleware>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a named middleware.
    pub fn register(&mut self, name: impl Into<String>, middleware: impl IntoMiddleware) {
        let name = name.into();
        debug!(middleware = %name, "Registering named middleware");
        self.named.insert(name, middleware.into_middleware());
    }

    /// Defines a group. Names inside the group are resolved now, so the
    /// referenced middleware must already be registered.
    pub fn group<I>(&mut self, name: impl Into<String>, entries: I) -> Result<(), DispatchError>
    where
        I: IntoIterator,
        I::Item: Into<RouteMiddleware>,
    {
        let members = entries
            .into_iter()
            .map(|entry| match entry.into() {
                RouteMiddleware::Handler(m) => Ok(m),
                RouteMiddleware::Named(n) => self
                    .named
                    .get(&n)
                    .cloned()
                    .ok_or(DispatchError::MiddlewareNotFound(n)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.groups.insert(name.into(), members);
        Ok(())
    }

    /// Appends to the global list.
    pub fn global(&mut self, middleware: impl IntoMiddleware) {
        self.global.push(middleware.into_middleware());
    }

    pub fn global_middleware(&self) -> &[BoxedMiddleware] {
        &self.global
    }

    pub fn get(&self, name: &str) -> Option<BoxedMiddleware> {
        self.named.get(name).cloned()
    }

    pub fn get_group(&self, name: &str) -> &[BoxedMiddleware] {
        self.groups.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// `true` if `name` is a registered middleware or group.
    pub fn has(&self, name: &str) -> bool {
        self.named.contains_key(name) || self.groups.contains_key(name)
    }

    pub fn registered_names(&self) -> Vec<&str> {
        self.named.keys().map(String::as_str).collect()
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Expands one reference. A non-empty group wins over a single
    /// middleware of the same name.
    pub fn resolve(&self, entry: &RouteMiddleware) -> Result<Vec<BoxedMiddleware>, DispatchError> {
        match entry {
            RouteMiddleware::Handler(m) => Ok(vec![m.clone()]),
            RouteMiddleware::Named(name) => {
                let group = self.get_group(name);
                if !group.is_empty() {
                    return Ok(group.to_vec());
                }
                self.get(name)
                    .map(|m| vec![m])
                    .ok_or_else(|| DispatchError::MiddlewareNotFound(name.clone()))
            }
        }
    }

    /// Expands a list of references in order.
    pub fn resolve_all(&self, entries: &[RouteMiddleware]) -> Result<Vec<BoxedMiddleware>, DispatchError> {
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            resolved.extend(self.resolve(entry)?);
        }
        Ok(resolved)
    }

    pub fn clear(&mut self) {
        self.named.clear();
        self.groups.clear();
        self.global.clear();
    }
}

impl std::fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("named", &self.registered_names())
            .field("groups", &self.group_names())
            .field("global", &self.global.len())
            .finish()
    }
}
