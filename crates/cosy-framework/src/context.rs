//! Per-request context handed to middleware and handlers.
//!
//! One [`HttpContext`] is created for every dispatched request and shared as
//! an `Arc` by every step of the middleware chain. It owns:
//!
//! - the [`Request`], already carrying its route parameters;
//! - the [`Response`] under construction, behind a mutex so that middleware
//!   running after the handler can still decorate it;
//! - a handle to the service [`Container`];
//! - a typed state map for passing data between middleware and handlers;
//! - the request's [`CancellationToken`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use cosy_core::{Container, ContainerResult, Request, Response, Token};

/// The full context of one request.
///
/// ```rust,ignore
/// async fn show(ctx: Arc<HttpContext>) -> Result<Json<User>, BoxError> {
///     let id = ctx.request().param("id").unwrap_or_default().to_string();
///     let users = ctx.resolve::<UserRepository>("users")?;
///     ctx.response().header("X-User", &id);
///     Ok(Json(users.find(&id)?))
/// }
/// ```
pub struct HttpContext {
    request: Request,
    response: Mutex<Response>,
    container: Arc<Container>,
    state: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    cancellation: CancellationToken,
}

impl HttpContext {
    /// Creates a context for `request` that can never be cancelled.
    pub fn new(request: Request, container: Arc<Container>) -> Self {
        Self {
            request,
            response: Mutex::new(Response::new()),
            container,
            state: Mutex::new(HashMap::new()),
            cancellation: CancellationToken::new(),
        }
    }

    /// Ties the context to an external cancellation signal.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Locks the response for modification.
    ///
    /// The guard is not `Send`; drop it before the next `.await`.
    pub fn response(&self) -> MutexGuard<'_, Response> {
        self.response.lock()
    }

    /// Moves the response out, leaving a fresh one behind.
    pub fn take_response(&self) -> Response {
        std::mem::take(&mut *self.response.lock())
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Resolves a service from the container.
    pub fn resolve<T: Send + Sync + 'static>(&self, token: impl Into<Token>) -> ContainerResult<Arc<T>> {
        self.container.resolve(token)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    // ─── Request state ────────────────────────────────────────────────────────

    /// Stores a value for later middleware or the handler. One value per
    /// type; storing again overwrites.
    pub fn set_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.lock().insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a clone of a stored value.
    pub fn get_state<T: Clone + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn has_state<T: 'static>(&self) -> bool {
        self.state.lock().contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns a stored value.
    pub fn take_state<T: 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

impl std::fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpContext")
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct UserId(u64);

    #[test]
    fn test_state_roundtrip() {
        let ctx = HttpContext::new(Request::default(), Arc::new(Container::new()));
        assert!(!ctx.has_state::<UserId>());

        ctx.set_state(UserId(7));
        assert_eq!(ctx.get_state::<UserId>(), Some(UserId(7)));
        assert_eq!(ctx.take_state::<UserId>(), Some(UserId(7)));
        assert!(!ctx.has_state::<UserId>());
    }

    #[test]
    fn test_take_response_leaves_fresh_one() {
        let ctx = HttpContext::new(Request::default(), Arc::new(Container::new()));
        ctx.response().send("hi").unwrap();

        let taken = ctx.take_response();
        assert!(taken.has_responded());
        assert!(!ctx.response().has_responded());
    }
}
