//! Middleware and the onion-model pipeline.
//!
//! A middleware receives the request context and a [`Next`] continuation. It
//! may:
//!
//! - call `next.run(ctx)` and act again once it resolves (post-processing);
//! - return without calling `next` (short-circuiting: nothing further in the
//!   chain runs);
//! - return an error, which propagates through every awaiting caller.
//!
//! ```rust,ignore
//! let timing = from_fn(|ctx: Arc<HttpContext>, next: Next| async move {
//!     let start = Instant::now();
//!     let reply = next.run(ctx.clone()).await?;
//!     ctx.response().header("X-Elapsed", format!("{:?}", start.elapsed()));
//!     Ok(reply)
//! });
//! ```

pub mod common;
pub mod conditional;
pub mod pipeline;
pub mod registry;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::ServiceExt;

use crate::context::HttpContext;
use crate::error::DispatchError;
use crate::handler::{BoxedEndpoint, HandlerResult, Reply};

pub use conditional::{PathMatcher, When, unless, when, when_header, when_method, when_path};
pub use pipeline::{Chain, Pipeline};
pub use registry::{MiddlewareRegistry, RouteMiddleware};

/// A step in the request pipeline.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: Arc<HttpContext>, next: Next) -> HandlerResult;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

pub type BoxedMiddleware = Arc<dyn Middleware>;

// =============================================================================
// Closure middleware
// =============================================================================

/// Middleware backed by an async closure. Created by [`from_fn`].
#[derive(Clone)]
pub struct FromFn<F> {
    f: F,
}

/// Turns an async closure `(Arc<HttpContext>, Next) -> HandlerResult` into a
/// middleware.
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Arc<HttpContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FromFn { f }
}

#[async_trait]
impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Arc<HttpContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, ctx: Arc<HttpContext>, next: Next) -> HandlerResult {
        (self.f)(ctx, next).await
    }

    fn name(&self) -> &str {
        "from_fn"
    }
}

/// Conversion into a shareable [`BoxedMiddleware`].
pub trait IntoMiddleware {
    fn into_middleware(self) -> BoxedMiddleware;
}

impl<M: Middleware> IntoMiddleware for M {
    fn into_middleware(self) -> BoxedMiddleware {
        Arc::new(self)
    }
}

impl IntoMiddleware for BoxedMiddleware {
    fn into_middleware(self) -> BoxedMiddleware {
        self
    }
}

// =============================================================================
// Next
// =============================================================================

/// The rest of the chain after the current middleware.
///
/// Every execution owns its own `Next`, so one pipeline can serve any number
/// of concurrent requests.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    position: usize,
    endpoint: Option<BoxedEndpoint>,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, endpoint: Option<BoxedEndpoint>) -> Self {
        Self {
            chain,
            position: 0,
            endpoint,
        }
    }

    /// Runs the remaining middleware and then the endpoint.
    ///
    /// Fails with [`DispatchError::Cancelled`] if the request was cancelled
    /// before the next step starts. Without an endpoint the innermost step
    /// yields [`Reply::Empty`].
    pub fn run(self, ctx: Arc<HttpContext>) -> BoxFuture<'static, HandlerResult> {
        async move {
            if ctx.is_cancelled() {
                return Err(DispatchError::Cancelled.into());
            }

            match self.chain.get(self.position).cloned() {
                Some(middleware) => {
                    let next = Next {
                        chain: self.chain,
                        position: self.position + 1,
                        endpoint: self.endpoint,
                    };
                    middleware.handle(ctx, next).await
                }
                None => match self.endpoint {
                    Some(endpoint) => endpoint.oneshot(ctx).await,
                    None => Ok(Reply::Empty),
                },
            }
        }
        .boxed()
    }

    /// Number of middleware still ahead, not counting the endpoint.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.position)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("len", &self.chain.len())
            .field("has_endpoint", &self.endpoint.is_some())
            .finish()
    }
}
