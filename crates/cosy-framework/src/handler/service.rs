//! Handlers as tower services.
//!
//! [`HandlerService<H, T>`] wraps a single handler and implements
//! `tower::Service<Arc<HttpContext>>`. Routes store the type-erased
//! [`BoxedEndpoint`] so that handlers of any signature fit in one table.

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::Service;
use tower::util::BoxCloneSyncService;

use super::reply::Reply;
use super::traits::{Handler, HandlerResult};
use crate::context::HttpContext;
use crate::error::BoxError;

/// A type-erased, `Clone + Send + Sync` endpoint.
pub type BoxedEndpoint = BoxCloneSyncService<Arc<HttpContext>, Reply, BoxError>;

/// A tower [`Service`] that calls a single generic handler.
pub struct HandlerService<H, T> {
    handler: H,
    // Keeps the service Send + Sync regardless of T.
    _marker: PhantomData<fn() -> T>,
}

impl<H: Clone, T> Clone for HandlerService<H, T> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            _marker: PhantomData,
        }
    }
}

impl<H, T> HandlerService<H, T>
where
    H: Handler<T>,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<H, T> Service<Arc<HttpContext>> for HandlerService<H, T>
where
    H: Handler<T>,
    T: 'static,
{
    type Response = Reply;
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<HttpContext>) -> Self::Future {
        self.handler.clone().call(ctx)
    }
}

/// Erases a handler into a [`BoxedEndpoint`].
pub fn into_endpoint<H, T>(handler: H) -> BoxedEndpoint
where
    H: Handler<T>,
    T: 'static,
{
    BoxCloneSyncService::new(HandlerService::new(handler))
}
