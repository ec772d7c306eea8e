use std::sync::Arc;

use cosy_core::{HeaderMap, Method, Request};

use crate::context::HttpContext;
use crate::error::ExtractResult;

/// A type that can be extracted from an [`HttpContext`].
///
/// Types implementing this trait can be used directly as handler function
/// parameters. A failed extraction aborts the handler and the error flows up
/// the middleware chain.
pub trait FromContext: Sized {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self>;
}

/// The whole context, for handlers that need the response or the state map.
impl FromContext for Arc<HttpContext> {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        Ok(ctx.clone())
    }
}

/// Optional parameters never fail.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

impl FromContext for Request {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        Ok(ctx.request().clone())
    }
}

impl FromContext for HeaderMap {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        Ok(ctx.request().headers().clone())
    }
}

impl FromContext for Method {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        Ok(ctx.request().method().clone())
    }
}
