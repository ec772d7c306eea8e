//! Extractors backed by the container and the request state map.

use std::ops::Deref;
use std::sync::Arc;

use cosy_core::Token;

use crate::context::HttpContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// A service resolved from the container under its type token.
///
/// ```rust,ignore
/// app.container().singleton::<UserRepository>(Token::of::<UserRepository>());
///
/// async fn index(users: Inject<UserRepository>) -> Json<Vec<User>> {
///     Json(users.all())
/// }
/// ```
///
/// Resolution failures surface as [`ExtractError::Service`], answered with a
/// 500.
pub struct Inject<T>(pub Arc<T>);

impl<T> Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Send + Sync + 'static> FromContext for Inject<T> {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        Ok(Self(ctx.resolve::<T>(Token::of::<T>())?))
    }
}

/// A value a middleware stored with [`HttpContext::set_state`].
#[derive(Debug, Clone)]
pub struct State<T>(pub T);

impl<T> Deref for State<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + Send + Sync + 'static> FromContext for State<T> {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        ctx.get_state::<T>()
            .map(State)
            .ok_or(ExtractError::MissingState(std::any::type_name::<T>()))
    }
}
