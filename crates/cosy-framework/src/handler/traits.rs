//! The [`Handler`] trait and its blanket implementations for async functions.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::reply::{IntoReply, Reply};
use crate::context::HttpContext;
use crate::error::BoxError;
use crate::extractor::FromContext;

/// What running a handler (or a whole middleware chain) produces.
pub type HandlerResult = Result<Reply, BoxError>;

/// A route handler.
///
/// Implemented for async functions that:
/// - take 0-16 parameters implementing [`FromContext`]
/// - return a type implementing [`IntoReply`]
///
/// A failing extractor aborts the call with its [`ExtractError`], which then
/// travels up the middleware chain like any other handler error.
///
/// ```rust,ignore
/// async fn status() -> Json<Value> {
///     Json(json!({ "status": "ok" }))
/// }
///
/// async fn show(params: PathParams, users: Inject<UserRepository>) -> Result<Json<User>, HttpError> {
///     users.find(params.get("id").unwrap_or_default())
///         .map(Json)
///         .ok_or_else(|| HttpError::not_found("no such user"))
/// }
/// ```
///
/// [`ExtractError`]: crate::error::ExtractError
pub trait Handler<T>: Clone + Send + Sync + 'static {
    fn call(self, ctx: Arc<HttpContext>) -> BoxFuture<'static, HandlerResult>;
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoReply + 'static,
            $( $ty: FromContext + Send + 'static, )*
        {
            fn call(self, ctx: Arc<HttpContext>) -> BoxFuture<'static, HandlerResult> {
                async move {
                    $(
                        let $ty = $ty::from_context(&ctx)?;
                    )*

                    (self)($($ty,)*).await.into_reply()
                }
                .boxed()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::extractor::{Json, PathParams};
    use cosy_core::{Container, Request};

    fn context(request: Request) -> Arc<HttpContext> {
        Arc::new(HttpContext::new(request, Arc::new(Container::new())))
    }

    #[tokio::test]
    async fn test_zero_arity_handler() {
        async fn status() -> Json<Value> {
            Json(json!({ "status": "ok" }))
        }

        let reply = Handler::call(status, context(Request::default())).await.unwrap();
        assert_eq!(reply, Reply::Json(json!({ "status": "ok" })));
    }

    #[tokio::test]
    async fn test_extractor_handler() {
        async fn greet(params: PathParams) -> String {
            format!("hello {}", params.get("name").unwrap_or("nobody"))
        }

        let mut request = Request::default();
        request.set_params([("name".to_string(), "ada".to_string())].into());

        let reply = Handler::call(greet, context(request)).await.unwrap();
        assert_eq!(reply, Reply::Html("hello ada".into()));
    }

    #[tokio::test]
    async fn test_extraction_failure_is_an_error() {
        #[derive(serde::Deserialize)]
        struct Body {
            #[allow(dead_code)]
            name: String,
        }

        async fn create(_body: Json<Body>) {}

        let err = Handler::call(create, context(Request::default()))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid request body"));
    }
}
