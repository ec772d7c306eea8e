use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tracing::debug;

use cosy_core::StatusCode;

use crate::context::HttpContext;
use crate::error::BoxError;
use crate::handler::{HandlerResult, Reply};
use crate::middleware::{Middleware, Next};

type Validator = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// Whatever the token validator returned, stored in the request state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser(pub Value);

/// Requires an authorization header, optionally checking its token.
///
/// A `Bearer ` prefix is stripped before validation. Requests without the
/// header, or whose token the validator rejects, get a `401` JSON response.
/// On success the validator's value is available as [`AuthenticatedUser`].
#[derive(Clone)]
pub struct BearerAuth {
    header: String,
    validator: Option<Validator>,
}

impl Default for BearerAuth {
    fn default() -> Self {
        Self {
            header: "authorization".to_string(),
            validator: None,
        }
    }
}

impl BearerAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the token from `header` instead of `Authorization`.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn validate<F, Fut>(mut self, validator: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.validator = Some(Arc::new(move |token| validator(token).boxed()));
        self
    }

    fn reject(ctx: &HttpContext, message: &str) -> HandlerResult {
        ctx.response()
            .status(StatusCode::UNAUTHORIZED)
            .json(&json!({ "error": message }))?;
        Ok(Reply::Empty)
    }
}

#[async_trait]
impl Middleware for BearerAuth {
    async fn handle(&self, ctx: Arc<HttpContext>, next: Next) -> HandlerResult {
        let Some(raw) = ctx.request().header(&self.header).map(str::to_string) else {
            return Self::reject(&ctx, "Authorization header required");
        };
        let token = raw.strip_prefix("Bearer ").unwrap_or(&raw).to_string();

        if let Some(validator) = &self.validator {
            match validator(token).await {
                Ok(user) => ctx.set_state(AuthenticatedUser(user)),
                Err(e) => {
                    debug!(error = %e, "Rejected authentication token");
                    return Self::reject(&ctx, "Invalid authentication token");
                }
            }
        }

        next.run(ctx).await
    }

    fn name(&self) -> &str {
        "auth"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::State;
    use crate::middleware::Pipeline;
    use cosy_core::{Container, Request};

    fn guarded() -> crate::middleware::Chain {
        let auth = BearerAuth::new().validate(|token: String| async move {
            if token == "secret" {
                Ok::<_, BoxError>(json!({ "id": 1 }))
            } else {
                Err("bad token".into())
            }
        });
        Pipeline::new()
            .pipe(auth)
            .then_handler(|user: State<AuthenticatedUser>| async move { user.0.0.clone() })
    }

    async fn run(request: Request) -> (Reply, Arc<HttpContext>) {
        let ctx = Arc::new(HttpContext::new(request, Arc::new(Container::new())));
        let reply = guarded().execute(ctx.clone()).await.unwrap();
        (reply, ctx)
    }

    #[tokio::test]
    async fn test_missing_header() {
        let (reply, ctx) = run(Request::default()).await;
        assert_eq!(reply, Reply::Empty);
        let response = ctx.response();
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json_body::<Value>().unwrap(),
            json!({ "error": "Authorization header required" })
        );
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let request = Request::builder().header("Authorization", "Bearer nope").build();
        let (_, ctx) = run(request).await;
        assert_eq!(
            ctx.response().json_body::<Value>().unwrap(),
            json!({ "error": "Invalid authentication token" })
        );
    }

    #[tokio::test]
    async fn test_valid_token_exposes_user() {
        let request = Request::builder().header("Authorization", "Bearer secret").build();
        let (reply, ctx) = run(request).await;
        assert_eq!(reply, Reply::Json(json!({ "id": 1 })));
        assert!(!ctx.response().has_responded());
    }
}
