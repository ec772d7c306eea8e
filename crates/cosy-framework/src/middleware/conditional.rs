//! Middleware that only runs when a predicate holds.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{BoxedMiddleware, IntoMiddleware, Middleware, Next};
use crate::context::HttpContext;
use crate::handler::HandlerResult;

/// Wraps a middleware behind a predicate. When the predicate does not
/// select the request, the wrapped middleware is skipped and the chain
/// continues.
pub struct When<P> {
    predicate: P,
    inner: BoxedMiddleware,
    negate: bool,
}

impl<P> When<P>
where
    P: Fn(&HttpContext) -> bool + Send + Sync + 'static,
{
    fn selects(&self, ctx: &HttpContext) -> bool {
        (self.predicate)(ctx) != self.negate
    }
}

#[async_trait]
impl<P> Middleware for When<P>
where
    P: Fn(&HttpContext) -> bool + Send + Sync + 'static,
{
    async fn handle(&self, ctx: Arc<HttpContext>, next: Next) -> HandlerResult {
        if self.selects(&ctx) {
            self.inner.handle(ctx, next).await
        } else {
            next.run(ctx).await
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Runs `middleware` only when `predicate` returns `true`.
pub fn when<P>(predicate: P, middleware: impl IntoMiddleware) -> When<P>
where
    P: Fn(&HttpContext) -> bool + Send + Sync + 'static,
{
    When {
        predicate,
        inner: middleware.into_middleware(),
        negate: false,
    }
}

/// Runs `middleware` only when `predicate` returns `false`.
pub fn unless<P>(predicate: P, middleware: impl IntoMiddleware) -> When<P>
where
    P: Fn(&HttpContext) -> bool + Send + Sync + 'static,
{
    When {
        predicate,
        inner: middleware.into_middleware(),
        negate: true,
    }
}

/// How [`when_path`] compares the request path.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// The path must equal this string.
    Exact(String),
    /// The path must match this pattern somewhere.
    Pattern(Regex),
}

impl PathMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(expected) => path == expected,
            Self::Pattern(re) => re.is_match(path),
        }
    }
}

impl From<&str> for PathMatcher {
    fn from(path: &str) -> Self {
        Self::Exact(path.to_string())
    }
}

impl From<String> for PathMatcher {
    fn from(path: String) -> Self {
        Self::Exact(path)
    }
}

impl From<Regex> for PathMatcher {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

/// Runs `middleware` for requests whose path matches `matcher`.
pub fn when_path(
    matcher: impl Into<PathMatcher>,
    middleware: impl IntoMiddleware,
) -> When<impl Fn(&HttpContext) -> bool + Send + Sync + 'static> {
    let matcher = matcher.into();
    when(move |ctx: &HttpContext| matcher.matches(ctx.request().path()), middleware)
}

/// Runs `middleware` for requests using one of `methods`. Method names are
/// compared case-insensitively.
pub fn when_method<I, S>(
    methods: I,
    middleware: impl IntoMiddleware,
) -> When<impl Fn(&HttpContext) -> bool + Send + Sync + 'static>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let methods: Vec<String> = methods
        .into_iter()
        .map(|m| m.as_ref().to_ascii_uppercase())
        .collect();
    when(
        move |ctx: &HttpContext| methods.iter().any(|m| m == ctx.request().method().as_str()),
        middleware,
    )
}

/// Runs `middleware` when header `name` is present, or when it equals
/// `value` if one is given.
pub fn when_header(
    name: impl Into<String>,
    value: Option<&str>,
    middleware: impl IntoMiddleware,
) -> When<impl Fn(&HttpContext) -> bool + Send + Sync + 'static> {
    let name = name.into();
    let value = value.map(str::to_string);
    when(
        move |ctx: &HttpContext| match (ctx.request().header(&name), &value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        },
        middleware,
    )
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::middleware::{Pipeline, from_fn};
    use cosy_core::{Container, Request};

    fn counter(hits: &Arc<Mutex<u32>>) -> BoxedMiddleware {
        let hits = hits.clone();
        from_fn(move |ctx, next: Next| {
            let hits = hits.clone();
            async move {
                *hits.lock() += 1;
                next.run(ctx).await
            }
        })
        .into_middleware()
    }

    async fn run(pipeline: &Pipeline, request: Request) {
        let ctx = Arc::new(HttpContext::new(request, Arc::new(Container::new())));
        pipeline.execute(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_when_and_unless() {
        let hits = Arc::new(Mutex::new(0));
        let pipeline = Pipeline::new()
            .pipe(when(|ctx: &HttpContext| ctx.request().is_ajax(), counter(&hits)))
            .pipe(unless(|ctx: &HttpContext| ctx.request().is_ajax(), counter(&hits)));

        run(&pipeline, Request::default()).await;
        assert_eq!(*hits.lock(), 1);
    }

    #[tokio::test]
    async fn test_when_path_exact_and_pattern() {
        let hits = Arc::new(Mutex::new(0));
        let pipeline = Pipeline::new()
            .pipe(when_path("/admin", counter(&hits)))
            .pipe(when_path(Regex::new("^/api/").unwrap(), counter(&hits)));

        run(&pipeline, Request::builder().url("/admin").build()).await;
        run(&pipeline, Request::builder().url("/admin/users").build()).await;
        run(&pipeline, Request::builder().url("/api/status").build()).await;
        assert_eq!(*hits.lock(), 2);
    }

    #[tokio::test]
    async fn test_when_method() {
        let hits = Arc::new(Mutex::new(0));
        let pipeline = Pipeline::new().pipe(when_method(["post", "PUT"], counter(&hits)));

        run(&pipeline, Request::builder().method("GET").build()).await;
        run(&pipeline, Request::builder().method("POST").build()).await;
        run(&pipeline, Request::builder().method("PUT").build()).await;
        assert_eq!(*hits.lock(), 2);
    }

    #[tokio::test]
    async fn test_when_header() {
        let hits = Arc::new(Mutex::new(0));
        let pipeline = Pipeline::new()
            .pipe(when_header("X-Debug", None, counter(&hits)))
            .pipe(when_header("X-Mode", Some("strict"), counter(&hits)));

        run(&pipeline, Request::builder().header("X-Debug", "1").build()).await;
        run(&pipeline, Request::builder().header("X-Mode", "lax").build()).await;
        run(&pipeline, Request::builder().header("X-Mode", "strict").build()).await;
        assert_eq!(*hits.lock(), 2);
    }
}
