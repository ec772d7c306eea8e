use std::sync::Arc;

use tracing::trace;

use super::{BoxedMiddleware, IntoMiddleware, Next};
use crate::context::HttpContext;
use crate::handler::{BoxedEndpoint, Handler, HandlerResult, into_endpoint};

/// An ordered, immutable list of middleware.
///
/// `pipe` and `through` return new pipelines and leave the receiver alone,
/// so a pipeline handed to a running request is never mutated.
#[derive(Clone, Default)]
pub struct Pipeline {
    middleware: Arc<[BoxedMiddleware]>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new pipeline with `middleware` appended.
    pub fn pipe(&self, middleware: impl IntoMiddleware) -> Self {
        self.through([middleware.into_middleware()])
    }

    /// A new pipeline with every entry of `middleware` appended in order.
    pub fn through<I>(&self, middleware: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoMiddleware,
    {
        let chain: Vec<BoxedMiddleware> = self
            .middleware
            .iter()
            .cloned()
            .chain(middleware.into_iter().map(IntoMiddleware::into_middleware))
            .collect();
        Self {
            middleware: chain.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    pub fn middleware(&self) -> &[BoxedMiddleware] {
        &self.middleware
    }

    /// Binds the terminal endpoint.
    pub fn then(&self, endpoint: BoxedEndpoint) -> Chain {
        Chain {
            middleware: self.middleware.clone(),
            endpoint: Some(endpoint),
        }
    }

    /// Binds a handler function as the terminal endpoint.
    pub fn then_handler<H, T>(&self, handler: H) -> Chain
    where
        H: Handler<T>,
        T: 'static,
    {
        self.then(into_endpoint(handler))
    }

    /// Runs the middleware without an endpoint; the innermost step yields an
    /// empty reply.
    pub async fn execute(&self, ctx: Arc<HttpContext>) -> HandlerResult {
        Next::new(self.middleware.clone(), None).run(ctx).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.middleware.iter().map(|m| m.name()))
            .finish()
    }
}

/// A pipeline with its terminal endpoint bound.
#[derive(Clone)]
pub struct Chain {
    middleware: Arc<[BoxedMiddleware]>,
    endpoint: Option<BoxedEndpoint>,
}

impl Chain {
    /// Runs the chain for one request.
    ///
    /// Cancellation is taken from the context's token and checked before
    /// every step.
    pub async fn execute(&self, ctx: Arc<HttpContext>) -> HandlerResult {
        trace!(middleware = self.middleware.len(), "Executing chain");
        Next::new(self.middleware.clone(), self.endpoint.clone())
            .run(ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::{BoxError, DispatchError};
    use crate::handler::Reply;
    use crate::middleware::from_fn;
    use cosy_core::{Container, HttpError, Request};

    type Log = Arc<Mutex<Vec<String>>>;

    fn context() -> Arc<HttpContext> {
        Arc::new(HttpContext::new(Request::default(), Arc::new(Container::new())))
    }

    fn recording(log: &Log, name: &'static str) -> BoxedMiddleware {
        let log = log.clone();
        from_fn(move |ctx, next: Next| {
            let log = log.clone();
            async move {
                log.lock().push(format!("{name}-enter"));
                let reply = next.run(ctx).await;
                log.lock().push(format!("{name}-exit"));
                reply
            }
        })
        .into_middleware()
    }

    fn terminal(log: &Log) -> Chain {
        let log = log.clone();
        Pipeline::new().then_handler(move || {
            let log = log.clone();
            async move {
                log.lock().push("terminal".to_string());
                "done"
            }
        })
    }

    #[tokio::test]
    async fn test_onion_ordering() {
        let log: Log = Arc::default();
        let chain = Pipeline::new()
            .through([recording(&log, "m1"), recording(&log, "m2"), recording(&log, "m3")])
            .then(terminal_endpoint(&log));

        let reply = chain.execute(context()).await.unwrap();
        assert_eq!(reply, Reply::Html("done".into()));
        assert_eq!(
            *log.lock(),
            ["m1-enter", "m2-enter", "m3-enter", "terminal", "m3-exit", "m2-exit", "m1-exit"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let log: Log = Arc::default();
        let blocker = {
            let log = log.clone();
            from_fn(move |ctx: Arc<HttpContext>, _next: Next| {
                let log = log.clone();
                async move {
                    log.lock().push("m2-enter".to_string());
                    ctx.response().json(&json!({ "blocked": true }))?;
                    Ok::<_, BoxError>(Reply::Empty)
                }
            })
        };

        let chain = Pipeline::new()
            .pipe(recording(&log, "m1"))
            .pipe(blocker)
            .pipe(recording(&log, "m3"))
            .then(terminal_endpoint(&log));

        let ctx = context();
        chain.execute(ctx.clone()).await.unwrap();
        assert_eq!(*log.lock(), ["m1-enter", "m2-enter", "m1-exit"]);
        assert!(ctx.response().has_responded());
    }

    #[tokio::test]
    async fn test_error_propagates() {
        let log: Log = Arc::default();
        let failing = from_fn(|_ctx, _next: Next| async move {
            Err::<Reply, BoxError>(HttpError::forbidden("no entry").into())
        });

        let chain = Pipeline::new()
            .pipe(recording(&log, "m1"))
            .pipe(failing)
            .then(terminal_endpoint(&log));

        let err = chain.execute(context()).await.unwrap_err();
        assert_eq!(err.to_string(), "no entry");
        assert_eq!(*log.lock(), ["m1-enter", "m1-exit"]);
    }

    #[tokio::test]
    async fn test_pipe_does_not_mutate() {
        let log: Log = Arc::default();
        let base = Pipeline::new().pipe(recording(&log, "m1"));
        let extended = base.pipe(recording(&log, "m2"));

        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_independent() {
        let log: Log = Arc::default();
        let chain = Arc::new(
            Pipeline::new()
                .through([recording(&log, "a"), recording(&log, "b")])
                .then(terminal_endpoint(&log)),
        );

        let runs = (0..8).map(|_| {
            let chain = chain.clone();
            tokio::spawn(async move { chain.execute(context()).await })
        });
        for run in futures::future::join_all(runs).await {
            assert!(run.unwrap().is_ok());
        }

        let log = log.lock();
        assert_eq!(log.iter().filter(|e| *e == "terminal").count(), 8);
        assert_eq!(log.len(), 8 * 5);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let log: Log = Arc::default();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = Arc::new(
            HttpContext::new(Request::default(), Arc::new(Container::new()))
                .with_cancellation(token),
        );

        let chain = Pipeline::new()
            .pipe(recording(&log, "m1"))
            .then(terminal_endpoint(&log));
        let err = chain.execute(ctx).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DispatchError>(),
            Some(DispatchError::Cancelled)
        ));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_mid_chain() {
        let log: Log = Arc::default();
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            from_fn(move |ctx, next: Next| {
                let token = token.clone();
                async move {
                    token.cancel();
                    next.run(ctx).await
                }
            })
        };
        let ctx = Arc::new(
            HttpContext::new(Request::default(), Arc::new(Container::new()))
                .with_cancellation(token),
        );

        let chain = Pipeline::new()
            .pipe(canceller)
            .pipe(recording(&log, "m2"))
            .then(terminal_endpoint(&log));

        assert!(chain.execute(ctx).await.is_err());
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_execute_without_endpoint() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new().pipe(recording(&log, "m1"));
        assert_eq!(pipeline.execute(context()).await.unwrap(), Reply::Empty);
        assert_eq!(*log.lock(), ["m1-enter", "m1-exit"]);
    }

    fn terminal_endpoint(log: &Log) -> BoxedEndpoint {
        let log = log.clone();
        into_endpoint(move || {
            let log = log.clone();
            async move {
                log.lock().push("terminal".to_string());
                "done"
            }
        })
    }

    #[tokio::test]
    async fn test_then_handler() {
        let log: Log = Arc::default();
        let reply = terminal(&log).execute(context()).await.unwrap();
        assert_eq!(reply, Reply::Html("done".into()));
    }
}
