use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::HttpContext;
use crate::handler::HandlerResult;
use crate::middleware::{Middleware, Next};

type SkipFn = Arc<dyn Fn(&HttpContext) -> bool + Send + Sync>;

/// Logs each request when it enters and when it completes, with the elapsed
/// time.
#[derive(Clone, Default)]
pub struct RequestLogger {
    skip: Option<SkipFn>,
    response_time_header: bool,
}

impl RequestLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests for which `skip` returns `true` are not logged.
    pub fn skip(mut self, skip: impl Fn(&HttpContext) -> bool + Send + Sync + 'static) -> Self {
        self.skip = Some(Arc::new(skip));
        self
    }

    /// Also report the elapsed time in an `X-Response-Time` header.
    pub fn response_time_header(mut self, enabled: bool) -> Self {
        self.response_time_header = enabled;
        self
    }
}

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(&self, ctx: Arc<HttpContext>, next: Next) -> HandlerResult {
        if self.skip.as_ref().is_some_and(|skip| skip(ctx.as_ref())) {
            return next.run(ctx).await;
        }

        let start = Instant::now();
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_string();
        info!(
            method = %method,
            path = %path,
            ip = ctx.request().ip().unwrap_or("-"),
            "Request started"
        );

        let result = next.run(ctx.clone()).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                let mut response = ctx.response();
                if self.response_time_header {
                    response.header("X-Response-Time", format!("{}ms", elapsed.as_millis()));
                }
                info!(
                    method = %method,
                    path = %path,
                    status = response.status_code().as_u16(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );
            }
            Err(e) => warn!(
                method = %method,
                path = %path,
                error = %e,
                elapsed_ms = elapsed.as_millis() as u64,
                "Request failed"
            ),
        }

        result
    }

    fn name(&self) -> &str {
        "logger"
    }
}
