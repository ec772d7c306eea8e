use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::context::HttpContext;
use crate::error::{BoxError, error_payload, error_response, status_for};
use crate::handler::{HandlerResult, Reply};
use crate::middleware::{Middleware, Next};

type ReportFn = Arc<dyn Fn(&BoxError, &HttpContext) + Send + Sync>;

/// Turns errors from the rest of the chain into JSON responses so that
/// middleware outside it still see a successful result.
///
/// The status comes from the error (an [`HttpError`](cosy_core::HttpError)
/// keeps its own), the body is `{ "error": message }`, with the cause chain
/// under `details` when `expose_details` is set.
#[derive(Clone, Default)]
pub struct ErrorHandler {
    expose_details: bool,
    reporter: Option<ReportFn>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expose_details(mut self, expose: bool) -> Self {
        self.expose_details = expose;
        self
    }

    /// Replaces the default `tracing` report.
    pub fn report(mut self, reporter: impl Fn(&BoxError, &HttpContext) + Send + Sync + 'static) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }
}

#[async_trait]
impl Middleware for ErrorHandler {
    async fn handle(&self, ctx: Arc<HttpContext>, next: Next) -> HandlerResult {
        let err = match next.run(ctx.clone()).await {
            Ok(reply) => return Ok(reply),
            Err(err) => err,
        };

        match &self.reporter {
            Some(report) => report(&err, ctx.as_ref()),
            None => error!(
                path = ctx.request().path(),
                error = %err,
                "Unhandled error in request chain"
            ),
        }

        let mut response = ctx.response();
        if response.has_responded() {
            *response = error_response(err.as_ref(), self.expose_details);
        } else {
            response
                .status(status_for(err.as_ref()))
                .json(&error_payload(err.as_ref(), self.expose_details))?;
        }
        Ok(Reply::Empty)
    }

    fn name(&self) -> &str {
        "error_handler"
    }
}
