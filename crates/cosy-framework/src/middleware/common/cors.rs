use std::sync::Arc;

use async_trait::async_trait;

use cosy_core::{Method, StatusCode};

use crate::context::HttpContext;
use crate::handler::{HandlerResult, Reply};
use crate::middleware::{Middleware, Next};

/// Adds CORS headers and answers preflight `OPTIONS` requests with `204`.
///
/// With an allow-list, a listed request `Origin` is echoed back; any other
/// origin gets the first entry. Without one, `*` is sent.
#[derive(Debug, Clone, Default)]
pub struct Cors {
    origins: Vec<String>,
    methods: Vec<String>,
    allowed_headers: Vec<String>,
    credentials: bool,
}

impl Cors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.push(origin.into());
        self
    }

    pub fn allow_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_headers.extend(headers.into_iter().map(Into::into));
        self
    }

    pub fn allow_credentials(mut self, credentials: bool) -> Self {
        self.credentials = credentials;
        self
    }

    fn origin_for(&self, request_origin: Option<&str>) -> String {
        match (self.origins.first(), request_origin) {
            (None, _) => "*".to_string(),
            (Some(_), Some(origin)) if self.origins.iter().any(|o| o == origin) => origin.to_string(),
            (Some(first), _) => first.clone(),
        }
    }
}

#[async_trait]
impl Middleware for Cors {
    async fn handle(&self, ctx: Arc<HttpContext>, next: Next) -> HandlerResult {
        let origin = self.origin_for(ctx.request().header("origin"));
        {
            let mut response = ctx.response();
            response.header("Access-Control-Allow-Origin", origin);
            if !self.origins.is_empty() {
                response.header("Vary", "Origin");
            }
            if !self.methods.is_empty() {
                response.header("Access-Control-Allow-Methods", self.methods.join(", "));
            }
            if !self.allowed_headers.is_empty() {
                response.header("Access-Control-Allow-Headers", self.allowed_headers.join(", "));
            }
            if self.credentials {
                response.header("Access-Control-Allow-Credentials", "true");
            }

            if ctx.request().method() == Method::OPTIONS {
                response.status(StatusCode::NO_CONTENT).send(Vec::new())?;
                return Ok(Reply::Empty);
            }
        }

        next.run(ctx).await
    }

    fn name(&self) -> &str {
        "cors"
    }
}
