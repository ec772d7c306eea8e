use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;

use cosy_core::StatusCode;

use crate::context::HttpContext;
use crate::handler::{HandlerResult, Reply};
use crate::middleware::{Middleware, Next};

type KeyFn = Arc<dyn Fn(&HttpContext) -> String + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Per-key windows plus the time of the last sweep for expired ones.
#[derive(Debug, Default)]
struct Windows {
    entries: HashMap<String, Window>,
    swept_at: Option<Instant>,
}

impl Windows {
    /// Drops windows that have reset. Runs at most once per `period` unless
    /// `period` is zero.
    fn sweep(&mut self, now: Instant, period: Duration) {
        if self
            .swept_at
            .is_some_and(|at| now.saturating_duration_since(at) < period)
        {
            return;
        }
        self.entries.retain(|_, w| w.reset_at >= now);
        self.swept_at = Some(now);
    }
}

/// Fixed-window rate limiting, by default 100 requests per 15 minutes per
/// client IP.
///
/// Over the limit the request is answered with `429` and a JSON body carrying
/// `retryAfter` in seconds.
#[derive(Clone)]
pub struct RateLimit {
    max: u32,
    window: Duration,
    message: String,
    key: KeyFn,
    windows: Arc<Mutex<Windows>>,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max: 100,
            window: Duration::from_secs(15 * 60),
            message: "Too many requests".to_string(),
            key: Arc::new(|ctx: &HttpContext| ctx.request().ip().unwrap_or("unknown").to_string()),
            windows: Arc::default(),
        }
    }
}

impl RateLimit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max(mut self, max: u32) -> Self {
        self.max = max;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Groups requests by `key` instead of client IP.
    pub fn key(mut self, key: impl Fn(&HttpContext) -> String + Send + Sync + 'static) -> Self {
        self.key = Arc::new(key);
        self
    }

    /// Counts one hit for `key`. `Err` carries the time until the window
    /// resets; `Ok` carries the hits left.
    ///
    /// Expired windows of other keys are swept once per window length.
    fn hit(&self, key: String, now: Instant) -> Result<u32, Duration> {
        let mut windows = self.windows.lock();
        windows.sweep(now, self.window);
        let window = windows.entries.entry(key).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now > window.reset_at {
            *window = Window {
                count: 0,
                reset_at: now + self.window,
            };
        }
        if window.count >= self.max {
            return Err(window.reset_at.saturating_duration_since(now));
        }
        window.count += 1;
        Ok(self.max - window.count)
    }

    /// Drops windows that have already reset.
    pub fn prune(&self) {
        self.windows.lock().sweep(Instant::now(), Duration::ZERO);
    }
}

/// `duration` rounded up to whole seconds.
fn whole_seconds(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_add(u64::from(duration.subsec_nanos() > 0))
}

#[async_trait]
impl Middleware for RateLimit {
    async fn handle(&self, ctx: Arc<HttpContext>, next: Next) -> HandlerResult {
        let key = (self.key)(ctx.as_ref());
        match self.hit(key.clone(), Instant::now()) {
            Ok(remaining) => {
                ctx.response()
                    .header("X-RateLimit-Limit", self.max.to_string())
                    .header("X-RateLimit-Remaining", remaining.to_string());
                next.run(ctx).await
            }
            Err(reset_in) => {
                let retry_after = whole_seconds(reset_in);
                debug!(key = %key, retry_after, "Rate limit exceeded");
                ctx.response()
                    .status(StatusCode::TOO_MANY_REQUESTS)
                    .header("Retry-After", retry_after.to_string())
                    .json(&json!({ "error": self.message, "retryAfter": retry_after }))?;
                Ok(Reply::Empty)
            }
        }
    }

    fn name(&self) -> &str {
        "rate_limit"
    }
}
