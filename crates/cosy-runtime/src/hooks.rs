//! Lifecycle hooks.
//!
//! Hooks are async callbacks run at fixed points of the application
//! lifecycle, in registration order. The first failing hook aborts the phase.
//!
//! ```rust,ignore
//! app.on(LifecycleHook::AfterStart, || async {
//!     tracing::info!("warming caches");
//!     Ok(())
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use cosy_framework::BoxError;

use crate::error::{ApplicationError, ApplicationResult};

/// Points in the lifecycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    BeforeBoot,
    AfterBoot,
    BeforeStart,
    AfterStart,
    BeforeStop,
    AfterStop,
}

impl LifecycleHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeBoot => "before_boot",
            Self::AfterBoot => "after_boot",
            Self::BeforeStart => "before_start",
            Self::AfterStart => "after_start",
            Self::BeforeStop => "before_stop",
            Self::AfterStop => "after_stop",
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type-erased hook callback.
pub type HookFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Hooks grouped by lifecycle point.
#[derive(Default, Clone)]
pub struct Hooks {
    hooks: HashMap<LifecycleHook, Vec<HookFn>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` to run at `point`.
    pub fn on<F, Fut>(&mut self, point: LifecycleHook, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let hook: HookFn = Arc::new(move || hook().boxed());
        self.hooks.entry(point).or_default().push(hook);
    }

    pub fn count(&self, point: LifecycleHook) -> usize {
        self.hooks.get(&point).map_or(0, Vec::len)
    }

    /// Runs every hook registered for `point`, stopping at the first error.
    pub async fn run(&self, point: LifecycleHook) -> ApplicationResult<()> {
        let Some(hooks) = self.hooks.get(&point) else {
            return Ok(());
        };

        debug!(hook = %point, count = hooks.len(), "Running lifecycle hooks");
        for hook in hooks {
            hook()
                .await
                .map_err(|source| ApplicationError::Hook { hook: point, source })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.hooks.iter().map(|(point, hooks)| (point, hooks.len())))
            .finish()
    }
}
