//! The application façade.
//!
//! [`Application`] owns the container, the router and the middleware
//! registry, runs service providers through their register/boot phases, and
//! answers requests either directly through [`Application::handle`] or via
//! the HTTP listener started by [`Application::start`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cosy_runtime::Application;
//!
//! // Loads cosy.toml from the current directory, COSY_* env vars on top
//! let mut app = Application::new();
//!
//! app.get("/api/status", || async { Json(json!({ "status": "ok" })) })?;
//! app.use_middleware(RequestLogger::new());
//!
//! Arc::new(app).run(None).await?;
//! ```
//!
//! Registration needs `&mut Application`; once the application is shared
//! behind an `Arc` its routes and middleware are frozen.

use std::error::Error as StdError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tokio::signal;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use cosy_core::{
    BoxedRequestHandler, Container, Injectable, Method, Params, Request, RequestHandler, Response,
    StatusCode, Token,
};
use cosy_framework::{
    BoxError, BoxedEndpoint, BoxedMiddleware, DispatchError, GroupOptions, HttpContext,
    IntoMiddleware, MiddlewareRegistry, Pipeline, Route, RouteGroup, RouteMiddleware,
    RouteRegistrar, RouteResult, Router, ServiceProvider, error_response,
};
use cosy_transport::{HttpServer, ServerHandle};

use crate::config::{Config, ConfigLoader, CosyConfig};
use crate::error::{ApplicationError, ApplicationResult};
use crate::hooks::{Hooks, LifecycleHook};
use crate::logging;

struct ProviderEntry {
    provider: Arc<dyn ServiceProvider>,
    booted: AtomicBool,
}

/// A Cosy web application.
///
/// # Simple Usage
///
/// ```rust,ignore
/// let mut app = Application::new();
/// app.register(DatabaseProvider)?;
/// app.get("/users/:id", show_user)?.name("users.show");
///
/// let app = Arc::new(app);
/// app.start(Some(8080)).await?;
/// ```
///
/// # Dispatch without a listener
///
/// ```rust,ignore
/// let response = app.handle(Request::builder().url("/api/status").build()).await;
/// assert_eq!(response.status_code(), StatusCode::OK);
/// ```
pub struct Application {
    /// Typed settings the application was built from.
    settings: CosyConfig,
    /// Runtime view of the settings, also bound as `"config"`.
    config: Arc<Config>,
    container: Arc<Container>,
    router: Router,
    middleware: MiddlewareRegistry,
    providers: Vec<ProviderEntry>,
    hooks: Hooks,
    booted: AtomicBool,
    /// Serializes concurrent `boot` calls.
    boot_lock: Mutex<()>,
    server: Mutex<Option<ServerHandle>>,
    running: AtomicBool,
}

impl Application {
    /// Creates an application with automatic configuration loading.
    ///
    /// Searches the current directory for `cosy.toml`, applies `COSY_*`
    /// environment variables and initializes logging. Falls back to defaults
    /// when loading fails.
    pub fn new() -> Self {
        let settings = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                CosyConfig::default()
            });

        Self::from_config(&settings)
    }

    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Creates an application from loaded settings and initializes logging
    /// from them.
    pub fn from_config(settings: &CosyConfig) -> Self {
        logging::init_from_config(&settings.logging);

        info!(
            app = %settings.app.name,
            env = %settings.app.env,
            log_level = %settings.logging.level,
            "Application initialized from configuration"
        );

        Self::with_settings(settings.clone())
    }

    /// Creates an application without touching the global logger.
    pub fn with_settings(settings: CosyConfig) -> Self {
        let config = Config::from_settings(&settings).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to expose settings through the config repository");
            Config::new()
        });
        let config = Arc::new(config);

        let container = Arc::new(Container::new());
        container.instance_arc("config", config.clone());
        container.instance(Token::of::<CosyConfig>(), settings.clone());

        Self {
            settings,
            config,
            container,
            router: Router::new(),
            middleware: MiddlewareRegistry::new(),
            providers: Vec::new(),
            hooks: Hooks::new(),
            booted: AtomicBool::new(false),
            boot_lock: Mutex::new(()),
            server: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &CosyConfig {
        &self.settings
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.middleware
    }

    /// Whether error responses carry details, read from `app.debug` on every
    /// call so it can be flipped at runtime.
    pub fn is_debug(&self) -> bool {
        self.config
            .get_as::<bool>("app.debug")
            .ok()
            .flatten()
            .unwrap_or(self.settings.app.debug)
    }

    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Registers a transient binding.
    pub fn bind<T: Injectable>(&self, token: impl Into<Token>) -> &Self {
        self.container.bind::<T>(token);
        self
    }

    /// Registers a singleton binding.
    pub fn singleton<T: Injectable>(&self, token: impl Into<Token>) -> &Self {
        self.container.singleton::<T>(token);
        self
    }

    /// Stores an already-built instance.
    pub fn instance<T: Send + Sync + 'static>(&self, token: impl Into<Token>, value: T) -> &Self {
        self.container.instance(token, value);
        self
    }

    /// Adds a service provider.
    ///
    /// The provider's `register` and `routes` run immediately; its `boot`
    /// runs on the next [`boot`](Self::boot).
    pub fn register(&mut self, provider: impl ServiceProvider) -> ApplicationResult<&mut Self> {
        let provider: Arc<dyn ServiceProvider> = Arc::new(provider);
        debug!(provider = provider.name(), "Registering service provider");

        provider.register(&self.container);
        provider.routes(&mut self.router)?;

        if self.is_booted() {
            debug!(
                provider = provider.name(),
                "Application already booted, provider boots on the next boot call"
            );
            *self.booted.get_mut() = false;
        }

        self.providers.push(ProviderEntry {
            provider,
            booted: AtomicBool::new(false),
        });
        Ok(self)
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    // =========================================================================
    // Middleware
    // =========================================================================

    /// Appends a global middleware, run for every matched route before the
    /// route's own middleware.
    pub fn use_middleware(&mut self, middleware: impl IntoMiddleware) -> &mut Self {
        self.middleware.global(middleware);
        self
    }

    /// Registers a middleware under a name routes can refer to.
    pub fn alias_middleware(
        &mut self,
        name: impl Into<String>,
        middleware: impl IntoMiddleware,
    ) -> &mut Self {
        self.middleware.register(name, middleware);
        self
    }

    /// Defines a named middleware group.
    pub fn middleware_group<I>(
        &mut self,
        name: impl Into<String>,
        entries: I,
    ) -> ApplicationResult<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<RouteMiddleware>,
    {
        self.middleware.group(name, entries)?;
        Ok(self)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Registers a lifecycle hook.
    pub fn on<F, Fut>(&mut self, point: LifecycleHook, hook: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.hooks.on(point, hook);
        self
    }

    /// Boots every provider that has not booted yet, in registration order.
    ///
    /// A no-op once everything is booted.
    pub async fn boot(&self) -> ApplicationResult<()> {
        if self.is_booted() {
            return Ok(());
        }
        let _guard = self.boot_lock.lock().await;
        if self.is_booted() {
            return Ok(());
        }

        self.hooks.run(LifecycleHook::BeforeBoot).await?;

        for entry in &self.providers {
            if entry.booted.load(Ordering::Acquire) {
                continue;
            }
            let name = entry.provider.name();
            debug!(provider = name, "Booting provider");
            entry
                .provider
                .boot(&self.container)
                .await
                .map_err(|source| ApplicationError::Boot {
                    provider: name.to_string(),
                    source,
                })?;
            entry.booted.store(true, Ordering::Release);
        }

        self.booted.store(true, Ordering::Release);
        self.hooks.run(LifecycleHook::AfterBoot).await?;

        info!(providers = self.providers.len(), "Application booted");
        Ok(())
    }

    /// Boots if needed and starts the HTTP listener on `app.host` and `port`
    /// (`app.port` when `None`). Returns the bound address.
    pub async fn start(self: &Arc<Self>, port: Option<u16>) -> ApplicationResult<SocketAddr> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Err(ApplicationError::AlreadyRunning);
        }

        self.boot().await?;
        self.hooks.run(LifecycleHook::BeforeStart).await?;

        let addr = format!(
            "{}:{}",
            self.settings.app.host,
            port.unwrap_or(self.settings.app.port)
        );
        let handler: BoxedRequestHandler = self.clone();
        let handle = HttpServer::new(handler).bind(&addr).await?;
        let local_addr = handle.local_addr();

        *server = Some(handle);
        self.running.store(true, Ordering::Release);
        drop(server);

        info!(addr = %local_addr, app = %self.settings.app.name, "Application started");
        if let Err(e) = self.hooks.run(LifecycleHook::AfterStart).await {
            warn!(error = %e, "Start aborted, closing the listener");
            let handle = self.server.lock().await.take();
            if let Some(handle) = handle {
                handle.shutdown().await;
            }
            self.running.store(false, Ordering::Release);
            return Err(e);
        }

        Ok(local_addr)
    }

    /// The listener's address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(ServerHandle::local_addr)
    }

    /// Stops the listener and shuts providers down in reverse registration
    /// order. Does nothing when not running.
    pub async fn stop(&self) -> ApplicationResult<()> {
        let mut server = self.server.lock().await;
        if server.is_none() {
            warn!("Application is not running");
            return Ok(());
        }

        self.hooks.run(LifecycleHook::BeforeStop).await?;

        info!("Stopping application");
        if let Some(handle) = server.take() {
            handle.shutdown().await;
        }
        self.running.store(false, Ordering::Release);
        drop(server);

        for entry in self.providers.iter().rev() {
            if let Err(e) = entry.provider.shutdown(&self.container).await {
                error!(provider = entry.provider.name(), error = %e, "Error during provider shutdown");
            }
        }

        self.hooks.run(LifecycleHook::AfterStop).await?;
        info!("Application stopped");
        Ok(())
    }

    /// Starts and serves until Ctrl+C or SIGTERM.
    pub async fn run(self: &Arc<Self>, port: Option<u16>) -> ApplicationResult<()> {
        let addr = self.start(port).await?;
        info!(%addr, "Cosy application is now running. Press Ctrl+C to stop.");

        wait_for_shutdown().await;

        self.stop().await
    }

    /// Starts and serves until `shutdown` resolves.
    pub async fn run_until<F>(self: &Arc<Self>, port: Option<u16>, shutdown: F) -> ApplicationResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start(port).await?;

        shutdown.await;

        self.stop().await
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches one request.
    pub async fn handle(&self, request: Request) -> Response {
        self.handle_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Dispatches one request, giving up with a 503 once `cancellation` fires
    /// at a middleware boundary.
    ///
    /// Always produces a response: unmatched routes get a 404 without running
    /// any middleware, and errors from the chain are rendered with
    /// [`error_response`].
    pub async fn handle_with_cancellation(
        &self,
        request: Request,
        cancellation: CancellationToken,
    ) -> Response {
        let span = info_span!(
            "dispatch",
            method = %request.method(),
            path = %request.path()
        );
        self.dispatch(request, cancellation).instrument(span).await
    }

    async fn dispatch(&self, mut request: Request, cancellation: CancellationToken) -> Response {
        let started = Instant::now();

        let Some(matched) =
            self.router
                .resolve_for_host(request.method(), request.header("host"), request.path())
        else {
            debug!("No route matched");
            return route_not_found(&request);
        };

        request.set_params(matched.params);
        let route = matched.route;

        let middleware = match self.middleware_for(route) {
            Ok(middleware) => middleware,
            Err(e) => {
                error!(error = %e, route = route.path(), "Failed to resolve route middleware");
                return self.render_error(&e);
            }
        };

        let ctx = Arc::new(
            HttpContext::new(request, self.container.clone()).with_cancellation(cancellation),
        );
        let response = match run_chain(middleware, route.endpoint().clone(), ctx.clone()).await {
            Ok(response) => response,
            Err(e) => {
                match e.downcast_ref::<DispatchError>() {
                    Some(DispatchError::Cancelled) => debug!("Request cancelled"),
                    _ => error!(error = %e, "Request failed"),
                }
                self.render_error(e.as_ref())
            }
        };

        debug!(
            status = response.status_code().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }

    /// Global middleware first, then the route's own (names expanded).
    fn middleware_for(
        &self,
        route: &Route,
    ) -> Result<Vec<BoxedMiddleware>, DispatchError> {
        let mut middleware = self.middleware.global_middleware().to_vec();
        middleware.extend(self.middleware.resolve_all(route.route_middleware())?);
        Ok(middleware)
    }

    fn render_error(&self, error: &(dyn StdError + 'static)) -> Response {
        error_response(error, self.is_debug())
    }

    /// URL of a named route.
    pub fn url(&self, name: &str, params: &Params) -> RouteResult<String> {
        self.router.url(name, params)
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.settings.app.name)
            .field("routes", &self.router.len())
            .field("middleware", &self.middleware)
            .field("providers", &self.providers.len())
            .field("hooks", &self.hooks)
            .field("booted", &self.is_booted())
            .field("running", &self.is_running())
            .finish()
    }
}

impl RouteRegistrar for Application {
    fn add_route(
        &mut self,
        methods: Vec<Method>,
        path: &str,
        endpoint: BoxedEndpoint,
    ) -> RouteResult<&mut Route> {
        self.router.add_route(methods, path, endpoint)
    }

    fn group<F>(&mut self, options: impl Into<GroupOptions>, routes: F) -> RouteResult<()>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> RouteResult<()>,
    {
        self.router.group(options, routes)
    }
}

#[async_trait]
impl RequestHandler for Application {
    async fn handle_request(&self, request: Request, cancellation: CancellationToken) -> Response {
        self.handle_with_cancellation(request, cancellation).await
    }
}

/// Runs the chain and merges the handler's reply into the context response.
async fn run_chain(
    middleware: Vec<BoxedMiddleware>,
    endpoint: BoxedEndpoint,
    ctx: Arc<HttpContext>,
) -> Result<Response, BoxError> {
    let reply = Pipeline::new()
        .through(middleware)
        .then(endpoint)
        .execute(ctx.clone())
        .await?;

    let mut response = ctx.take_response();
    if !response.has_responded() && !reply.is_empty() {
        reply.apply(&mut response)?;
    }
    Ok(response)
}

fn route_not_found(request: &Request) -> Response {
    let mut response = Response::new();
    response.status(StatusCode::NOT_FOUND);
    let body = json!({
        "error": "Route not found",
        "path": request.path(),
        "method": request.method().as_str(),
    });
    if let Err(e) = response.json(&body) {
        warn!(error = %e, "Failed to render 404 response");
    }
    response
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// ApplicationBuilder
// =============================================================================

/// Builder for an [`Application`] with custom configuration loading.
///
/// ```rust,ignore
/// let app = Application::builder()
///     .config_file("config/production.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct ApplicationBuilder {
    config_loader: ConfigLoader,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges settings programmatically, over files and environment.
    pub fn merge(mut self, config: CosyConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads and validates the configuration, then builds the application.
    pub fn build(self) -> ApplicationResult<Application> {
        let settings = self.config_loader.load()?;
        Ok(Application::from_config(&settings))
    }
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;
    use cosy_core::{Arguments, ContainerResult, Dependency, HttpError};
    use cosy_framework::{Inject, Json, Next, PathParams, Reply, from_fn};

    type Log = Arc<Mutex<Vec<String>>>;

    fn app() -> Application {
        let mut settings = CosyConfig::default();
        settings.app.host = "127.0.0.1".to_string();
        Application::with_settings(settings)
    }

    fn get(path: &str) -> Request {
        Request::builder().method("GET").url(path).build()
    }

    fn recording(log: &Log, name: &'static str) -> BoxedMiddleware {
        let log = log.clone();
        from_fn(move |ctx, next: Next| {
            let log = log.clone();
            async move {
                log.lock().push(name.to_string());
                next.run(ctx).await
            }
        })
        .into_middleware()
    }

    fn body(response: &Response) -> Value {
        response.json_body().unwrap()
    }

    #[tokio::test]
    async fn test_status_scenario() {
        let mut app = app();
        app.get("/api/status", || async { Json(json!({ "status": "ok" })) })
            .unwrap();

        let m1 = from_fn(|ctx: Arc<HttpContext>, next: Next| async move {
            ctx.response().header("X-Test", "1");
            next.run(ctx).await
        });
        let m2 = from_fn(|ctx, next: Next| async move { next.run(ctx).await });
        app.use_middleware(m1).use_middleware(m2);

        let response = app.handle(get("/api/status")).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.get_header("X-Test"), Some("1"));
        assert_eq!(body(&response), json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_unmatched_route_skips_middleware() {
        let log: Log = Arc::default();
        let mut app = app();
        app.use_middleware(recording(&log, "global"));
        app.get("/known", || async { "ok" }).unwrap();

        let response = app.handle(get("/unknown")).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            body(&response),
            json!({ "error": "Route not found", "path": "/unknown", "method": "GET" })
        );
        assert!(log.lock().is_empty());

        // Method mismatch is a miss too.
        let response = app
            .handle(Request::builder().method("POST").url("/known").build())
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_global_before_route_middleware() {
        let log: Log = Arc::default();
        let mut app = app();
        app.use_middleware(recording(&log, "global"));
        app.alias_middleware("auth", recording(&log, "auth"));
        app.alias_middleware("throttle", recording(&log, "throttle"));
        app.middleware_group("api", ["auth", "throttle"]).unwrap();

        app.group(GroupOptions::new().prefix("/api").middleware_named("api"), |api| {
            api.get("/users", || async { "users" })?
                .middleware(recording(&log, "route"));
            Ok(())
        })
        .unwrap();

        let response = app.handle(get("/api/users")).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "users");
        assert_eq!(*log.lock(), ["global", "auth", "throttle", "route"]);
    }

    #[tokio::test]
    async fn test_unknown_named_middleware_is_500() {
        let mut app = app();
        app.get("/", || async { "home" })
            .unwrap()
            .middleware_named("missing");

        let response = app.handle(get("/")).await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_params_reach_handler() {
        let mut app = app();
        app.get("/users/:id?", |PathParams(params): PathParams| async move {
            Json(json!({ "id": params.get("id").cloned() }))
        })
        .unwrap();

        let response = app.handle(get("/users/42")).await;
        assert_eq!(body(&response), json!({ "id": "42" }));

        let response = app.handle(get("/users")).await;
        assert_eq!(body(&response), json!({ "id": null }));
    }

    #[tokio::test]
    async fn test_handler_errors_become_responses() {
        let mut app = app();
        app.get("/boom", || async { Err::<(), BoxError>("database exploded".into()) })
            .unwrap();
        app.get("/teapot", || async {
            Err::<(), _>(HttpError::new(StatusCode::IM_A_TEAPOT, "short and stout"))
        })
        .unwrap();

        let response = app.handle(get("/boom")).await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&response), json!({ "error": "Internal Server Error" }));

        let response = app.handle(get("/teapot")).await;
        assert_eq!(response.status_code(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body(&response), json!({ "error": "short and stout" }));

        // Still serving after failures.
        let response = app.handle(get("/teapot")).await;
        assert_eq!(response.status_code(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_debug_exposes_details() {
        let mut app = app();
        app.get("/boom", || async { Err::<(), BoxError>("database exploded".into()) })
            .unwrap();

        app.config().set("app.debug", true);
        let response = app.handle(get("/boom")).await;
        assert_eq!(
            body(&response),
            json!({ "error": "database exploded", "details": [] })
        );
    }

    #[tokio::test]
    async fn test_cancelled_request_is_503() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut app = app();
        {
            let ran = ran.clone();
            app.get("/slow", move || {
                let ran = ran.clone();
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    "done"
                }
            })
            .unwrap();
        }

        let token = CancellationToken::new();
        token.cancel();
        let response = app.handle_with_cancellation(get("/slow"), token).await;

        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reply_not_applied_after_response_sent() {
        let mut app = app();
        app.get("/manual", |ctx: Arc<HttpContext>| async move {
            ctx.response().status(StatusCode::CREATED).json(&json!({ "manual": true }))?;
            Ok::<_, BoxError>(Reply::Html("ignored".into()))
        })
        .unwrap();

        let response = app.handle(get("/manual")).await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert_eq!(body(&response), json!({ "manual": true }));
    }

    #[tokio::test]
    async fn test_short_circuit_middleware() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut app = app();
        app.use_middleware(from_fn(|ctx: Arc<HttpContext>, _next: Next| async move {
            ctx.response()
                .status(StatusCode::UNAUTHORIZED)
                .json(&json!({ "error": "denied" }))?;
            Ok::<_, BoxError>(Reply::Empty)
        }));
        {
            let ran = ran.clone();
            app.get("/secret", move || {
                let ran = ran.clone();
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    "secret"
                }
            })
            .unwrap();
        }

        let response = app.handle(get("/secret")).await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    // ─── Providers and lifecycle ───────────────────────────────────────────

    struct Greeter {
        greeting: Arc<String>,
    }

    impl Injectable for Greeter {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::token("greeting")]
        }

        fn construct(mut args: Arguments) -> ContainerResult<Self> {
            Ok(Self {
                greeting: args.take::<String>()?,
            })
        }
    }

    struct GreeterProvider {
        log: Log,
    }

    #[async_trait]
    impl ServiceProvider for GreeterProvider {
        fn name(&self) -> &str {
            "greeter"
        }

        fn register(&self, container: &Container) {
            self.log.lock().push("register".into());
            container.instance("greeting", "hello".to_string());
            container.singleton::<Greeter>(Token::of::<Greeter>());
        }

        fn routes(&self, router: &mut Router) -> RouteResult<()> {
            router.get("/greet", |Inject(greeter): Inject<Greeter>| async move {
                greeter.greeting.to_string()
            })?;
            Ok(())
        }

        async fn boot(&self, container: &Container) -> Result<(), BoxError> {
            container.resolve::<Greeter>(Token::of::<Greeter>())?;
            self.log.lock().push("boot".into());
            Ok(())
        }

        async fn shutdown(&self, _container: &Container) -> Result<(), BoxError> {
            self.log.lock().push("shutdown".into());
            Ok(())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ServiceProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn register(&self, _container: &Container) {}

        async fn boot(&self, _container: &Container) -> Result<(), BoxError> {
            Err("no database".into())
        }
    }

    #[tokio::test]
    async fn test_boot_is_idempotent() {
        let log: Log = Arc::default();
        let mut app = app();
        app.register(GreeterProvider { log: log.clone() }).unwrap();
        for point in [LifecycleHook::BeforeBoot, LifecycleHook::AfterBoot] {
            let log = log.clone();
            app.on(point, move || {
                let log = log.clone();
                async move {
                    log.lock().push(point.to_string());
                    Ok(())
                }
            });
        }

        assert_eq!(*log.lock(), ["register"]);
        app.boot().await.unwrap();
        app.boot().await.unwrap();

        assert!(app.is_booted());
        assert_eq!(*log.lock(), ["register", "before_boot", "boot", "after_boot"]);
    }

    #[tokio::test]
    async fn test_provider_services_and_routes() {
        let mut app = app();
        app.register(GreeterProvider { log: Log::default() }).unwrap();
        app.boot().await.unwrap();

        assert!(app.container().has(Token::of::<Greeter>()));
        let response = app.handle(get("/greet")).await;
        assert_eq!(response.text(), "hello");
    }

    #[tokio::test]
    async fn test_provider_registered_after_boot_boots_later() {
        let log: Log = Arc::default();
        let mut app = app();
        app.boot().await.unwrap();

        app.register(GreeterProvider { log: log.clone() }).unwrap();
        assert!(!app.is_booted());
        app.boot().await.unwrap();
        assert_eq!(*log.lock(), ["register", "boot"]);
    }

    #[tokio::test]
    async fn test_boot_failure_names_provider() {
        let mut app = app();
        app.register(FailingProvider).unwrap();

        let err = app.boot().await.unwrap_err();
        assert!(matches!(err, ApplicationError::Boot { ref provider, .. } if provider == "failing"));
        assert!(!app.is_booted());
    }

    #[tokio::test]
    async fn test_config_bound_in_container() {
        let app = app();
        let config = app.container().resolve::<Config>("config").unwrap();
        assert_eq!(config.get("app.port"), Some(json!(3000)));
        assert!(app.container().has(Token::of::<CosyConfig>()));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let log: Log = Arc::default();
        let mut app = app();
        app.register(GreeterProvider { log: log.clone() }).unwrap();
        let app = Arc::new(app);

        let addr = app.start(Some(0)).await.unwrap();
        assert!(app.is_running());
        assert_eq!(app.local_addr().await, Some(addr));
        assert!(matches!(
            app.start(Some(0)).await,
            Err(ApplicationError::AlreadyRunning)
        ));

        app.stop().await.unwrap();
        assert!(!app.is_running());
        assert_eq!(app.local_addr().await, None);
        assert_eq!(*log.lock(), ["register", "boot", "shutdown"]);

        // Stopping again is a no-op.
        app.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_after_start_hook_closes_listener() {
        let mut app = app();
        app.on(LifecycleHook::AfterStart, || async { Err("cache warmup failed".into()) });
        let app = Arc::new(app);

        let err = app.start(Some(0)).await.unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Hook {
                hook: LifecycleHook::AfterStart,
                ..
            }
        ));
        assert!(!app.is_running());
        assert_eq!(app.local_addr().await, None);

        // Not stuck in a half-started state.
        assert!(matches!(
            app.start(Some(0)).await,
            Err(ApplicationError::Hook { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_when_never_started() {
        let app = app();
        app.stop().await.unwrap();
        assert!(!app.is_running());
    }

    #[tokio::test]
    async fn test_run_until() {
        let app = Arc::new(app());
        app.run_until(Some(0), async {}).await.unwrap();
        assert!(!app.is_running());
    }

    #[test]
    fn test_named_route_url() {
        let mut app = app();
        app.get("/posts/:slug", || async { "post" })
            .unwrap()
            .name("posts.show");

        let params = Params::from([("slug".to_string(), "hello".to_string())]);
        assert_eq!(app.url("posts.show", &params).unwrap(), "/posts/hello");
    }
}
