//! # Cosy
//!
//! A small, Laravel-inspired web application framework for Rust.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   Request   ┌─────────────┐   ┌──────────┐   ┌───────────────────────────┐
//! │ Transport │────────────▶│ Application │──▶│  Router  │──▶│ global ▶ route middleware │──▶ handler
//! │  (axum)   │◀────────────│  (runtime)  │   └──────────┘   └───────────────────────────┘
//! └───────────┘   Response  └─────────────┘         │                      │
//!                                  └──────── Container (services) ◀────────┘
//! ```
//!
//! - **Container**: bindings, singletons and explicit dependency lists
//! - **Router**: compiled route templates, groups, named routes, domains
//! - **Middleware**: onion-model pipeline with named middleware and groups
//! - **Handlers**: async functions taking extractors (Axum-style)
//! - **Application**: providers, lifecycle hooks, error boundary, listener
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cosy::prelude::*;
//!
//! async fn status() -> Json<serde_json::Value> {
//!     Json(serde_json::json!({ "status": "ok" }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut app = Application::new();
//!     app.use_middleware(RequestLogger::new());
//!     app.get("/api/status", status)?;
//!
//!     app.group(GroupOptions::new().prefix("/users").name("users."), |users| {
//!         users.get("/:id", show_user)?.name("show");
//!         Ok(())
//!     })?;
//!
//!     Arc::new(app).run(None).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: Load `cosy.toml` (default)
//! - `yaml-config`: Load `cosy.yaml`
//! - `json-log`: JSON log output

pub use cosy_core as core;
pub use cosy_framework as framework;
pub use cosy_runtime as runtime;
pub use cosy_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cosy::prelude::*;
/// ```
pub mod prelude {
    // Application - main entry point
    pub use cosy_runtime::{Application, ApplicationError, Config, CosyConfig, LifecycleHook};

    // Services
    pub use cosy_core::{
        Arguments, Container, ContainerError, ContainerResult, Dependency, Injectable, Token,
    };
    pub use cosy_framework::ServiceProvider;

    // HTTP values
    pub use cosy_core::{Cookie, HttpError, Method, Request, Response, SameSite, StatusCode};

    // Routing - the registrar trait brings get/post/... into scope
    pub use cosy_framework::{GroupOptions, Route, RouteRegistrar, Router};

    // Handlers and extractors
    pub use cosy_framework::{
        BoxError, FromContext, HttpContext, Inject, IntoReply, Json, PathParams, Query, Reply,
        State,
    };

    // Middleware
    pub use cosy_framework::middleware::common::{
        BearerAuth, Cors, ErrorHandler, RateLimit, RequestLogger,
    };
    pub use cosy_framework::middleware::{unless, when, when_header, when_method, when_path};
    pub use cosy_framework::{Middleware, Next, from_fn};
}
