//! # Cosy Framework
//!
//! Request-dispatch components built on top of `cosy-core`.
//!
//! This layer provides:
//! - Route compiler and router with groups, named routes and domains
//! - Onion-model middleware pipeline with a named-middleware registry
//! - Handler trait for Axum-style extraction from the request context
//! - Conditional and common middleware (CORS, logging, auth, rate limiting)
//! - The service-provider contract used by the application
//!
//! The application façade that ties these together lives in `cosy-runtime`.

pub mod context;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod middleware;
pub mod provider;
pub mod routing;

pub use context::HttpContext;
pub use error::{
    BoxError, DispatchError, ExtractError, ExtractResult, RouteError, RouteResult, error_payload,
    error_response, status_for,
};
pub use extractor::{FromContext, Inject, Json, PathParams, Query, State};
pub use handler::{BoxedEndpoint, Handler, HandlerResult, IntoReply, Reply, into_endpoint};
pub use middleware::{
    BoxedMiddleware, Chain, IntoMiddleware, Middleware, MiddlewareRegistry, Next, Pipeline,
    RouteMiddleware, from_fn,
};
pub use provider::ServiceProvider;
pub use routing::{GroupOptions, Route, RouteGroup, RouteMatch, RouteRegistrar, Router};
