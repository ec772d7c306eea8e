//! # Cosy Core
//!
//! Foundation types shared by every other Cosy crate:
//!
//! - [`container`]: the service container with explicit dependency declaration
//! - [`http`]: request and response value objects plus [`HttpError`]
//! - [`RequestHandler`]: the seam between a transport and the application
//!
//! Nothing in here knows about routing or middleware; those live in
//! `cosy-framework`.

pub mod container;
pub mod dispatch;
pub mod error;
pub mod http;

pub use container::{
    Arguments, Constructor, Container, Dependency, Injectable, Lifetime, ServiceArc, Token,
};
pub use dispatch::{BoxedRequestHandler, RequestHandler};
pub use error::{ContainerError, ContainerResult, ResponseError, ResponseResult};
pub use self::http::{Cookie, HttpError, Params, Request, RequestBuilder, Response, SameSite};

// Re-exported so downstream crates agree on one `http` version.
pub use ::http::{HeaderMap, Method, StatusCode};
