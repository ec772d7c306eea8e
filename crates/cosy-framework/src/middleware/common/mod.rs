//! Ready-made middleware.

pub mod auth;
pub mod cors;
pub mod error_handler;
pub mod logger;
pub mod rate_limit;

pub use auth::{AuthenticatedUser, BearerAuth};
pub use cors::Cors;
pub use error_handler::ErrorHandler;
pub use logger::RequestLogger;
pub use rate_limit::RateLimit;
