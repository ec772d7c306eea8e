//! # Cosy Transport
//!
//! axum-backed HTTP listener for the Cosy web framework.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  cosy-runtime       │  (Application implements RequestHandler)
//! ├─────────────────────┤
//! │  cosy-core          │  (Request, Response, RequestHandler)
//! ├─────────────────────┤
//! │  cosy-transport     │  <- This crate
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cosy_transport::HttpServer;
//!
//! let handle = HttpServer::new(app.clone()).bind("127.0.0.1:3000").await?;
//! println!("listening on {}", handle.local_addr());
//! // ...
//! handle.shutdown().await;
//! ```

pub mod error;
pub mod server;

pub use error::{TransportError, TransportResult};
pub use server::{DEFAULT_BODY_LIMIT, HttpServer, ServerHandle};
