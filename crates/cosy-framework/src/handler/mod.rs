//! Handler system.
//!
//! - **Traits** ([`traits`]) – the [`Handler`] trait, implemented for async
//!   functions whose parameters are extractors
//! - **Reply** ([`reply`]) – [`IntoReply`] and the [`Reply`] a handler produces
//! - **Service** ([`service`]) – [`HandlerService`] and the type-erased
//!   [`BoxedEndpoint`] that routes store
//!
//! ```text
//! async fn(PathParams, Inject<Repo>) -> Result<Json<T>, HttpError>
//!     │ Handler<(PathParams, Inject<Repo>)>
//!     ▼
//! HandlerService ──► BoxedEndpoint ──► Route
//! ```

pub mod reply;
pub mod service;
pub mod traits;

pub use reply::{IntoReply, Reply};
pub use service::{BoxedEndpoint, HandlerService, into_endpoint};
pub use traits::{Handler, HandlerResult};
