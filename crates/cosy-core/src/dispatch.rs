//! The boundary between a transport and whatever answers its requests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::http::{Request, Response};

/// Something that turns a [`Request`] into a [`Response`].
///
/// Implementations must always produce a response: failures are expected to
/// be rendered into an error response rather than surfaced to the transport.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Handles one request. `cancellation` fires when the transport gives up
    /// on the request (shutdown, client gone).
    async fn handle_request(&self, request: Request, cancellation: CancellationToken) -> Response;
}

/// Shared, type-erased request handler.
pub type BoxedRequestHandler = Arc<dyn RequestHandler>;
