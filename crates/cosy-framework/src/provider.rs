//! Service providers.
//!
//! A provider bundles the registration and lifecycle of a set of related
//! services. The application calls [`register`](ServiceProvider::register)
//! and [`routes`](ServiceProvider::routes) as soon as the provider is added,
//! [`boot`](ServiceProvider::boot) once when the application boots, and
//! [`shutdown`](ServiceProvider::shutdown) when it stops.
//!
//! ```rust,ignore
//! struct DatabaseProvider;
//!
//! #[async_trait]
//! impl ServiceProvider for DatabaseProvider {
//!     fn register(&self, container: &Container) {
//!         container.singleton::<Database>("db");
//!     }
//!
//!     async fn boot(&self, container: &Container) -> Result<(), BoxError> {
//!         container.resolve::<Database>("db")?.connect().await
//!     }
//! }
//! ```

use async_trait::async_trait;
use cosy_core::Container;

use crate::error::{BoxError, RouteResult};
use crate::routing::Router;

#[async_trait]
pub trait ServiceProvider: Send + Sync + 'static {
    /// Used in logs and boot errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Registers bindings. Must not resolve services; other providers may
    /// not have registered yet.
    fn register(&self, container: &Container);

    /// Registers routes owned by the provider.
    fn routes(&self, _router: &mut Router) -> RouteResult<()> {
        Ok(())
    }

    async fn boot(&self, _container: &Container) -> Result<(), BoxError> {
        Ok(())
    }

    async fn shutdown(&self, _container: &Container) -> Result<(), BoxError> {
        Ok(())
    }
}
