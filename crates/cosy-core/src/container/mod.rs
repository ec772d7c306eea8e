//! Service container.
//!
//! Services are registered under a [`Token`] with a [`Constructor`] and a
//! [`Lifetime`], or seeded directly as instances. Constructors never discover
//! their dependencies by themselves: every [`Injectable`] lists them up front
//! via [`Injectable::dependencies`], and the container resolves that list in
//! order before calling [`Injectable::construct`].
//!
//! ```rust,ignore
//! struct Mailer { transport: Arc<SmtpTransport> }
//!
//! impl Injectable for Mailer {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::token("smtp")]
//!     }
//!
//!     fn construct(mut args: Arguments) -> ContainerResult<Self> {
//!         Ok(Self { transport: args.take()? })
//!     }
//! }
//!
//! let container = Container::new();
//! container.instance("smtp", SmtpTransport::default());
//! container.singleton::<Mailer>("mailer");
//! let mailer = container.resolve::<Mailer>("mailer")?;
//! ```

mod injectable;
mod registry;
mod token;

use std::any::Any;
use std::sync::Arc;

pub use injectable::{Arguments, Constructor, Dependency, Injectable};
pub use registry::Container;
pub use token::Token;

/// Type-erased service handle as stored by the container.
///
/// The erased value is always an `Arc<T>` of the registered service type, so
/// `Arc::downcast::<T>` recovers it without copying.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// How long a resolved service lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// A new instance on every resolution.
    #[default]
    Transient,
    /// One lazily created instance shared for the life of the container.
    Singleton,
}
