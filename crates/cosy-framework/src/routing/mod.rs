//! Route compilation, registration and resolution.
//!
//! ```rust,ignore
//! let mut router = Router::new();
//! router.get("/", home)?;
//! router.group(GroupOptions::new().prefix("/api").middleware_named("auth"), |api| {
//!     api.get("/users/:id?", users)?.name("users");
//!     Ok(())
//! })?;
//!
//! let found = router.resolve(&Method::GET, "/api/users/7");
//! ```

pub mod compiler;
pub mod group;
pub mod route;
pub mod router;

pub use compiler::{CompiledRoute, compile, compile_with, join_paths, match_path, normalize_path};
pub use group::{GroupOptions, RouteGroup};
pub use route::{ANY_METHODS, Route};
pub use router::{RouteMatch, RouteRegistrar, Router};
