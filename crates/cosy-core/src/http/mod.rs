//! HTTP value objects.
//!
//! [`Request`] is read-mostly: it is assembled once by the transport (or a
//! test) through [`Request::builder`], and only its route parameters are set
//! afterwards. [`Response`] is a mutable builder that can be *sent* exactly
//! once; see [`Response::has_responded`].

mod cookie;
mod error;
mod request;
mod response;

use std::collections::HashMap;

pub use cookie::{Cookie, SameSite};
pub use error::HttpError;
pub use request::{Request, RequestBuilder};
pub use response::Response;

/// Route parameters extracted from the matched path, keyed by name.
pub type Params = HashMap<String, String>;
