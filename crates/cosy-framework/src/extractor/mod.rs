//! Extractor system.
//!
//! Handler functions declare what they need through their parameter types;
//! each parameter implements [`FromContext`] and is pulled out of the
//! [`HttpContext`](crate::context::HttpContext) before the handler runs.
//!
//! | Extractor          | Source                                     |
//! |--------------------|--------------------------------------------|
//! | `Arc<HttpContext>` | the context itself                         |
//! | `Request`          | a clone of the request                     |
//! | `HeaderMap`        | request headers                            |
//! | `Method`           | request method                             |
//! | [`PathParams`]     | matched route parameters                   |
//! | [`Query<T>`]       | query string, deserialized                 |
//! | [`Json<T>`]        | request body, deserialized                 |
//! | [`Inject<T>`]      | container service under `Token::of::<T>()` |
//! | [`State<T>`]       | value stored by a middleware               |
//! | `Option<E>`        | any of the above, never failing            |

pub mod core;
pub mod request;
pub mod service;

pub use self::core::FromContext;
pub use request::{Json, PathParams, Query};
pub use service::{Inject, State};
