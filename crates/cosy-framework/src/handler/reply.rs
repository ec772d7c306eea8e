//! Handler return values.

use serde::Serialize;
use serde_json::Value;

use cosy_core::{Response, ResponseResult};

use crate::error::BoxError;
use crate::extractor::Json;

/// What a handler produced, applied to the response unless the handler (or a
/// middleware) already sent one.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Reply {
    /// Nothing to write.
    #[default]
    Empty,
    /// An HTML body.
    Html(String),
    /// A JSON body.
    Json(Value),
}

impl Reply {
    /// Serializes `value` into a JSON reply.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, BoxError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Writes this reply into `response`.
    pub fn apply(self, response: &mut Response) -> ResponseResult<()> {
        match self {
            Self::Empty => {}
            Self::Html(html) => {
                response.html(html)?;
            }
            Self::Json(value) => {
                response.json(&value)?;
            }
        }
        Ok(())
    }
}

/// Conversion of handler return values into a [`Reply`].
///
/// Strings become HTML, JSON values become JSON, `()` writes nothing, and
/// `Result`s propagate their error into the middleware chain.
pub trait IntoReply: Send {
    fn into_reply(self) -> Result<Reply, BoxError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(self)
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Empty)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Html(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Html(self.to_string()))
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Json(self))
    }
}

impl<T: Serialize + Send> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Reply::json(&self.0)
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, BoxError> {
        self.map_or(Ok(Reply::Empty), IntoReply::into_reply)
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError> + Send,
{
    fn into_reply(self) -> Result<Reply, BoxError> {
        self.map_err(Into::into)?.into_reply()
    }
}
