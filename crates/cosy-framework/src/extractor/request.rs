//! Extractors over the request line and body.

use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use cosy_core::Params;

use crate::context::HttpContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// The route parameters matched for this request.
///
/// Optional parameters the client left out are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub Params);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parses a required parameter.
    pub fn parse<T>(&self, name: &str) -> ExtractResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self
            .get(name)
            .ok_or_else(|| ExtractError::MissingParameter(name.to_string()))?;
        raw.parse().map_err(|e: T::Err| ExtractError::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Deref for PathParams {
    type Target = Params;

    fn deref(&self) -> &Params {
        &self.0
    }
}

impl FromContext for PathParams {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        Ok(Self(ctx.request().params().clone()))
    }
}

/// The query string deserialized into `T`.
///
/// Query values are strings, so numeric fields need
/// `#[serde(deserialize_with = ...)]` or a `String` field.
#[derive(Debug, Clone)]
pub struct Query<T>(pub T);

impl<T> Deref for Query<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned> FromContext for Query<T> {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        let query = Value::Object(ctx.request().query_map().clone());
        serde_json::from_value(query)
            .map(Query)
            .map_err(|e| ExtractError::InvalidQuery(e.to_string()))
    }
}

/// The request body deserialized into `T`, and a JSON reply when returned
/// from a handler.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned> FromContext for Json<T> {
    fn from_context(ctx: &Arc<HttpContext>) -> ExtractResult<Self> {
        serde_json::from_value(ctx.request().body().clone())
            .map(Json)
            .map_err(|e| ExtractError::InvalidBody(e.to_string()))
    }
}
