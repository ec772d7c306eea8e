use std::collections::HashMap;

use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use super::Params;

/// An inbound HTTP request.
///
/// Header lookups are case-insensitive. The body is kept as a
/// [`serde_json::Value`]; transports decode JSON and form bodies into it
/// before the request reaches the application.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: Method,
    url: String,
    path: String,
    query: Map<String, Value>,
    params: Params,
    headers: HeaderMap,
    body: Value,
    cookies: HashMap<String, String>,
    ip: Option<String>,
}

impl Request {
    /// Starts building a request.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The original URL, including the query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL path without query string or fragment.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Everything after `?` in the URL, or an empty string.
    pub fn query_string(&self) -> &str {
        self.url
            .split_once('?')
            .map(|(_, rest)| rest.split('#').next().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Absolute URL rebuilt from the `Host` and `X-Forwarded-Proto` headers.
    pub fn full_url(&self) -> String {
        let scheme = self.header("x-forwarded-proto").unwrap_or("http");
        let host = self.header("host").unwrap_or("localhost");
        format!("{scheme}://{host}{}", self.url)
    }

    // ─── Parameters & input ───────────────────────────────────────────────────

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A route parameter, absent when the route has no such parameter or an
    /// optional one was not supplied.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Replaces the route parameters.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub fn query_map(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn query(&self, key: &str) -> Option<&Value> {
        self.query.get(key)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Looks `key` up in the body, then in the query string.
    ///
    /// Body fields shadow query fields of the same name.
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.body
            .as_object()
            .and_then(|body| body.get(key))
            .or_else(|| self.query.get(key))
    }

    /// Like [`input`](Self::input), deserialized into `T`.
    pub fn input_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.input(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Query and body merged into one map, body winning on collisions.
    pub fn all_input(&self) -> Map<String, Value> {
        let mut merged = self.query.clone();
        if let Some(body) = self.body.as_object() {
            merged.extend(body.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    /// Alias of [`input`](Self::input).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.input(key)
    }

    /// `true` if [`input`](Self::input) finds `key`.
    pub fn has(&self, key: &str) -> bool {
        self.input(key).is_some()
    }

    // ─── Headers & cookies ────────────────────────────────────────────────────

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value by case-insensitive name. Non-visible-ASCII values are
    /// treated as missing.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(header::USER_AGENT.as_str())
    }

    fn content_type(&self) -> &str {
        self.header(header::CONTENT_TYPE.as_str()).unwrap_or_default()
    }

    pub fn is_json(&self) -> bool {
        self.content_type().contains("application/json")
    }

    pub fn is_form(&self) -> bool {
        let content_type = self.content_type();
        content_type.contains("application/x-www-form-urlencoded")
            || content_type.contains("multipart/form-data")
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    /// `true` when the client lists `application/json` in `Accept`.
    pub fn wants_json(&self) -> bool {
        self.header(header::ACCEPT.as_str())
            .is_some_and(|v| v.contains("application/json"))
    }
}

// =============================================================================
// RequestBuilder
// =============================================================================

/// Builder for [`Request`].
///
/// ```rust,ignore
/// let request = Request::builder()
///     .method("post")
///     .url("/users?page=2")
///     .header("Content-Type", "application/json")
///     .body(json!({ "name": "ada" }))
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Method,
    url: Option<String>,
    headers: HeaderMap,
    query: Map<String, Value>,
    body: Value,
    cookies: Option<HashMap<String, String>>,
    ip: Option<String>,
}

impl RequestBuilder {
    /// Sets the method from its name, case-insensitively. Unknown or
    /// malformed names fall back to `GET`.
    pub fn method(mut self, method: &str) -> Self {
        match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
            Ok(m) => self.method = m,
            Err(_) => warn!(method, "Invalid HTTP method, keeping GET"),
        }
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the URL. The path and query string are derived from it.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Adds a header. Invalid names or values are dropped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = name, "Dropping invalid request header"),
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Adds a query entry on top of whatever the URL carries.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Sets a JSON body and a matching `Content-Type` unless one is present.
    pub fn json(mut self, body: Value) -> Self {
        self.headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        self.body = body;
        self
    }

    /// Adds a cookie. When no cookie is added explicitly they are parsed from
    /// the `Cookie` header instead.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn build(self) -> Request {
        let url = self.url.unwrap_or_else(|| "/".to_string());
        let (path, query_string) = split_url(&url);

        let mut query = parse_query(query_string);
        query.extend(self.query);

        let cookies = self
            .cookies
            .unwrap_or_else(|| parse_cookie_header(&self.headers));

        Request {
            method: self.method,
            path: path.to_string(),
            url,
            query,
            params: Params::new(),
            headers: self.headers,
            body: self.body,
            cookies,
            ip: self.ip,
        }
    }
}

fn split_url(url: &str) -> (&str, &str) {
    let without_fragment = url.split('#').next().unwrap_or_default();
    let (path, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));
    let path = if path.is_empty() { "/" } else { path };
    (path, query)
}

/// Later occurrences of a key override earlier ones.
fn parse_query(query: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

fn parse_cookie_header(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
