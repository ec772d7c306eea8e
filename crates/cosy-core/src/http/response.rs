use std::borrow::Cow;

use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::Cookie;
use crate::error::{ResponseError, ResponseResult};

/// An outbound HTTP response under construction.
///
/// `status`, `header`, `cookie` and friends can be called any number of
/// times, also after sending, which lets outer middleware decorate a response
/// an inner handler already produced. The terminal methods (`json`, `html`,
/// `send`, `redirect`, `download`) write the body and may run only once: a
/// second call fails with [`ResponseError::AlreadySent`] and leaves the
/// response untouched.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    body: Vec<u8>,
    responded: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Vec::new(),
            responded: false,
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Chainable setters ────────────────────────────────────────────────────

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets (replaces) a header. Invalid names or values are dropped with a
    /// warning.
    pub fn header(&mut self, name: &str, value: impl AsRef<str>) -> &mut Self {
        let value = value.as_ref();
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = name, "Dropping invalid response header"),
        }
        self
    }

    pub fn cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.cookies.push(cookie);
        self
    }

    /// Queues a cookie that expires `name` on the client.
    pub fn clear_cookie(&mut self, name: &str) -> &mut Self {
        self.cookie(Cookie::removal(name))
    }

    /// Marks the response as a file attachment without sending it.
    pub fn attachment(&mut self, filename: &str) -> &mut Self {
        self.header(
            header::CONTENT_DISPOSITION.as_str(),
            format!("attachment; filename=\"{filename}\""),
        )
    }

    // ─── Terminal methods ─────────────────────────────────────────────────────

    /// Sends `data` as pretty-printed JSON.
    pub fn json<T: Serialize + ?Sized>(&mut self, data: &T) -> ResponseResult<&mut Self> {
        self.ensure_unsent()?;
        let body = serde_json::to_vec_pretty(data)?;
        self.header(header::CONTENT_TYPE.as_str(), "application/json");
        Ok(self.finish(body))
    }

    pub fn html(&mut self, html: impl Into<String>) -> ResponseResult<&mut Self> {
        self.ensure_unsent()?;
        self.header(header::CONTENT_TYPE.as_str(), "text/html; charset=utf-8");
        Ok(self.finish(html.into().into_bytes()))
    }

    /// Sends a raw body. Defaults the content type to plain text when none
    /// was set.
    pub fn send(&mut self, body: impl Into<Vec<u8>>) -> ResponseResult<&mut Self> {
        self.ensure_unsent()?;
        self.headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("text/plain; charset=utf-8"));
        Ok(self.finish(body.into()))
    }

    /// Redirects with `302 Found`.
    pub fn redirect(&mut self, location: &str) -> ResponseResult<&mut Self> {
        self.redirect_with(location, StatusCode::FOUND)
    }

    pub fn redirect_with(&mut self, location: &str, status: StatusCode) -> ResponseResult<&mut Self> {
        self.ensure_unsent()?;
        self.status(status).header(header::LOCATION.as_str(), location);
        Ok(self.finish(Vec::new()))
    }

    /// Sends `content` as a downloadable file named `filename`.
    pub fn download(
        &mut self,
        content: impl Into<Vec<u8>>,
        filename: &str,
    ) -> ResponseResult<&mut Self> {
        self.ensure_unsent()?;
        self.attachment(filename)
            .header(header::CONTENT_TYPE.as_str(), "application/octet-stream");
        Ok(self.finish(content.into()))
    }

    fn ensure_unsent(&self) -> ResponseResult<()> {
        if self.responded {
            return Err(ResponseError::AlreadySent);
        }
        Ok(())
    }

    fn finish(&mut self, body: Vec<u8>) -> &mut Self {
        self.body = body;
        self.responded = true;
        self
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    /// `true` once a terminal method has run.
    pub fn has_responded(&self) -> bool {
        self.responded
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Serialized `Set-Cookie` values, one per queued cookie.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies.iter().map(ToString::to_string).collect()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserializes the body as JSON.
    pub fn json_body<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Splits the response for a transport, folding cookies into
    /// `Set-Cookie` headers.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut headers = self.headers;
        for cookie in &self.cookies {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(_) => warn!(cookie = cookie.name(), "Dropping unencodable cookie"),
            }
        }
        (self.status, headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn test_chaining_and_json() {
        let mut response = Response::new();
        response
            .status(StatusCode::CREATED)
            .header("X-Request-Id", "42")
            .json(&json!({ "id": 1 }))
            .unwrap();

        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert_eq!(response.get_header("x-request-id"), Some("42"));
        assert_eq!(response.get_header("content-type"), Some("application/json"));
        assert!(response.has_responded());
        assert_eq!(response.json_body::<Value>().unwrap(), json!({ "id": 1 }));
    }

    #[test]
    fn test_double_send_is_rejected() {
        let mut response = Response::new();
        response.html("<p>first</p>").unwrap();

        let err = response.json(&json!({ "second": true })).unwrap_err();
        assert!(matches!(err, ResponseError::AlreadySent));
        assert_eq!(response.text(), "<p>first</p>");
    }

    #[test]
    fn test_headers_after_send() {
        let mut response = Response::new();
        response.send("ok").unwrap();
        response.header("X-Response-Time", "3ms");
        assert_eq!(response.get_header("x-response-time"), Some("3ms"));
    }

    #[test]
    fn test_redirect() {
        let mut response = Response::new();
        response.redirect("/login").unwrap();
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.get_header("location"), Some("/login"));
    }

    #[test]
    fn test_download() {
        let mut response = Response::new();
        response.download(b"a,b\n1,2".to_vec(), "report.csv").unwrap();
        assert_eq!(
            response.get_header("content-disposition"),
            Some("attachment; filename=\"report.csv\"")
        );
        assert_eq!(
            response.get_header("content-type"),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn test_cookies_become_set_cookie_headers() {
        let mut response = Response::new();
        response
            .cookie(Cookie::new("a", "1"))
            .clear_cookie("b");

        let (_, headers, _) = response.into_parts();
        let values: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], "a=1");
        assert!(values[1].starts_with("b=; Expires="));
    }
}
