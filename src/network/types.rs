//! Request and response values exchanged between the page, the worker and
//! the upstream origin.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;

use crate::error::Result;

/// Header a page sets to identify itself across reloads.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

// == Worker Request ==
/// An intercepted fetch, already resolved to an absolute upstream URL.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Page navigation (top-level document load)
    pub navigate: bool,
    /// Stable page session id, when the page sends one
    pub client_id: Option<String>,
}

impl WorkerRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            navigate: false,
            client_id: None,
        }
    }

    /// Plain GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST request carrying a JSON body.
    pub fn post_json<T: Serialize>(url: impl Into<String>, value: &T) -> Result<Self> {
        let mut request = Self::new(Method::POST, url);
        request.body = Bytes::from(serde_json::to_vec(value)?);
        request.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(request)
    }

    pub fn with_navigate(mut self, navigate: bool) -> Self {
        self.navigate = navigate;
        self
    }

    /// Reads the page session id from [`CLIENT_ID_HEADER`], if present.
    pub fn client_id_from(headers: &HeaderMap) -> Option<String> {
        headers
            .get(CLIENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    /// Path component of the URL, empty if the URL does not parse.
    pub fn path(&self) -> String {
        url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }

    /// Detects a navigation from the headers a browser sends with it.
    pub fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
        if method != Method::GET {
            return false;
        }
        let fetch_mode = headers
            .get("sec-fetch-mode")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("navigate"));
        let accepts_html = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/html"));
        fetch_mode || accepts_html
    }
}

// == Worker Response ==
/// A captured response: what the cache stores and what the page receives.
#[derive(Debug, Clone)]
pub struct WorkerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WorkerResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// JSON response with the given status.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self> {
        let mut response = Self::new(status, serde_json::to_vec(value)?);
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(response)
    }

    /// Adds a header, ignoring values that are not valid header text.
    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }
}

impl IntoResponse for WorkerResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
