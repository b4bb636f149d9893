//! Request handle passed through the middleware chain.
//!
//! # Responsibilities
//! - Carry the normalized dispatch route, distinct from the raw URL path
//! - Expose method, headers, path params, query params and body
//! - Hold request-local extensions so middleware can hand context to later entries
//!
//! # Design Decisions
//! - Cheap to clone: every entry in the chain gets its own handle to the same request
//! - Immutable apart from extensions

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{Extensions, HeaderMap, Method};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::routing::route::normalize;

/// An inbound request as seen by middleware and handlers.
#[derive(Clone, Debug)]
pub struct Request {
    inner: Arc<RequestInner>,
    extensions: Arc<Mutex<Extensions>>,
}

#[derive(Debug)]
struct RequestInner {
    method: Method,
    route: String,
    path: String,
    headers: HeaderMap,
    path_params: HashMap<String, String>,
    query_params: HashMap<String, Vec<String>>,
    body: Bytes,
}

impl Request {
    /// Start building a request for `method` dispatched to `route`.
    pub fn builder(method: Method, route: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, route)
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// The normalized route used as the dispatch key.
    pub fn route(&self) -> &str {
        &self.inner.route
    }

    /// The raw path the request arrived on.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.inner.path_params.get(name).map(String::as_str)
    }

    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.inner.path_params
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.inner
            .query_params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn query_params(&self) -> &HashMap<String, Vec<String>> {
        &self.inner.query_params
    }

    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.inner.body)
    }

    /// Attach a value for later entries in the chain.
    pub fn insert_extension<T: Clone + Send + Sync + 'static>(&self, value: T) {
        self.extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(value);
    }

    pub fn extension<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get::<T>()
            .cloned()
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    route: String,
    path: Option<String>,
    headers: HeaderMap,
    path_params: HashMap<String, String>,
    query_params: HashMap<String, Vec<String>>,
    body: Bytes,
}

impl RequestBuilder {
    fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            method,
            route: route.into(),
            path: None,
            headers: HeaderMap::new(),
            path_params: HashMap::new(),
            query_params: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        let route = if self.route.starts_with('/') {
            normalize(&self.route)
        } else {
            normalize(&format!("/{}", self.route))
        };
        let path = self.path.unwrap_or_else(|| route.clone());

        Request {
            inner: Arc::new(RequestInner {
                method: self.method,
                route,
                path,
                headers: self.headers,
                path_params: self.path_params,
                query_params: self.query_params,
                body: self.body,
            }),
            extensions: Arc::new(Mutex::new(Extensions::new())),
        }
    }
}
