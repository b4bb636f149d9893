//! Response handle shared by the dispatcher and every entry in the chain.
//!
//! # Responsibilities
//! - Status, headers and body writing
//! - One-shot "finished" notification the dispatcher subscribes to
//! - Conversion into an axum response once the chain is done
//!
//! # Design Decisions
//! - A response can be finalized once; later attempts are logged and ignored
//! - Finish listeners run outside the lock

use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use bytes::Bytes;
use serde::Serialize;

type FinishListener = Box<dyn FnOnce() + Send>;

/// Outbound response under construction.
#[derive(Clone, Default)]
pub struct Response {
    inner: Arc<Mutex<ResponseState>>,
}

struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    finished: bool,
    listener: Option<FinishListener>,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            finished: false,
            listener: None,
        }
    }
}

/// The final state of a response, detached from the shared handle.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ResponseState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> StatusCode {
        self.state().status
    }

    pub fn set_status(&self, status: StatusCode) -> &Self {
        self.state().status = status;
        self
    }

    pub fn set_header(&self, name: HeaderName, value: HeaderValue) -> &Self {
        self.state().headers.insert(name, value);
        self
    }

    pub fn append_header(&self, name: HeaderName, value: HeaderValue) -> &Self {
        self.state().headers.append(name, value);
        self
    }

    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.state().headers.get(name).cloned()
    }

    pub fn body(&self) -> Bytes {
        self.state().body.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state().finished
    }

    /// Write `body` and finalize the response.
    pub fn send(&self, body: impl Into<Bytes>) {
        self.finish(Some(body.into()), HeaderValue::from_static("text/plain; charset=utf-8"));
    }

    /// Serialize `value` as the JSON body and finalize the response.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.finish(Some(body.into()), HeaderValue::from_static("application/json"))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                self.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                self.send("Failed to serialize response body");
            }
        }
    }

    /// Finalize the response with whatever body it already has.
    pub fn end(&self) {
        self.finish(None, HeaderValue::from_static("text/plain; charset=utf-8"));
    }

    fn finish(&self, body: Option<Bytes>, default_content_type: HeaderValue) {
        let listener = {
            let mut state = self.state();
            if state.finished {
                tracing::warn!(status = %state.status, "Response already finished, ignoring");
                return;
            }
            if let Some(body) = body {
                state.body = body;
            }
            if !state.body.is_empty() && !state.headers.contains_key(header::CONTENT_TYPE) {
                state.headers.insert(header::CONTENT_TYPE, default_content_type);
            }
            state.finished = true;
            state.listener.take()
        };
        if let Some(listener) = listener {
            listener();
        }
    }

    /// Register a callback for when the response is finalized.
    ///
    /// Fires exactly once. If the response has already been finalized the
    /// callback runs immediately.
    pub fn on_finish(&self, callback: impl FnOnce() + Send + 'static) {
        let mut state = self.state();
        if state.finished {
            drop(state);
            callback();
            return;
        }
        state.listener = Some(match state.listener.take() {
            Some(previous) => Box::new(move || {
                previous();
                callback();
            }),
            None => Box::new(callback),
        });
    }

    /// Copy out the current status, headers and body.
    pub fn parts(&self) -> ResponseParts {
        let state = self.state();
        ResponseParts {
            status: state.status,
            headers: state.headers.clone(),
            body: state.body.clone(),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Response")
            .field("status", &state.status)
            .field("finished", &state.finished)
            .finish()
    }
}

impl IntoResponse for ResponseParts {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.headers, self.body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_send_finalizes_once() {
        let res = Response::new();
        res.set_status(StatusCode::CREATED).send("first");
        res.send("second");

        assert!(res.is_finished());
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.body(), Bytes::from("first"));
        assert_eq!(
            res.header(&header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_json_sets_content_type() {
        let res = Response::new();
        res.json(&serde_json::json!({ "status": "success" }));

        let parts = res.parts();
        assert_eq!(parts.headers[header::CONTENT_TYPE], "application/json");
        let body: serde_json::Value = serde_json::from_slice(&parts.body).unwrap();
        assert_eq!(body["status"], "success");
    }

    #[test]
    fn test_on_finish_fires_once() {
        let res = Response::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        res.on_finish(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = calls.clone();
        res.on_finish(move || {
            c.fetch_add(10, Ordering::SeqCst);
        });

        res.end();
        res.end();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_on_finish_after_finish_runs_immediately() {
        let res = Response::new();
        res.send("done");

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        res.on_finish(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let res = Response::new();
        let other = res.clone();
        other.set_status(StatusCode::ACCEPTED);
        other.end();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert!(res.is_finished());
    }
}
