//! Built-in middleware.
//!
//! Both are plain [`Middleware`](crate::routing::Middleware) functions and can be
//! mounted anywhere with `use_fn` / `use_at`.

pub mod logger;
pub mod request_id;

pub use logger::request_logger;
pub use request_id::{request_id, RequestId, X_REQUEST_ID};
