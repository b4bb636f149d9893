//! HTTP-facing types and host.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum Router built from the manifest, tower-http layers)
//!     → request.rs (dispatch Request: route, params, query, body)
//!     → Dispatcher (routing::dispatcher)
//!     → response.rs (status, headers, body; finish notification)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseParts};
pub use server::{AppState, HttpServer, ServerError};
