//! Per-request logging.

use crate::http::middleware::request_id::RequestId;
use crate::http::{Request, Response};
use crate::routing::{Advance, Middleware};

/// Log every request passing through, then continue.
pub fn request_logger() -> impl Middleware {
    |req: Request, _res: Response, next: Advance| async move {
        let request_id = req
            .extension::<RequestId>()
            .map(|RequestId(id)| id)
            .unwrap_or_else(|| "unknown".to_string());
        tracing::info!(
            request_id = %request_id,
            method = %req.method(),
            route = %req.route(),
            path = %req.path(),
            "Handling request"
        );
        next.advance()
    }
}
