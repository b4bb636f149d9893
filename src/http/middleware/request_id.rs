//! Request ID propagation.

use axum::http::{HeaderName, HeaderValue};
use uuid::Uuid;

use crate::http::{Request, Response};
use crate::routing::{Advance, Middleware};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The ID assigned to the current request, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Reuse the caller's `x-request-id` or generate a UUID v4, expose it to later
/// entries and echo it on the response.
pub fn request_id() -> impl Middleware {
    |req: Request, res: Response, next: Advance| async move {
        let id = req
            .header(X_REQUEST_ID.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Ok(value) = HeaderValue::from_str(&id) {
            res.set_header(X_REQUEST_ID, value);
        }
        req.insert_extension(RequestId(id));
        next.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Flow;
    use axum::http::{HeaderMap, Method};

    #[tokio::test]
    async fn test_generates_id() {
        let req = Request::builder(Method::GET, "/").build();
        let res = Response::new();

        let flow = request_id().call(req.clone(), res.clone(), Advance::new()).await;

        assert_eq!(flow, Flow::Continue);
        let RequestId(id) = req.extension::<RequestId>().unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(res.header(&X_REQUEST_ID).unwrap(), id.as_str());
    }

    #[tokio::test]
    async fn test_reuses_incoming_id() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        let req = Request::builder(Method::GET, "/").headers(headers).build();
        let res = Response::new();

        request_id().call(req.clone(), res.clone(), Advance::new()).await;

        assert_eq!(req.extension::<RequestId>(), Some(RequestId("abc-123".into())));
        assert_eq!(res.header(&X_REQUEST_ID).unwrap(), "abc-123");
    }
}
