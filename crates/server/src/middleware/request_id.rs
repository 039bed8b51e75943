//! Request correlation IDs.
//!
//! An upstream `x-request-id` is reused when it is short printable ASCII;
//! anything else is replaced with a UUID v4. The ID lands on the request
//! span, the Sentry scope and the response headers.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID accepted as-is.
const MAX_UPSTREAM_ID_LEN: usize = 128;

fn accept_upstream(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_UPSTREAM_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic())
}

/// Pick the request's ID from the upstream header or generate one.
fn resolve(request: &Request) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| accept_upstream(id))
        .map_or_else(|| Uuid::new_v4().to_string(), String::from)
}

/// Middleware that ensures every request carries a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = resolve(&request);

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn with_header(value: &str) -> Request {
        Request::builder()
            .header(REQUEST_ID_HEADER, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_upstream_id_is_kept() {
        assert_eq!(resolve(&with_header("req-123")), "req-123");
    }

    #[test]
    fn test_unusable_upstream_ids_are_replaced() {
        let long = "x".repeat(MAX_UPSTREAM_ID_LEN + 1);
        for bad in ["", "has space", long.as_str()] {
            let id = resolve(&with_header(bad));
            assert!(Uuid::parse_str(&id).is_ok(), "{bad:?} kept as {id:?}");
        }
    }

    #[test]
    fn test_missing_header_generates_uuid() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(Uuid::parse_str(&resolve(&request)).is_ok());
    }
}
