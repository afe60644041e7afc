//! HTTP metrics middleware.
//!
//! Applied as the outermost layer so it also sees responses produced before
//! a handler runs (unknown routes, wrong methods, query rejections, timeouts).

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records HTTP request metrics for all responses.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    async fn created() -> StatusCode {
        StatusCode::CREATED
    }

    async fn forbidden() -> StatusCode {
        StatusCode::FORBIDDEN
    }

    fn test_app() -> Router {
        Router::new()
            .route("/join", post(created))
            .route("/end", post(forbidden))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn send(method: &str, uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");

        test_app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_middleware_passes_success_through() {
        assert_eq!(send("POST", "/join").await, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_middleware_passes_error_through() {
        assert_eq!(send("POST", "/end").await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_middleware_sees_framework_errors() {
        assert_eq!(send("GET", "/join").await, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(send("GET", "/nonexistent").await, StatusCode::NOT_FOUND);
    }
}
