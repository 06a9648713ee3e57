//! Liveness probe.
//!
//! Answers without touching the forwarder or the downstream, so a slow or
//! unreachable gateway never makes the relay itself look dead.

use axum::http::StatusCode;

/// `GET /health`. Answers `200 OK` whenever the process is serving.
///
/// # Example
///
/// ```ignore
/// GET /health HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: text/plain; charset=utf-8
///
/// OK
/// ```
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_ok_with_plain_body() {
        let (status, body) = health_handler().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}
