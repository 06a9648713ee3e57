//! Outbound request construction and the transport seam.
//!
//! [`Transport`] is the single I/O operation the forwarder needs: send one
//! prepared POST and report the response status. [`HttpTransport`] is the
//! reqwest-backed implementation used in production; tests substitute their
//! own implementations.

use std::future::Future;

use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};

use super::error::{BuildError, TransportError};
use super::policy::RetryPolicy;
use crate::types::FunctionName;

/// A resolved forwarding destination: endpoint base plus function name.
///
/// The URL is the plain concatenation of the two. No path normalization is
/// applied, so the base is expected to end with a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    endpoint_base: String,
    function: FunctionName,
}

impl ForwardTarget {
    pub fn new(endpoint_base: impl Into<String>, function: FunctionName) -> Self {
        Self {
            endpoint_base: endpoint_base.into(),
            function,
        }
    }

    pub fn endpoint_base(&self) -> &str {
        &self.endpoint_base
    }

    pub fn function(&self) -> &FunctionName {
        &self.function
    }

    /// The destination URL as text, before parsing.
    pub fn url_string(&self) -> String {
        format!("{}{}", self.endpoint_base, self.function)
    }
}

/// A prepared outbound POST: destination URL and the raw JSON payload.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    url: Url,
    body: Bytes,
}

impl OutboundRequest {
    /// Builds the request for a target.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the concatenated URL does not parse.
    pub fn build(target: &ForwardTarget, body: Bytes) -> Result<Self, BuildError> {
        let url_string = target.url_string();
        let url = Url::parse(&url_string).map_err(|e| BuildError {
            url: url_string,
            reason: e.to_string(),
        })?;
        Ok(Self { url, body })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Sends a prepared request once.
///
/// One call is exactly one outbound HTTP request. Retrying is the caller's
/// business.
pub trait Transport {
    fn send(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<StatusCode, TransportError>> + Send;
}

/// HTTP transport backed by a pooled `reqwest::Client`.
///
/// The client enforces the policy's connect timeout and an absolute
/// per-attempt deadline of `connect_timeout + io_timeout`. The deadline covers
/// connecting, sending and receiving the response head, and is not extended
/// by partial progress. Outbound requests go direct, never through a proxy
/// taken from the environment.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport enforcing the timeouts of `policy`.
    pub fn new(policy: &RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(policy.connect_timeout)
            .timeout(policy.attempt_deadline())
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<StatusCode, TransportError> {
        let response = self
            .client
            .post(request.url().clone())
            .header(CONTENT_TYPE, "application/json")
            .body(request.body().clone())
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::TransportErrorKind;
    use crate::test_utils::{Downstream, DownstreamBehavior};
    use std::time::Duration;

    fn target(base: &str, function: &str) -> ForwardTarget {
        ForwardTarget::new(base, FunctionName::new(function))
    }

    #[test]
    fn url_is_plain_concatenation() {
        let t = target("http://gateway:8080/function/", "deploy");
        assert_eq!(t.url_string(), "http://gateway:8080/function/deploy");

        let t = target("http://gateway:8080/function", "deploy");
        assert_eq!(t.url_string(), "http://gateway:8080/functiondeploy");
    }

    #[test]
    fn empty_function_targets_the_base() {
        let t = target("http://gateway:8080/function/", "");
        let request = OutboundRequest::build(&t, Bytes::new()).unwrap();
        assert_eq!(request.url().as_str(), "http://gateway:8080/function/");
    }

    #[test]
    fn malformed_base_is_a_build_error() {
        let t = target("not a url/", "deploy");
        let err = OutboundRequest::build(&t, Bytes::new()).unwrap_err();
        assert_eq!(err.url, "not a url/deploy");
    }

    #[tokio::test]
    async fn http_transport_posts_payload_as_json() {
        let downstream = Downstream::start(DownstreamBehavior::Respond(StatusCode::OK)).await;
        let transport = HttpTransport::new(&RetryPolicy::default()).unwrap();

        let payload = Bytes::from_static(br#"{"repository":{"name":"test"}}"#);
        let request =
            OutboundRequest::build(&target(&downstream.base_url(), "test"), payload.clone())
                .unwrap();

        let status = transport.send(&request).await.unwrap();

        assert_eq!(status, StatusCode::OK);
        let calls = downstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/function/test");
        assert_eq!(calls[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(calls[0].body, payload);
    }

    #[tokio::test]
    async fn http_transport_reports_non_success_status() {
        let downstream =
            Downstream::start(DownstreamBehavior::Respond(StatusCode::INTERNAL_SERVER_ERROR)).await;
        let transport = HttpTransport::new(&RetryPolicy::default()).unwrap();
        let request =
            OutboundRequest::build(&target(&downstream.base_url(), "test"), Bytes::new()).unwrap();

        let status = transport.send(&request).await.unwrap();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn http_transport_times_out_at_deadline() {
        let downstream = Downstream::start(DownstreamBehavior::Stall(Duration::from_secs(30))).await;
        let policy = RetryPolicy::from_timeout(Duration::from_millis(100), 0);
        let transport = HttpTransport::new(&policy).unwrap();
        let request =
            OutboundRequest::build(&target(&downstream.base_url(), "slow"), Bytes::new()).unwrap();

        let started = std::time::Instant::now();
        let err = transport.send(&request).await.unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(downstream.call_count(), 1);
    }

    #[tokio::test]
    async fn http_transport_reports_refused_connection() {
        // Bind and immediately drop a listener to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&RetryPolicy::default()).unwrap();
        let base = format!("http://{}/function/", addr);
        let request = OutboundRequest::build(&target(&base, "x"), Bytes::new()).unwrap();

        let err = transport.send(&request).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Connect);
    }
}
