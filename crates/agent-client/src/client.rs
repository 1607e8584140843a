//! SoHook agent API client.
//!
//! Async HTTP client using `reqwest`. Every call is bounded by
//! [`REQUEST_TIMEOUT`]; the base URL can be swapped at runtime.

use std::sync::{PoisonError, RwLock};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;

use sohook_protocol::constants::{DEFAULT_SERVER_URL, Method, REQUEST_TIMEOUT};
use sohook_protocol::{ApiResponse, FdLeak, FdStats, HealthData, LeakGroup, MemoryStats, Route};

use crate::error::Error;

/// Upper bound on the response body kept in [`Error::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Client for one agent endpoint.
pub struct Client {
    http: reqwest::Client,
    base_url: RwLock<String>,
}

impl Client {
    /// Creates a client talking to `base_url`.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Self::build(base_url, REQUEST_TIMEOUT)
    }

    /// Creates a client for the default agent address.
    pub fn with_default_endpoint() -> Result<Self, Error> {
        Self::new(DEFAULT_SERVER_URL)
    }

    fn build(base_url: &str, timeout: std::time::Duration) -> Result<Self, Error> {
        let base_url = normalize(base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: RwLock::new(base_url),
        })
    }

    /// Uses a custom timeout (for testing).
    #[cfg(test)]
    pub(crate) fn with_timeout(base_url: &str, timeout: std::time::Duration) -> Self {
        Self::build(base_url, timeout).unwrap()
    }

    /// Points all subsequent calls at `url`.
    ///
    /// Only an empty URL is rejected here; a malformed one fails on the next
    /// request as a network error.
    pub fn set_endpoint(&self, url: &str) -> Result<(), Error> {
        let url = normalize(url)?;
        debug!(endpoint = %url, "agent endpoint changed");
        *self.base_url.write().unwrap_or_else(PoisonError::into_inner) = url;
        Ok(())
    }

    /// The base URL currently in use.
    pub fn endpoint(&self) -> String {
        self.base_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn url_for(&self, route: Route) -> String {
        format!("{}{}", self.endpoint(), route.path())
    }

    /// Performs a request and decodes the response envelope.
    async fn call(&self, route: Route) -> Result<ApiResponse, Error> {
        let url = self.url_for(route);
        debug!(%route, %url, "agent request");

        let req = match route.method() {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            // Agent-side failures still carry an envelope with the reason.
            if let Ok(env) = serde_json::from_slice::<ApiResponse>(&body)
                && !env.is_success()
            {
                return Err(Error::Agent {
                    code: env.code,
                    message: env.message,
                });
            }
            return Err(Error::Status {
                status: status.as_u16(),
                body: error_excerpt(&body),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// Performs a request and decodes the envelope payload into `T`.
    async fn fetch<T: DeserializeOwned>(&self, route: Route) -> Result<T, Error> {
        Ok(self.call(route).await?.into_data()?)
    }

    /// Returns the agent's allocation counters.
    pub async fn get_memory_stats(&self) -> Result<MemoryStats, Error> {
        self.fetch(Route::Stats).await
    }

    /// Returns leaked allocations grouped by call stack.
    pub async fn get_leaks(&self) -> Result<Vec<LeakGroup>, Error> {
        self.fetch(Route::Leaks).await
    }

    /// Returns the agent's file descriptor counters.
    pub async fn get_fd_stats(&self) -> Result<FdStats, Error> {
        self.fetch(Route::FdStats).await
    }

    /// Returns descriptors that are still open.
    pub async fn get_fd_leaks(&self) -> Result<Vec<FdLeak>, Error> {
        self.fetch(Route::FdLeaks).await
    }

    /// Returns the agent's plain-text memory leak report.
    pub async fn get_leak_report(&self) -> Result<String, Error> {
        self.fetch(Route::LeakReport).await
    }

    /// Returns the agent's plain-text descriptor leak report.
    pub async fn get_fd_leak_report(&self) -> Result<String, Error> {
        self.fetch(Route::FdLeakReport).await
    }

    /// Asks the agent to clear its counters.
    ///
    /// Local state is not touched; callers re-fetch afterwards.
    pub async fn reset_stats(&self) -> Result<(), Error> {
        let _: serde_json::Value = self.fetch(Route::Reset).await?;
        Ok(())
    }

    /// Probes `/api/health`. Never fails: any error reads as `false`.
    pub async fn health_check(&self) -> bool {
        match self.fetch::<HealthData>(Route::Health).await {
            Ok(health) => {
                if !health.is_ok() {
                    debug!(status = %health.status, "agent reported unhealthy status");
                }
                health.is_ok()
            }
            Err(e) => {
                debug!(error = %e, kind = ?e.kind(), "health check failed");
                false
            }
        }
    }
}

/// Trims whitespace and a trailing slash; rejects empty input.
fn normalize(url: &str) -> Result<String, Error> {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() {
        return Err(Error::EmptyEndpoint);
    }
    Ok(url.to_string())
}

/// First non-blank line of an error body, cut at [`MAX_ERROR_BODY`] bytes.
fn error_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    if line.len() <= MAX_ERROR_BODY {
        return line.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &line[..end])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// A mock agent answering every connection with the same response.
    struct MockAgent {
        url: String,
        requests: mpsc::UnboundedReceiver<String>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Drop for MockAgent {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    /// Starts a mock HTTP server that responds with `status` and `body`.
    async fn mock_server(status: u16, body: &str) -> MockAgent {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let body = body.to_string();
        let (tx, requests) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]);
                let _ = tx.send(head.lines().next().unwrap_or_default().to_string());

                let resp = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        MockAgent {
            url,
            requests,
            handle,
        }
    }

    /// Returns a URL on which nothing is listening.
    async fn unreachable_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn get_memory_stats_decodes_envelope() {
        let json = r#"{"code":0,"message":"success","data":{
            "totalAllocCount":120,"totalAllocSize":40960,
            "totalFreeCount":100,"totalFreeSize":32768,
            "currentAllocCount":20,"currentAllocSize":8192}}"#;
        let mut agent = mock_server(200, json).await;

        let client = Client::new(&agent.url).unwrap();
        let stats = client.get_memory_stats().await.unwrap();

        assert_eq!(stats.total_alloc_count, 120);
        assert_eq!(stats.current_alloc_size, 8192);
        assert_eq!(agent.requests.recv().await.unwrap(), "GET /api/stats HTTP/1.1");
    }

    #[tokio::test]
    async fn get_leaks_returns_groups() {
        let json = r#"{"code":0,"message":"success","data":[
            {"count":3,"totalSize":96,"backtrace":["a","b"]}]}"#;
        let agent = mock_server(200, json).await;

        let client = Client::new(&agent.url).unwrap();
        let leaks = client.get_leaks().await.unwrap();

        assert_eq!(
            leaks,
            vec![LeakGroup {
                backtrace: vec!["a".into(), "b".into()],
                count: 3,
                total_size: 96,
            }]
        );
    }

    #[tokio::test]
    async fn get_fd_stats_and_leaks() {
        let stats_json = r#"{"code":0,"message":"success","data":
            {"totalOpenCount":9,"totalCloseCount":7,"currentOpenCount":2}}"#;
        let agent = mock_server(200, stats_json).await;
        let client = Client::new(&agent.url).unwrap();
        let stats = client.get_fd_stats().await.unwrap();
        assert_eq!(stats.current_open_count, 2);

        let leaks_json = r#"{"code":0,"message":"success","data":[
            {"fd":12.0,"path":"/sdcard/a.txt","flags":577.0}]}"#;
        let agent = mock_server(200, leaks_json).await;
        client.set_endpoint(&agent.url).unwrap();
        let leaks = client.get_fd_leaks().await.unwrap();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].fd, 12);
        assert_eq!(leaks[0].path, "/sdcard/a.txt");
    }

    #[tokio::test]
    async fn leak_report_is_text() {
        let json = r#"{"code":0,"message":"success","data":"=== Leak Report ===\n2 leaks"}"#;
        let mut agent = mock_server(200, json).await;

        let client = Client::new(&agent.url).unwrap();
        let report = client.get_fd_leak_report().await.unwrap();

        assert!(report.starts_with("=== Leak Report ==="));
        assert_eq!(
            agent.requests.recv().await.unwrap(),
            "GET /api/fd-leak-report HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn reset_posts() {
        let json = r#"{"code":0,"message":"success","data":{"message":"Statistics reset successfully"}}"#;
        let mut agent = mock_server(200, json).await;

        let client = Client::new(&agent.url).unwrap();
        client.reset_stats().await.unwrap();

        assert_eq!(agent.requests.recv().await.unwrap(), "POST /api/reset HTTP/1.1");
    }

    #[tokio::test]
    async fn reset_accepts_null_data() {
        let agent = mock_server(200, r#"{"code":0,"message":"success","data":null}"#).await;
        let client = Client::new(&agent.url).unwrap();
        assert!(client.reset_stats().await.is_ok());
    }

    #[tokio::test]
    async fn error_envelope_is_agent_error() {
        let json = r#"{"code":500,"message":"Internal Server Error: native crash","data":null}"#;
        let agent = mock_server(500, json).await;

        let client = Client::new(&agent.url).unwrap();
        let err = client.get_memory_stats().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Agent);
        assert!(err.to_string().contains("native crash"), "{err}");
    }

    #[tokio::test]
    async fn nonzero_code_in_ok_response_is_agent_error() {
        let agent = mock_server(200, r#"{"code":7,"message":"hook not installed","data":null}"#).await;
        let client = Client::new(&agent.url).unwrap();
        let err = client.get_leaks().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Agent);
    }

    #[tokio::test]
    async fn plain_text_404_is_protocol_error() {
        let agent = mock_server(404, "Not Found").await;

        let client = Client::new(&agent.url).unwrap();
        let err = client.get_fd_stats().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("404"), "{err}");
    }

    #[tokio::test]
    async fn html_error_page_is_truncated() {
        let page = format!(
            "<html><body>{}</body></html>\n<p>second line</p>",
            "x".repeat(1000)
        );
        let agent = mock_server(502, &page).await;

        let client = Client::new(&agent.url).unwrap();
        let err = client.get_memory_stats().await.unwrap_err();

        let Error::Status { status, body } = &err else {
            panic!("expected status error, got {err:?}");
        };
        assert_eq!(*status, 502);
        assert_eq!(body.len(), MAX_ERROR_BODY + 3);
        assert!(body.starts_with("<html><body>xxx"));
        assert!(body.ends_with("..."));
        assert!(!err.to_string().contains("second line"));
    }

    #[test]
    fn error_excerpt_respects_char_boundaries() {
        let body = "é".repeat(150);
        let excerpt = error_excerpt(body.as_bytes());
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.len() <= MAX_ERROR_BODY + 3);

        assert_eq!(error_excerpt(b"\n  Not Found  \nmore"), "Not Found");
        assert_eq!(error_excerpt(b""), "");
    }

    #[tokio::test]
    async fn malformed_body_is_protocol_error() {
        let agent = mock_server(200, "<html>captive portal</html>").await;
        let client = Client::new(&agent.url).unwrap();
        let err = client.get_memory_stats().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn wrong_payload_shape_is_protocol_error() {
        let agent = mock_server(200, r#"{"code":0,"message":"success","data":{"oops":1}}"#).await;
        let client = Client::new(&agent.url).unwrap();
        let err = client.get_leaks().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = Client::new(&unreachable_url().await).unwrap();
        let err = client.get_memory_stats().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn malformed_url_fails_on_call_not_on_set() {
        let client = Client::with_default_endpoint().unwrap();
        client.set_endpoint("not a url").unwrap();
        assert_eq!(client.endpoint(), "not a url");

        let err = client.get_memory_stats().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn silent_agent_times_out_as_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            // Accept and hold the connection without answering.
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = Client::with_timeout(&url, Duration::from_millis(200));
        let err = client.get_leaks().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.is_timeout());
        handle.abort();
    }

    #[tokio::test]
    async fn health_check_ok() {
        let agent = mock_server(
            200,
            r#"{"code":0,"message":"success","data":{"status":"ok","timestamp":1700000000000}}"#,
        )
        .await;
        let client = Client::new(&agent.url).unwrap();
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn health_check_false_on_every_failure() {
        let client = Client::new(&unreachable_url().await).unwrap();
        assert!(!client.health_check().await);

        let agent = mock_server(200, "garbage").await;
        client.set_endpoint(&agent.url).unwrap();
        assert!(!client.health_check().await);

        let agent = mock_server(200, r#"{"code":0,"message":"success","data":{"status":"down"}}"#).await;
        client.set_endpoint(&agent.url).unwrap();
        assert!(!client.health_check().await);
    }

    #[test]
    fn set_endpoint_rejects_empty() {
        let client = Client::new("http://10.0.0.5:9090").unwrap();
        let err = client.set_endpoint("   ").unwrap_err();
        assert!(matches!(err, Error::EmptyEndpoint));
        assert_eq!(client.endpoint(), "http://10.0.0.5:9090");
    }

    #[test]
    fn new_rejects_empty() {
        assert!(matches!(Client::new(""), Err(Error::EmptyEndpoint)));
    }

    #[test]
    fn endpoint_trailing_slash_trimmed() {
        let client = Client::new("http://localhost:8080/").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080");
        assert_eq!(client.url_for(Route::Health), "http://localhost:8080/api/health");
    }
}
