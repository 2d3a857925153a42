//! One-shot webhook POSTs.

use crate::error::{error_chain, DeliveryError, DeliveryResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("chathook-relay/", env!("CARGO_PKG_VERSION"));
/// Upper bound on how much of an error response body is kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

/// Result of exactly one POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The endpoint answered 2xx.
    Success { status: u16 },
    /// The endpoint answered with any other status.
    StatusError { status: u16 },
    /// No status was obtained (connect failure, timeout, TLS, I/O).
    NetworkError { reason: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }

    /// HTTP status, if the endpoint answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptOutcome::Success { status } | AttemptOutcome::StatusError { status } => {
                Some(*status)
            }
            AttemptOutcome::NetworkError { .. } => None,
        }
    }

    /// Short failure description used in delivery logs, `None` on success.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            AttemptOutcome::Success { .. } => None,
            AttemptOutcome::StatusError { status } => Some(format!("HTTP {status}")),
            AttemptOutcome::NetworkError { reason } => Some(reason.clone()),
        }
    }
}

/// Anything that can carry one serialized payload to an endpoint.
///
/// Implementations never panic and never return errors: every failure is
/// folded into [`AttemptOutcome`].
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, endpoint: &str, body: &str, timeout: Duration) -> AttemptOutcome;
}

/// HTTP client settings fixed for the client's lifetime.
#[derive(Debug, Clone)]
struct ClientSettings {
    connect_timeout: Duration,
    user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// reqwest-backed [`WebhookTransport`].
///
/// The underlying `reqwest::Client` is built on first use and shared by
/// every later attempt, so its connection pool is reused.
#[derive(Debug, Default)]
pub struct DeliveryClient {
    settings: ClientSettings,
    http: OnceCell<reqwest::Client>,
}

impl DeliveryClient {
    /// Whether the shared HTTP client has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.http.initialized()
    }

    async fn http(&self) -> DeliveryResult<&reqwest::Client> {
        self.http
            .get_or_try_init(|| async {
                debug!(
                    connect_timeout_ms = self.settings.connect_timeout.as_millis() as u64,
                    "Building shared webhook HTTP client"
                );
                reqwest::Client::builder()
                    .connect_timeout(self.settings.connect_timeout)
                    .user_agent(self.settings.user_agent.clone())
                    .build()
                    .map_err(|e| DeliveryError::ClientInit(e.to_string()))
            })
            .await
    }

    /// POST `body` once and return the 2xx status, or why it failed.
    pub async fn try_send(
        &self,
        endpoint: &str,
        body: &str,
        timeout: Duration,
    ) -> DeliveryResult<u16> {
        let client = self.http().await?;

        debug!(endpoint, bytes = body.len(), "Posting webhook payload");

        let response = client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body.to_owned())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_body(response, MAX_ERROR_BODY).await;
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(endpoint, status = status.as_u16(), "Webhook accepted payload");
        Ok(status.as_u16())
    }
}

/// Read at most `limit` bytes of a response body, chunk by chunk.
///
/// Stops as soon as the limit is reached, so a huge or never-ending body is
/// never buffered. Read errors end the body early.
async fn read_capped_body(mut response: reqwest::Response, limit: usize) -> String {
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    buf.truncate(limit);

    let valid = match std::str::from_utf8(&buf) {
        Ok(_) => buf.len(),
        // A character split by the limit is dropped.
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        Err(_) => buf.len(),
    };
    String::from_utf8_lossy(&buf[..valid]).into_owned()
}

#[async_trait]
impl WebhookTransport for DeliveryClient {
    async fn send(&self, endpoint: &str, body: &str, timeout: Duration) -> AttemptOutcome {
        match self.try_send(endpoint, body, timeout).await {
            Ok(status) => AttemptOutcome::Success { status },
            Err(err) => classify(&err, timeout),
        }
    }
}

/// Map a delivery error to the outcome recorded for the attempt.
pub fn classify(err: &DeliveryError, timeout: Duration) -> AttemptOutcome {
    match err {
        DeliveryError::Status { status, .. } => AttemptOutcome::StatusError { status: *status },
        DeliveryError::Network(inner) if inner.is_timeout() => AttemptOutcome::NetworkError {
            reason: format!("timed out after {}ms", timeout.as_millis()),
        },
        DeliveryError::Network(inner) => AttemptOutcome::NetworkError {
            reason: error_chain(inner),
        },
        DeliveryError::ClientInit(reason) => AttemptOutcome::NetworkError {
            reason: reason.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    struct CapturedRequest {
        head: String,
        body: String,
    }

    async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let body = String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string();
        Some(CapturedRequest { head, body })
    }

    /// Answer each connection with the next scripted status (200 once exhausted).
    async fn spawn_stub(statuses: Vec<u16>) -> (String, mpsc::UnboundedReceiver<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut statuses = statuses.into_iter();
            while let Ok((mut socket, _)) = listener.accept().await {
                let Some(request) = read_request(&mut socket).await else {
                    continue;
                };
                let status = statuses.next().unwrap_or(200);
                let _ = tx.send(request);
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-length: 4\r\nconnection: close\r\n\r\nstub"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/receive"), rx)
    }

    #[tokio::test]
    async fn posts_json_and_reports_success() {
        let (endpoint, mut requests) = spawn_stub(vec![200]).await;
        let client = DeliveryClient::default();
        let body = r#"{"id":"1","player":"Nova","message":"hi"}"#;

        let outcome = client.send(&endpoint, body, Duration::from_secs(5)).await;
        assert_eq!(outcome, AttemptOutcome::Success { status: 200 });

        let request = requests.recv().await.unwrap();
        assert!(request.head.starts_with("POST /receive HTTP/1.1"));
        assert!(request
            .head
            .to_ascii_lowercase()
            .contains("content-type: application/json"));
        assert_eq!(request.body, body);
    }

    #[tokio::test]
    async fn non_2xx_is_a_status_error() {
        let (endpoint, _requests) = spawn_stub(vec![503]).await;
        let client = DeliveryClient::default();

        let outcome = client.send(&endpoint, "{}", Duration::from_secs(5)).await;
        assert_eq!(outcome, AttemptOutcome::StatusError { status: 503 });
        assert_eq!(outcome.failure_reason().as_deref(), Some("HTTP 503"));
        assert_eq!(outcome.status(), Some(503));
    }

    #[tokio::test]
    async fn try_send_keeps_error_body() {
        let (endpoint, _requests) = spawn_stub(vec![500]).await;
        let client = DeliveryClient::default();

        let err = client
            .try_send(&endpoint, "{}", Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            DeliveryError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "stub");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Answer every request with `status`, the start of an oversized body,
    /// and then hold the connection open without finishing it.
    async fn spawn_endless_error(status: u16, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                if read_request(&mut socket).await.is_none() {
                    continue;
                }
                let head = format!("HTTP/1.1 {status} Stub\r\ncontent-length: 10000000\r\n\r\n");
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body.as_bytes()).await;
                held.push(socket);
            }
        });
        format!("http://{addr}/receive")
    }

    #[tokio::test]
    async fn error_body_is_capped_without_reading_it_all() {
        let endpoint = spawn_endless_error(502, "x".repeat(4096)).await;
        let client = DeliveryClient::default();

        let err = client
            .try_send(&endpoint, "{}", Duration::from_secs(10))
            .await
            .unwrap_err();
        match err {
            DeliveryError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "x".repeat(MAX_ERROR_BODY));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn capped_error_body_ends_on_a_char_boundary() {
        let body = format!("a{}", "é".repeat(600));
        let endpoint = spawn_endless_error(500, body).await;
        let client = DeliveryClient::default();

        let err = client
            .try_send(&endpoint, "{}", Duration::from_secs(10))
            .await
            .unwrap_err();
        match err {
            DeliveryError::Status { body, .. } => {
                assert_eq!(body.len(), MAX_ERROR_BODY - 1);
                assert_eq!(body, format!("a{}", "é".repeat(255)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unresponsive_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = DeliveryClient::default();
        let outcome = client
            .send(&format!("http://{addr}/"), "{}", Duration::from_millis(200))
            .await;
        assert_eq!(
            outcome,
            AttemptOutcome::NetworkError {
                reason: "timed out after 200ms".to_string()
            }
        );
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DeliveryClient::default();
        let outcome = client
            .send(&format!("http://{addr}/"), "{}", Duration::from_secs(2))
            .await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.status(), None);
        assert!(matches!(outcome, AttemptOutcome::NetworkError { .. }));
    }

    #[tokio::test]
    async fn http_client_is_built_once_and_shared() {
        let client = Arc::new(DeliveryClient::default());
        assert!(!client.is_initialized());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client.http().await.map(|http| http as *const reqwest::Client as usize)
            }));
        }

        let mut addresses = Vec::new();
        for handle in handles {
            addresses.push(handle.await.unwrap().unwrap());
        }
        addresses.dedup();
        assert_eq!(addresses.len(), 1);
        assert!(client.is_initialized());
    }

    #[test]
    fn outcome_reasons() {
        assert_eq!(AttemptOutcome::Success { status: 204 }.failure_reason(), None);
        assert_eq!(
            AttemptOutcome::NetworkError {
                reason: "connection refused".to_string()
            }
            .failure_reason()
            .as_deref(),
            Some("connection refused")
        );
    }

    #[test]
    fn client_init_failure_is_classified_as_network() {
        let err = DeliveryError::ClientInit("no TLS backend".to_string());
        assert_eq!(
            classify(&err, Duration::from_secs(1)),
            AttemptOutcome::NetworkError {
                reason: "no TLS backend".to_string()
            }
        );
    }
}
