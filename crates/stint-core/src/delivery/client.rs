//! Timing submission client
//!
//! One POST per call, no retries. The response is never inspected: the
//! endpoint is treated as fire-and-forget, so `success` means the request was
//! dispatched without a transport error, not that the server stored it. A
//! record the server silently drops is reported as sent.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::config::StintConfig;
use crate::constants::delivery::RECORD_TIMING_ACTION;
use crate::error::{TimingError, TimingResult};
use crate::timing::TimingRecord;

/// Result of a single send attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Somewhere timing records can be delivered
///
/// Implementations make exactly one attempt and never panic or return errors;
/// failures are reported through [`SendOutcome`].
#[async_trait]
pub trait TimingSink: Send + Sync {
    async fn send(&self, record: &TimingRecord) -> SendOutcome;
}

#[derive(Serialize)]
struct Envelope<'a> {
    action: &'static str,
    data: &'a TimingRecord,
}

/// Posts `{"action": "recordTiming", "data": ...}` to a configured endpoint
pub struct HttpSubmissionClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpSubmissionClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &StintConfig) -> Self {
        Self::new(config.endpoint_url.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn dispatch(&self, record: &TimingRecord) -> TimingResult<()> {
        let body = serde_json::to_vec(&Envelope {
            action: RECORD_TIMING_ACTION,
            data: record,
        })
        .map_err(|e| TimingError::Transport(format!("Failed to encode record: {}", e)))?;

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        tracing::debug!(
            session_id = %record.session_id,
            status = response.status().as_u16(),
            "Timing request dispatched, response ignored"
        );
        Ok(())
    }
}

#[async_trait]
impl TimingSink for HttpSubmissionClient {
    async fn send(&self, record: &TimingRecord) -> SendOutcome {
        match self.dispatch(record).await {
            Ok(()) => {
                tracing::info!(session_id = %record.session_id, "Timing data sent");
                SendOutcome::sent()
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %record.session_id,
                    endpoint = %self.endpoint,
                    error = %e,
                    "Failed to send timing data"
                );
                SendOutcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::mpsc;
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::timing::{DeviceInfo, RecordBuilder};

    fn record() -> TimingRecord {
        let start = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        RecordBuilder::default().build(
            "survey_1_abcdefgh",
            start,
            start + chrono::Duration::seconds(125),
            Some("ana@example.com"),
            &DeviceInfo::default(),
        )
    }

    struct Captured {
        method: String,
        content_type: Option<String>,
        body: String,
    }

    /// One-shot local server answering with `status`
    fn serve_once(status: u16) -> (String, mpsc::Receiver<Captured>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("Failed to bind test server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("Test server has no IP address")
            .port();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            if let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(10)) {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let content_type = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Content-Type"))
                    .map(|h| h.value.as_str().to_string());
                let _ = tx.send(Captured {
                    method: request.method().as_str().to_string(),
                    content_type,
                    body,
                });
                let _ = request
                    .respond(tiny_http::Response::from_string("nope").with_status_code(status));
            }
        });

        (format!("http://127.0.0.1:{}/exec", port), rx)
    }

    #[tokio::test]
    async fn test_posts_wrapped_record() {
        let (url, rx) = serve_once(200);
        let client = HttpSubmissionClient::new(url);

        let outcome = client.send(&record()).await;
        assert_eq!(outcome, SendOutcome::sent());

        let captured = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(captured.method, "POST");
        assert_eq!(captured.content_type.as_deref(), Some("application/json"));

        let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(body["action"], "recordTiming");
        assert_eq!(body["data"]["sessionId"], "survey_1_abcdefgh");
        assert_eq!(body["data"]["timeTakenSeconds"], 125);
    }

    #[tokio::test]
    async fn test_server_error_status_still_counts_as_sent() {
        let (url, _rx) = serve_once(500);
        let client = HttpSubmissionClient::new(url);

        let outcome = client.send(&record()).await;
        assert!(outcome.success);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = HttpSubmissionClient::new(format!("http://127.0.0.1:{}/exec", port));
        let outcome = client.send(&record()).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_invalid_url_fails() {
        let client = HttpSubmissionClient::new("not a url");
        let outcome = client.send(&record()).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("transport error"));
    }
}
