//! Outbound message delivery
//!
//! Provides a `MessageSender` trait with implementations for:
//! - **HTTP**: one form POST per message to the configured endpoint
//! - **Simulate**: records the message without any network call
//!
//! A non-success HTTP status is not an error: it is reported as
//! `SendOutcome::Rejected` so the caller can log it and carry on.
//! Transport failures are errors.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::DeliveryConfig;

// ============================================================================
// MessageSender trait
// ============================================================================

/// One message addressed to a remote thread.
#[derive(Debug, Clone, Copy)]
pub struct OutboundMessage<'a> {
    pub credential: &'a str,
    pub target: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered { code: u16 },
    Rejected { code: u16, detail: String },
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

/// Abstraction over delivery backends.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: OutboundMessage<'_>) -> Result<SendOutcome, SendError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum SendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No delivery endpoint configured")]
    MissingEndpoint,

    #[error("Unknown delivery backend: {0}")]
    UnknownBackend(String),
}

/// Create the sender selected by `config.backend`.
pub fn create_sender(config: &DeliveryConfig) -> Result<Box<dyn MessageSender>, SendError> {
    match config.backend.as_str() {
        "http" => Ok(Box::new(HttpSender::new(
            config.endpoint.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )?)),
        "simulate" => Ok(Box::new(SimulatedSender)),
        other => Err(SendError::UnknownBackend(other.to_string())),
    }
}

// ============================================================================
// HttpSender
// ============================================================================

/// Posts `access_token` and `message` as form fields to the endpoint.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: Client,
    endpoint: String,
}

impl HttpSender {
    /// `endpoint` may contain `{target}`, replaced per message.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, SendError> {
        if endpoint.trim().is_empty() {
            return Err(SendError::MissingEndpoint);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, endpoint })
    }

    pub fn url_for(&self, target: &str) -> String {
        self.endpoint.replace("{target}", target)
    }
}

#[async_trait]
impl MessageSender for HttpSender {
    async fn send(&self, message: OutboundMessage<'_>) -> Result<SendOutcome, SendError> {
        let url = self.url_for(message.target);
        let response = self
            .client
            .post(&url)
            .form(&[("access_token", message.credential), ("message", message.body)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(SendOutcome::Delivered {
                code: status.as_u16(),
            });
        }

        let detail = response.text().await.unwrap_or_default();
        tracing::warn!(code = status.as_u16(), thread = %message.target, "Delivery rejected");
        Ok(SendOutcome::Rejected {
            code: status.as_u16(),
            detail,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// SimulatedSender
// ============================================================================

/// Accepts every message without sending it anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSender;

#[async_trait]
impl MessageSender for SimulatedSender {
    async fn send(&self, message: OutboundMessage<'_>) -> Result<SendOutcome, SendError> {
        tracing::debug!(thread = %message.target, body = %message.body, "Simulated delivery");
        Ok(SendOutcome::Delivered { code: 200 })
    }

    fn name(&self) -> &str {
        "simulate"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message<'a>(body: &'a str) -> OutboundMessage<'a> {
        OutboundMessage {
            credential: "tok-123",
            target: "t_42",
            body,
        }
    }

    #[tokio::test]
    async fn test_http_sender_posts_form_to_target_url() {
        let mock_server = MockServer::start().await;
        let sender = HttpSender::new(
            format!("{}/threads/{{target}}/messages", mock_server.uri()),
            Duration::from_secs(5),
        )
        .expect("Failed to create sender");

        Mock::given(method("POST"))
            .and(path("/threads/t_42/messages"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("access_token=tok-123"))
            .and(body_string_contains("message=hello"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = sender.send(message("hello")).await.unwrap();
        assert_eq!(outcome, SendOutcome::Delivered { code: 200 });
    }

    #[tokio::test]
    async fn test_http_sender_reports_non_success_as_rejected() {
        let mock_server = MockServer::start().await;
        let sender = HttpSender::new(mock_server.uri(), Duration::from_secs(5)).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid token"))
            .mount(&mock_server)
            .await;

        let outcome = sender.send(message("hello")).await.unwrap();
        match outcome {
            SendOutcome::Rejected { code, detail } => {
                assert_eq!(code, 400);
                assert_eq!(detail, "invalid token");
            }
            other => panic!("Expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_sender_transport_failure_is_error() {
        // Nothing listens on port 9 (discard) on test hosts
        let sender = HttpSender::new(
            "http://127.0.0.1:9/{target}".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();

        let result = sender.send(message("hello")).await;
        assert!(matches!(result, Err(SendError::Http(_))));
    }

    #[test]
    fn test_http_sender_requires_endpoint() {
        let result = HttpSender::new("  ".to_string(), Duration::from_secs(1));
        assert!(matches!(result, Err(SendError::MissingEndpoint)));
    }

    #[test]
    fn test_url_template_substitution() {
        let sender = HttpSender::new(
            "https://chat.example/v1/t_{target}/".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(sender.url_for("99"), "https://chat.example/v1/t_99/");
    }

    #[tokio::test]
    async fn test_simulated_sender_always_delivers() {
        let sender = SimulatedSender;
        let outcome = sender.send(message("anything")).await.unwrap();
        assert!(outcome.is_delivered());
        assert_eq!(sender.name(), "simulate");
    }

    #[test]
    fn test_create_sender_selects_backend() {
        let mut config = DeliveryConfig::default();
        assert_eq!(create_sender(&config).unwrap().name(), "simulate");

        config.backend = "http".to_string();
        assert!(matches!(create_sender(&config), Err(SendError::MissingEndpoint)));

        config.endpoint = "http://localhost:1/{target}".to_string();
        assert_eq!(create_sender(&config).unwrap().name(), "http");

        config.backend = "carrier-pigeon".to_string();
        assert!(matches!(create_sender(&config), Err(SendError::UnknownBackend(_))));
    }
}
