use crate::domain::money::Amount;
use crate::domain::ports::PaymentProvider;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct ChargeRequest {
    amount: Amount,
}

/// Settlement provider reached over HTTP.
///
/// Posts `{"amount": ..}` to the endpoint. A 2xx answer approves the charge and a 4xx answer
/// declines it. A 5xx or 408 answer is `ProviderError::Rejected`, and a request that never gets an
/// answer is a transport error.
#[derive(Debug, Clone)]
pub struct HttpPaymentProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPaymentProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(Box::new(e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn process(&self, amount: Amount) -> Result<bool, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChargeRequest { amount })
            .send()
            .await
            .map_err(|e| ProviderError::Transport(Box::new(e)))?;

        let status = response.status();
        if status.is_success() {
            debug!(%amount, %status, "Provider approved charge");
            Ok(true)
        } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            warn!(%amount, %status, "Provider failed to process charge");
            Err(ProviderError::Rejected {
                status: status.as_u16(),
            })
        } else {
            warn!(%amount, %status, "Provider declined charge");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    use crate::application::provider_client::PaymentProviderClient;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one request with the given status line and returns the request body.
    async fn one_shot_server(
        status_line: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            let body = loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    let body = &text[split + 4..];
                    if body.len() >= length {
                        break body.to_string();
                    }
                }
                if n == 0 {
                    break String::new();
                }
            };
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            body
        });
        (format!("http://{addr}/process"), handle)
    }

    #[tokio::test]
    async fn test_success_status_approves() {
        let (url, server) = one_shot_server("200 OK").await;
        let provider = HttpPaymentProvider::new(url, Duration::from_secs(5)).unwrap();

        let approved = provider.process(Amount::new(dec!(42.5)).unwrap()).await.unwrap();
        assert!(approved);

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["amount"], "42.5");
    }

    #[tokio::test]
    async fn test_error_status_declines() {
        let (url, server) = one_shot_server("402 Payment Required").await;
        let provider = HttpPaymentProvider::new(url, Duration::from_secs(5)).unwrap();

        let approved = provider.process(Amount::new(dec!(10)).unwrap()).await.unwrap();
        assert!(!approved);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_declines_keep_breaker_closed() {
        let breaker = Arc::new(CircuitBreaker::new(
            "payment-provider",
            CircuitBreakerConfig::default(),
        ));

        for _ in 0..4 {
            let (url, server) = one_shot_server("402 Payment Required").await;
            let provider = HttpPaymentProvider::new(url, Duration::from_secs(5)).unwrap();
            let client = PaymentProviderClient::new(Box::new(provider), Arc::clone(&breaker));

            let approved = client.process(Amount::new(dec!(10)).unwrap()).await.unwrap();
            assert!(!approved);
            server.await.unwrap();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_server_error_and_timeout_statuses_are_rejections() {
        let cases = [("503 Service Unavailable", 503), ("408 Request Timeout", 408)];
        for (status_line, expected) in cases {
            let (url, server) = one_shot_server(status_line).await;
            let provider = HttpPaymentProvider::new(url, Duration::from_secs(5)).unwrap();

            let result = provider.process(Amount::new(dec!(10)).unwrap()).await;
            assert!(
                matches!(result, Err(ProviderError::Rejected { status }) if status == expected),
                "{status_line} should be a rejection"
            );
            server.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider =
            HttpPaymentProvider::new(format!("http://{addr}/process"), Duration::from_secs(2))
                .unwrap();
        let result = provider.process(Amount::new(dec!(10)).unwrap()).await;
        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }
}
