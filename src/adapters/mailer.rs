use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::ports::{CodeSender, DeliveryError};

#[derive(Debug, Serialize)]
struct CodeMessage {
    email: String,
    otp: String,
}

/// Posts verification codes as `{ "email", "otp" }` to a delivery endpoint.
#[derive(Clone)]
pub struct HttpCodeSender {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpCodeSender {
    pub fn new(base_url: String) -> Self {
        Self::with_circuit_breaker(base_url, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HttpCodeSender {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }
}

#[async_trait]
impl CodeSender for HttpCodeSender {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), DeliveryError> {
        let url = self.base_url.clone();
        let client = self.client.clone();
        let body = CodeMessage {
            email: email.to_string(),
            otp: code.to_string(),
        };

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| DeliveryError::Request(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(DeliveryError::Rejected(response.status().as_u16()));
                }
                Ok(())
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(FailsafeError::Rejected) => Err(DeliveryError::CircuitOpen(
                "code delivery circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Writes codes to the log instead of sending them. For local runs only.
#[derive(Debug, Default, Clone)]
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), DeliveryError> {
        tracing::info!(email = %email, code = %code, "verification code issued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_creation() {
        let sender = HttpCodeSender::new("http://localhost:8025".to_string());
        assert_eq!(sender.base_url, "http://localhost:8025");
        assert_eq!(sender.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        assert!(LogCodeSender.send_code("a@example.com", "123456").await.is_ok());
    }
}
