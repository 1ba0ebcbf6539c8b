use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config;

/// Authoritative answer from the gateway's status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierStatus {
    Completed,
    Pending,
    Failed,
}

/// Seam to the external payment gateway. The gateway is the only source of
/// truth for payment state; client-reported success is never consulted.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, provider_ref: &str) -> Result<VerifierStatus>;
}

pub struct HttpPaymentVerifier {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPaymentVerifier {
    pub fn new(base_url: String, timeout: Duration, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            config::PAYMENT_VERIFIER_ENDPOINT.clone(),
            Duration::from_secs(30),
            config::PAYMENT_VERIFIER_TOKEN.clone(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[async_trait]
impl PaymentVerifier for HttpPaymentVerifier {
    async fn verify(&self, provider_ref: &str) -> Result<VerifierStatus> {
        let url = format!("{}/v1/payments/{}/status", self.base_url, provider_ref);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| anyhow!("payment verifier unreachable: {err}"))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "payment verifier returned {} for {provider_ref}",
                response.status()
            ));
        }
        let body: StatusResponse = response
            .json()
            .await
            .map_err(|err| anyhow!("payment verifier payload malformed: {err}"))?;

        Ok(parse_status(&body.status))
    }
}

fn parse_status(raw: &str) -> VerifierStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "completed" | "paid" | "success" | "succeeded" => VerifierStatus::Completed,
        "pending" | "processing" | "created" => VerifierStatus::Pending,
        _ => VerifierStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_covers_gateway_vocabulary() {
        assert_eq!(parse_status("paid"), VerifierStatus::Completed);
        assert_eq!(parse_status(" Completed "), VerifierStatus::Completed);
        assert_eq!(parse_status("processing"), VerifierStatus::Pending);
        assert_eq!(parse_status("cancelled"), VerifierStatus::Failed);
        assert_eq!(parse_status("refunded"), VerifierStatus::Failed);
    }
}
