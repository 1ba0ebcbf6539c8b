use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config;

/// Canonical shape a raw provider response is mapped into before anything
/// else in the system sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub trend: String,
    pub bias: String,
    pub confidence: f64,
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub annotations: Vec<String>,
    pub chart_url: Option<String>,
}

/// Seam to the external chart-analysis provider. One call per pair/timeframe,
/// no retries; a timeout is surfaced as an error.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyse(&self, pair: &str, timeframe: &str) -> Result<AnalysisResult>;
}

pub struct HttpChartAnalyst {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpChartAnalyst {
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
            config::ANALYSIS_PROVIDER_ENDPOINT.clone(),
            Duration::from_secs(*config::ANALYSIS_TIMEOUT_SECS),
            config::ANALYSIS_PROVIDER_TOKEN.clone(),
        )
    }
}

#[derive(Debug, Serialize)]
struct AnalyseRequest<'a> {
    pair: &'a str,
    timeframe: &'a str,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    trend: Option<String>,
    bias: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    support: Vec<f64>,
    #[serde(default)]
    resistance: Vec<f64>,
    entry: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    #[serde(default)]
    annotations: Vec<String>,
    chart_url: Option<String>,
}

#[async_trait]
impl AnalysisProvider for HttpChartAnalyst {
    async fn analyse(&self, pair: &str, timeframe: &str) -> Result<AnalysisResult> {
        let url = format!("{}/v1/analyse", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .json(&AnalyseRequest { pair, timeframe });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| anyhow!("analysis provider unreachable: {err}"))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "analysis provider returned {} for {pair} {timeframe}",
                response.status()
            ));
        }
        let raw: RawAnalysis = response
            .json()
            .await
            .map_err(|err| anyhow!("analysis provider payload malformed: {err}"))?;

        normalize(raw)
    }
}

/// A response without a trend carries no usable signal and is treated as a
/// provider failure, so no usage is consumed for it.
fn normalize(raw: RawAnalysis) -> Result<AnalysisResult> {
    let trend = raw
        .trend
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("analysis provider returned no trend"))?;
    let bias = raw
        .bias
        .map(|b| b.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "neutral".to_string());
    let confidence = raw.confidence.unwrap_or(0.0).clamp(0.0, 100.0);

    Ok(AnalysisResult {
        trend,
        bias,
        confidence,
        support: raw.support,
        resistance: raw.resistance,
        entry: raw.entry,
        stop_loss: raw.stop_loss,
        take_profit: raw.take_profit,
        annotations: raw.annotations,
        chart_url: raw.chart_url,
    })
}
