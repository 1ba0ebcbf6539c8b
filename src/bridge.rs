use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

/// Capability interface to the remote browser-automation trade bridge. The
/// bridge is an out-of-process collaborator; its internals are not modeled
/// here, only connect/execute/disconnect by session id.
#[async_trait]
pub trait TradeBridge: Send + Sync {
    async fn connect(&self, credentials: BridgeCredentials) -> Result<String>;
    async fn execute(&self, session_id: &str, order: Value) -> Result<Value>;
    async fn disconnect(&self, session_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeCredentials {
    pub login: String,
    pub password: String,
    pub server: String,
}

pub struct HttpTradeBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTradeBridge {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            config::TRADE_BRIDGE_ENDPOINT.clone(),
            Duration::from_secs(*config::TRADE_BRIDGE_TIMEOUT_SECS),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    session_id: String,
}

#[async_trait]
impl TradeBridge for HttpTradeBridge {
    async fn connect(&self, credentials: BridgeCredentials) -> Result<String> {
        let url = format!("{}/v1/sessions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&credentials)
            .send()
            .await
            .map_err(|err| anyhow!("trade bridge unreachable: {err}"))?;
        if !response.status().is_success() {
            return Err(anyhow!("trade bridge refused connection: {}", response.status()));
        }
        let body: ConnectResponse = response
            .json()
            .await
            .map_err(|err| anyhow!("trade bridge payload malformed: {err}"))?;
        Ok(body.session_id)
    }

    async fn execute(&self, session_id: &str, order: Value) -> Result<Value> {
        let url = format!("{}/v1/sessions/{}/orders", self.base_url, session_id);
        let response = self
            .client
            .post(&url)
            .json(&order)
            .send()
            .await
            .map_err(|err| anyhow!("trade bridge unreachable: {err}"))?;
        if !response.status().is_success() {
            return Err(anyhow!("order rejected by bridge: {}", response.status()));
        }
        response
            .json()
            .await
            .map_err(|err| anyhow!("trade bridge payload malformed: {err}"))
    }

    async fn disconnect(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/v1/sessions/{}", self.base_url, session_id);
        self.client
            .delete(&url)
            .send()
            .await
            .map_err(|err| anyhow!("trade bridge unreachable: {err}"))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ConnectEnvelope {
    pub session_id: String,
}

pub async fn connect(
    Extension(bridge): Extension<Arc<dyn TradeBridge>>,
    _user: AuthUser,
    Json(credentials): Json<BridgeCredentials>,
) -> AppResult<Json<ConnectEnvelope>> {
    let session_id = bridge
        .connect(credentials)
        .await
        .map_err(|err| AppError::Provider(err.to_string()))?;
    Ok(Json(ConnectEnvelope { session_id }))
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub session_id: String,
    pub order: Value,
}

pub async fn execute(
    Extension(bridge): Extension<Arc<dyn TradeBridge>>,
    _user: AuthUser,
    Json(payload): Json<ExecuteRequest>,
) -> AppResult<Json<Value>> {
    if payload.session_id.trim().is_empty() {
        return Err(AppError::BadRequest("session_id is required".into()));
    }
    let result = bridge
        .execute(&payload.session_id, payload.order)
        .await
        .map_err(|err| AppError::Provider(err.to_string()))?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct DisconnectRequest {
    pub session_id: String,
}

pub async fn disconnect(
    Extension(bridge): Extension<Arc<dyn TradeBridge>>,
    _user: AuthUser,
    Json(payload): Json<DisconnectRequest>,
) -> AppResult<axum::http::StatusCode> {
    bridge
        .disconnect(&payload.session_id)
        .await
        .map_err(|err| AppError::Provider(err.to_string()))?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
