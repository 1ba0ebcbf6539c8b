use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{extract::Extension, http::HeaderMap, http::StatusCode};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;
use tokio::sync::mpsc::{channel, Sender};
use tracing::{error, warn};

use crate::config;
use crate::error::{AppError, AppResult};
use crate::usage::Payment;

use super::sweep::reconcile_payment;
use super::verifier::PaymentVerifier;

type HmacSha256 = Hmac<Sha256>;

/// Gateway notifications are a hint to reconcile sooner, nothing more. The
/// payload's own status claims are ignored; the verifier remains the only
/// authority.
#[derive(Debug)]
pub enum ReconcileJob {
    Payment { provider_ref: String },
}

#[derive(Clone)]
pub struct ReconcileHandle {
    sender: Sender<ReconcileJob>,
}

impl ReconcileHandle {
    pub async fn dispatch(&self, job: ReconcileJob) -> Result<()> {
        self.sender
            .send(job)
            .await
            .map_err(|err| anyhow!("failed to enqueue reconciliation job: {err}"))
    }
}

pub fn start_reconcile_worker(pool: PgPool, verifier: Arc<dyn PaymentVerifier>) -> ReconcileHandle {
    let (tx, mut rx) = channel(64);
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                ReconcileJob::Payment { provider_ref } => {
                    let payment = sqlx::query_as::<_, Payment>(
                        "SELECT * FROM payments WHERE provider_ref = $1 AND status = 'pending'",
                    )
                    .bind(&provider_ref)
                    .fetch_optional(&pool)
                    .await;
                    match payment {
                        Ok(Some(payment)) => {
                            if let Err(err) =
                                reconcile_payment(&pool, verifier.as_ref(), &payment, Utc::now())
                                    .await
                            {
                                warn!(
                                    ?err,
                                    %provider_ref,
                                    "webhook-triggered reconciliation failed, sweep will retry"
                                );
                            }
                        }
                        Ok(None) => {
                            warn!(%provider_ref, "webhook referenced no pending payment");
                        }
                        Err(err) => {
                            error!(?err, %provider_ref, "failed to load payment for webhook");
                        }
                    }
                }
            }
        }
    });

    ReconcileHandle { sender: tx }
}

#[derive(Debug, Deserialize)]
pub struct GatewayWebhookRequest {
    pub event: String,
    pub provider_ref: String,
}

pub async fn gateway_webhook(
    Extension(handle): Extension<ReconcileHandle>,
    headers: HeaderMap,
    body: String,
) -> AppResult<StatusCode> {
    let secret = config::PAYMENT_WEBHOOK_SECRET
        .as_deref()
        .ok_or(AppError::Unauthorized)?;
    let signature = headers
        .get("x-gateway-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    verify_signature(secret, body.as_bytes(), signature)?;

    let payload: GatewayWebhookRequest = serde_json::from_str(&body)
        .map_err(|err| AppError::BadRequest(format!("malformed webhook payload: {err}")))?;

    match payload.event.as_str() {
        "payment.updated" | "payment.completed" | "payment.failed" => {
            handle
                .dispatch(ReconcileJob::Payment {
                    provider_ref: payload.provider_ref,
                })
                .await
                .map_err(|err| AppError::Message(err.to_string()))?;
            Ok(StatusCode::ACCEPTED)
        }
        _ => Ok(StatusCode::ACCEPTED),
    }
}

fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> AppResult<()> {
    let expected = hex::decode(signature_hex).map_err(|_| AppError::Unauthorized)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::Unauthorized)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| AppError::Unauthorized)?;
    Ok(())
}
