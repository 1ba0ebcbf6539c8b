use std::sync::Arc;

use axum::{extract::Extension, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::usage::{ledger, Payment, Plan};

use super::sweep::{process_sweep, SweepOutcome};
use super::verifier::PaymentVerifier;

pub async fn list_plans(Extension(pool): Extension<PgPool>) -> AppResult<Json<Vec<Plan>>> {
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE active ORDER BY price_cents ASC",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(plans))
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub plan_code: String,
    /// Reference handed out by the gateway checkout. Recorded verbatim; the
    /// sweep asks the gateway what actually happened to it.
    pub provider_ref: String,
}

pub async fn create_payment(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<Json<Payment>> {
    let provider_ref = payload.provider_ref.trim();
    if provider_ref.is_empty() {
        return Err(AppError::BadRequest("provider_ref is required".into()));
    }

    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE code = $1 AND active")
        .bind(payload.plan_code.trim())
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::BadRequest("unknown plan".into()))?;

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (id, user_id, plan_code, amount_cents, currency, status, provider_ref)
        VALUES ($1, $2, $3, $4, 'USD', 'pending', $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&plan.code)
    .bind(plan.price_cents)
    .bind(provider_ref)
    .fetch_one(&pool)
    .await?;

    Ok(Json(payment))
}

pub async fn verify_payments(
    Extension(pool): Extension<PgPool>,
    Extension(verifier): Extension<Arc<dyn PaymentVerifier>>,
    user: AuthUser,
) -> AppResult<Json<SweepOutcome>> {
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    let outcome = process_sweep(&pool, verifier.as_ref(), Utc::now())
        .await
        .map_err(|err| AppError::Message(err.to_string()))?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct GiftTrialRequest {
    pub user_id: i32,
    pub days: i64,
    #[serde(default)]
    pub plan_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GiftTrialResponse {
    pub user_id: i32,
    pub plan_code: String,
    pub expires_at: chrono::DateTime<Utc>,
}

pub async fn gift_trial(
    Extension(pool): Extension<PgPool>,
    admin: AuthUser,
    Json(payload): Json<GiftTrialRequest>,
) -> AppResult<Json<GiftTrialResponse>> {
    if !admin.is_admin() {
        return Err(AppError::Forbidden);
    }
    if payload.days <= 0 {
        return Err(AppError::BadRequest("days must be positive".into()));
    }

    let plan_code = payload.plan_code.as_deref().unwrap_or("pro");
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE code = $1 AND active")
        .bind(plan_code)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::BadRequest("unknown plan".into()))?;

    let expires_at = Utc::now() + Duration::days(payload.days);
    let updated = sqlx::query(
        r#"
        UPDATE profiles
        SET plan_code = $1, subscription_status = 'trialing', subscription_ends_at = $2
        WHERE id = $3
        "#,
    )
    .bind(&plan.code)
    .bind(expires_at)
    .bind(payload.user_id)
    .execute(&pool)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    // Zero-amount entry keeps an audit trail without minting credit.
    ledger::record_admin_grant(
        &pool,
        payload.user_id,
        0,
        &format!("{}-day {} trial gifted", payload.days, plan.name),
        &format!("admin:{}", admin.user_id),
    )
    .await
    .map_err(|err| AppError::Message(err.to_string()))?;

    Ok(Json(GiftTrialResponse {
        user_id: payload.user_id,
        plan_code: plan.code,
        expires_at,
    }))
}
