use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Path},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;

use crate::analytics;
use crate::config;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::usage::{Scan, UsageService, UsageSnapshot};

use super::orchestrator::{self, BatchOutcome};
use super::provider::AnalysisProvider;

static PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{2,12}(/[A-Za-z0-9]{2,12})?$").expect("pair regex"));

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub symbol: String,
    #[serde(default)]
    pub display_symbol: Option<String>,
    pub timeframe: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub signal: Scan,
    pub usage: UsageSnapshot,
}

pub async fn single_scan(
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn AnalysisProvider>>,
    user: AuthUser,
    Json(payload): Json<ScanRequest>,
) -> AppResult<Json<ScanResponse>> {
    let symbol = payload.symbol.trim();
    let timeframe = payload.timeframe.trim();
    if symbol.is_empty() || timeframe.is_empty() {
        return Err(AppError::BadRequest("symbol and timeframe are required".into()));
    }
    if !PAIR_RE.is_match(symbol) {
        return Err(AppError::BadRequest(format!("unrecognized symbol '{symbol}'")));
    }
    let display_symbol = payload
        .display_symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(symbol);

    let service = UsageService::new(pool.clone());
    let usage = service
        .get_usage(user.user_id)
        .await
        .map_err(|err| AppError::Message(err.to_string()))?;
    if !usage.can_scan {
        return Err(AppError::QuotaExceeded {
            reason: usage
                .scan_reason
                .clone()
                .unwrap_or_else(|| "Scan limit reached".to_string()),
            usage: Box::new(usage),
        });
    }
    let via_topup = usage.can_scan_via_topup;
    let credit_source = if via_topup { "topup" } else { "plan" };

    let signal = orchestrator::scan_single_pair(
        &pool,
        provider.as_ref(),
        user.user_id,
        symbol,
        display_symbol,
        timeframe,
        credit_source,
    )
    .await
    .map_err(|err| AppError::Provider(err.to_string()))?;

    service
        .record_scan(user.user_id, via_topup)
        .await
        .map_err(|err| {
            error!(?err, user_id = user.user_id, "failed to record scan consumption");
            AppError::Message("failed to record usage".into())
        })?;

    analytics::track_scan(&pool, user.user_id, symbol, timeframe);

    let usage = service
        .get_usage(user.user_id)
        .await
        .map_err(|err| AppError::Message(err.to_string()))?;
    Ok(Json(ScanResponse { signal, usage }))
}

#[derive(Debug, Deserialize)]
pub struct FullScanRequest {
    #[serde(default)]
    pub pairs: Option<Vec<String>>,
    #[serde(default)]
    pub timeframes: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct FullScanResponse {
    pub signals_generated: usize,
    pub signals: Vec<Scan>,
    pub failures: Vec<String>,
    pub usage: UsageSnapshot,
}

pub async fn full_scan(
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn AnalysisProvider>>,
    user: AuthUser,
    Json(payload): Json<FullScanRequest>,
) -> AppResult<Json<FullScanResponse>> {
    let service = UsageService::new(pool.clone());
    let plan = service
        .profile_with_plan(user.user_id)
        .await
        .map_err(|err| AppError::Message(err.to_string()))?
        .map(|(_, plan)| plan);
    match plan {
        Some(plan) if plan.full_scan => {}
        _ => return Err(AppError::Forbidden),
    }

    let usage = service
        .get_usage(user.user_id)
        .await
        .map_err(|err| AppError::Message(err.to_string()))?;
    if !usage.can_scan {
        return Err(AppError::QuotaExceeded {
            reason: usage
                .scan_reason
                .clone()
                .unwrap_or_else(|| "Scan limit reached".to_string()),
            usage: Box::new(usage),
        });
    }
    let via_topup = usage.can_scan_via_topup;
    let credit_source = if via_topup { "topup" } else { "plan" };

    let pairs = payload
        .pairs
        .filter(|pairs| !pairs.is_empty())
        .unwrap_or_else(|| config::TRACKED_PAIRS.clone());
    let timeframes = payload
        .timeframes
        .filter(|frames| !frames.is_empty())
        .unwrap_or_else(|| config::TRACKED_TIMEFRAMES.clone());
    for pair in &pairs {
        if !PAIR_RE.is_match(pair) {
            return Err(AppError::BadRequest(format!("unrecognized symbol '{pair}'")));
        }
    }

    let BatchOutcome {
        signals_generated,
        signals,
        failures,
    } = orchestrator::run_signal_scan(
        &pool,
        provider.as_ref(),
        user.user_id,
        &pairs,
        &timeframes,
        credit_source,
        Duration::from_secs(*config::FULL_SCAN_BUDGET_SECS),
    )
    .await;

    // One unit per usable signal; failed pairs consume nothing. Top-up draws
    // stop at the balance observed before the batch so the ledger never goes
    // negative.
    let mut to_consume = signals_generated;
    if via_topup {
        to_consume = to_consume.min(usage.topup_balance.max(0) as usize);
    }
    for _ in 0..to_consume {
        if let Err(err) = service.record_scan(user.user_id, via_topup).await {
            error!(?err, user_id = user.user_id, "failed to record batch consumption");
            break;
        }
    }

    analytics::track_scan(&pool, user.user_id, "full-market", "batch");

    let usage = service
        .get_usage(user.user_id)
        .await
        .map_err(|err| AppError::Message(err.to_string()))?;
    Ok(Json(FullScanResponse {
        signals_generated,
        signals,
        failures,
        usage,
    }))
}

pub async fn current_usage(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
) -> AppResult<Json<UsageSnapshot>> {
    let service = UsageService::new(pool);
    let usage = service
        .get_usage(user.user_id)
        .await
        .map_err(|err| AppError::Message(err.to_string()))?;
    Ok(Json(usage))
}

pub async fn list_scans(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
) -> AppResult<Json<Vec<Scan>>> {
    let scans = sqlx::query_as::<_, Scan>(
        "SELECT * FROM scans WHERE user_id = $1 ORDER BY created_at DESC LIMIT 50",
    )
    .bind(user.user_id)
    .fetch_all(&pool)
    .await?;
    Ok(Json(scans))
}

/// Unauthenticated; the share id is the only access control.
pub async fn shared_signal(
    Extension(pool): Extension<PgPool>,
    Path(share_id): Path<String>,
) -> AppResult<Json<Scan>> {
    let scan = sqlx::query_as::<_, Scan>("SELECT * FROM scans WHERE share_id = $1")
        .bind(share_id)
        .fetch_optional(&pool)
        .await?;
    scan.map(Json).ok_or(AppError::NotFound)
}
