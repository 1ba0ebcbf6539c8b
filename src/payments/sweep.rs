use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::time::{self, Duration as TokioDuration};
use tracing::{info, warn};

use crate::config;
use crate::usage::{ledger, Payment, Plan};

use super::verifier::{PaymentVerifier, VerifierStatus};

#[derive(Debug, Default, Serialize)]
pub struct SweepOutcome {
    pub checked: usize,
    pub activated: usize,
}

/// Spawns the periodic reconciliation sweep.
pub fn spawn(pool: PgPool, verifier: Arc<dyn PaymentVerifier>) {
    let interval = TokioDuration::from_secs(*config::PAYMENT_SWEEP_INTERVAL_SECS);
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        loop {
            ticker.tick().await;
            match process_sweep(&pool, verifier.as_ref(), Utc::now()).await {
                Ok(outcome) if outcome.checked > 0 => {
                    info!(
                        checked = outcome.checked,
                        activated = outcome.activated,
                        "payment reconciliation sweep finished"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!(?err, "payment reconciliation sweep failed"),
            }
        }
    });
}

/// Iterates pending payments and asks the verifier for authoritative status.
/// Activation happens only on external confirmation, never from local state
/// alone. A verifier error leaves the payment pending for the next sweep.
pub async fn process_sweep(
    pool: &PgPool,
    verifier: &dyn PaymentVerifier,
    now: DateTime<Utc>,
) -> Result<SweepOutcome> {
    let pending = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE status = 'pending' ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut outcome = SweepOutcome {
        checked: pending.len(),
        activated: 0,
    };

    for payment in pending {
        match reconcile_payment(pool, verifier, &payment, now).await {
            Ok(true) => outcome.activated += 1,
            Ok(false) => {}
            Err(err) => warn!(
                ?err,
                payment = %payment.id,
                provider_ref = %payment.provider_ref,
                "payment left pending, verifier unavailable"
            ),
        }
    }

    Ok(outcome)
}

/// Reconciles one payment against the verifier. Returns whether it was
/// activated. A `Pending` answer leaves the row untouched.
pub async fn reconcile_payment(
    pool: &PgPool,
    verifier: &dyn PaymentVerifier,
    payment: &Payment,
    now: DateTime<Utc>,
) -> Result<bool> {
    match verifier.verify(&payment.provider_ref).await? {
        VerifierStatus::Completed => {
            activate(pool, payment, now).await?;
            info!(
                payment = %payment.id,
                user_id = payment.user_id,
                plan = %payment.plan_code,
                "payment confirmed and activated"
            );
            Ok(true)
        }
        VerifierStatus::Pending => Ok(false),
        VerifierStatus::Failed => {
            sqlx::query("UPDATE payments SET status = 'failed', updated_at = NOW() WHERE id = $1")
                .bind(payment.id)
                .execute(pool)
                .await?;
            info!(payment = %payment.id, "payment rejected by verifier");
            Ok(false)
        }
    }
}

async fn activate(pool: &PgPool, payment: &Payment, now: DateTime<Utc>) -> Result<()> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE code = $1")
        .bind(&payment.plan_code)
        .fetch_one(pool)
        .await?;

    let ends_at = now + Duration::days(30);
    sqlx::query(
        r#"
        UPDATE profiles
        SET plan_code = $1, subscription_status = 'active', subscription_ends_at = $2
        WHERE id = $3
        "#,
    )
    .bind(&plan.code)
    .bind(ends_at)
    .bind(payment.user_id)
    .execute(pool)
    .await?;

    if plan.topup_grant > 0 {
        ledger::record_purchase(
            pool,
            payment.user_id,
            plan.topup_grant,
            &format!("{} plan activation grant", plan.name),
        )
        .await?;
    }

    sqlx::query("UPDATE payments SET status = 'completed', updated_at = NOW() WHERE id = $1")
        .bind(payment.id)
        .execute(pool)
        .await?;

    Ok(())
}
