use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::CreditEntry;

/// Remaining top-up balance for a user, derived by summing the ledger.
/// Errors propagate to the caller, which must fail closed (deny top-up
/// scans rather than assume credit exists).
pub async fn topup_balance(pool: &PgPool, user_id: i32) -> Result<i64> {
    let balance: Option<i64> =
        sqlx::query_scalar("SELECT SUM(amount)::BIGINT FROM credit_ledger WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(balance.unwrap_or(0))
}

pub async fn record_purchase(
    pool: &PgPool,
    user_id: i32,
    amount: i64,
    description: &str,
) -> Result<CreditEntry> {
    append(pool, user_id, amount, "purchase", description, "system").await
}

/// Consumes exactly one top-up unit. Callers check the balance first;
/// the ledger itself does not reject overdrafts.
pub async fn record_consumption(pool: &PgPool, user_id: i32, description: &str) -> Result<CreditEntry> {
    append(pool, user_id, -1, "consumption", description, "system").await
}

/// Zero-amount entries are allowed; gift-trial grants use one as an audit trail.
pub async fn record_admin_grant(
    pool: &PgPool,
    user_id: i32,
    amount: i64,
    description: &str,
    actor: &str,
) -> Result<CreditEntry> {
    append(pool, user_id, amount, "admin_grant", description, actor).await
}

async fn append(
    pool: &PgPool,
    user_id: i32,
    amount: i64,
    kind: &str,
    description: &str,
    actor: &str,
) -> Result<CreditEntry> {
    let entry = sqlx::query_as::<_, CreditEntry>(
        r#"
        INSERT INTO credit_ledger (id, user_id, amount, kind, description, actor)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(amount)
    .bind(kind)
    .bind(description)
    .bind(actor)
    .fetch_one(pool)
    .await?;

    Ok(entry)
}
