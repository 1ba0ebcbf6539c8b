use std::time::Duration;

use chrono::Utc;
use httpmock::prelude::*;
use serde_json::json;
use signaldesk::payments::{process_sweep, HttpPaymentVerifier};
use signaldesk::usage::ledger;
use sqlx::PgPool;
use uuid::Uuid;

fn verifier_for(server: &MockServer) -> HttpPaymentVerifier {
    HttpPaymentVerifier::new(server.base_url(), Duration::from_secs(5), None)
}

async fn seed_user(pool: &PgPool, email: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO profiles (email, password_hash, plan_code, subscription_status) VALUES ($1, 'hashed', 'free', 'active') RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_pending_payment(pool: &PgPool, user_id: i32, plan_code: &str, provider_ref: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO payments (id, user_id, plan_code, amount_cents, status, provider_ref) VALUES ($1, $2, $3, 4900, 'pending', $4)",
    )
    .bind(id)
    .bind(user_id)
    .bind(plan_code)
    .bind(provider_ref)
    .execute(pool)
    .await
    .unwrap();
    id
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn confirmed_payment_activates_plan_and_grants_credits(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "buyer@example.com").await;
    let payment_id = seed_pending_payment(&pool, user_id, "pro", "ord_ok").await;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payments/ord_ok/status");
            then.status(200).json_body(json!({"status": "completed"}));
        })
        .await;

    let outcome = process_sweep(&pool, &verifier_for(&server), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome.checked, 1);
    assert_eq!(outcome.activated, 1);

    let status: String = sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "completed");

    let (plan_code, sub_status): (Option<String>, Option<String>) = sqlx::query_as(
        "SELECT plan_code, subscription_status FROM profiles WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(plan_code.as_deref(), Some("pro"));
    assert_eq!(sub_status.as_deref(), Some("active"));

    // Seeded pro plan grants 20 top-up credits on activation.
    assert_eq!(ledger::topup_balance(&pool, user_id).await.unwrap(), 20);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn verifier_pending_answer_leaves_payment_untouched(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "waiting@example.com").await;
    let payment_id = seed_pending_payment(&pool, user_id, "pro", "ord_wait").await;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payments/ord_wait/status");
            then.status(200).json_body(json!({"status": "pending"}));
        })
        .await;

    let outcome = process_sweep(&pool, &verifier_for(&server), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome.checked, 1);
    assert_eq!(outcome.activated, 0);

    let status: String = sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "pending");

    let plan_code: Option<String> =
        sqlx::query_scalar("SELECT plan_code FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(plan_code.as_deref(), Some("free"));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn rejected_payment_is_failed_without_profile_mutation(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "rejected@example.com").await;
    let payment_id = seed_pending_payment(&pool, user_id, "pro", "ord_bad").await;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payments/ord_bad/status");
            then.status(200).json_body(json!({"status": "cancelled"}));
        })
        .await;

    let outcome = process_sweep(&pool, &verifier_for(&server), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome.activated, 0);

    let status: String = sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "failed");

    let plan_code: Option<String> =
        sqlx::query_scalar("SELECT plan_code FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(plan_code.as_deref(), Some("free"));
    assert_eq!(ledger::topup_balance(&pool, user_id).await.unwrap(), 0);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn verifier_outage_leaves_payment_for_next_sweep(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "transient@example.com").await;
    let payment_id = seed_pending_payment(&pool, user_id, "pro", "ord_down").await;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payments/ord_down/status");
            then.status(503);
        })
        .await;

    let outcome = process_sweep(&pool, &verifier_for(&server), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome.checked, 1);
    assert_eq!(outcome.activated, 0);

    let status: String = sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "pending");
}
