use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use signaldesk::scan::{run_signal_scan, scan_single_pair, HttpChartAnalyst};
use sqlx::PgPool;

fn analyst_for(server: &MockServer) -> HttpChartAnalyst {
    HttpChartAnalyst::new(server.base_url(), Duration::from_secs(5), None)
}

async fn seed_user(pool: &PgPool, email: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO profiles (email, password_hash, subscription_status) VALUES ($1, 'hashed', 'active') RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn successful_scan_persists_a_record(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "scanner@example.com").await;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/analyse");
            then.status(200).json_body(json!({
                "trend": "Bullish",
                "bias": "long",
                "confidence": 72.5,
                "support": [1.071],
                "resistance": [1.084],
                "entry": 1.076,
                "stop_loss": 1.069,
                "take_profit": 1.089,
                "annotations": ["ema crossover"],
            }));
        })
        .await;

    let analyst = analyst_for(&server);
    let scan = scan_single_pair(&pool, &analyst, user_id, "EUR/USD", "EUR/USD", "H1", "plan")
        .await
        .unwrap();

    assert_eq!(scan.trend, "bullish");
    assert_eq!(scan.credit_source, "plan");
    assert_eq!(scan.share_id.len(), 12);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn provider_failure_leaves_no_scan_record(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "failed@example.com").await;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/analyse");
            then.status(500);
        })
        .await;

    let analyst = analyst_for(&server);
    let result = scan_single_pair(&pool, &analyst, user_id, "EUR/USD", "EUR/USD", "H1", "plan").await;
    assert!(result.is_err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn batch_scan_skips_failing_pairs(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "batch@example.com").await;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/analyse")
                .json_body_partial(r#"{"pair": "GBP/USD"}"#);
            then.status(502);
        })
        .await;
    for pair in ["EUR/USD", "USD/JPY"] {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/analyse")
                    .json_body_partial(format!(r#"{{"pair": "{pair}"}}"#));
                then.status(200).json_body(json!({
                    "trend": "bearish",
                    "bias": "short",
                    "confidence": 61.0,
                }));
            })
            .await;
    }

    let analyst = analyst_for(&server);
    let pairs = vec![
        "EUR/USD".to_string(),
        "GBP/USD".to_string(),
        "USD/JPY".to_string(),
    ];
    let timeframes = vec!["H1".to_string()];
    let outcome = run_signal_scan(
        &pool,
        &analyst,
        user_id,
        &pairs,
        &timeframes,
        "plan",
        Duration::from_secs(300),
    )
    .await;

    assert_eq!(outcome.signals_generated, 2);
    assert_eq!(outcome.signals.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].contains("GBP/USD"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn exhausted_budget_skips_remaining_pairs(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "budget@example.com").await;

    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/analyse");
            then.status(200).json_body(json!({
                "trend": "bullish",
                "bias": "long",
                "confidence": 55.0,
            }));
        })
        .await;

    let analyst = analyst_for(&server);
    let pairs = vec!["EUR/USD".to_string(), "USD/JPY".to_string()];
    let timeframes = vec!["H1".to_string()];
    let outcome = run_signal_scan(
        &pool,
        &analyst,
        user_id,
        &pairs,
        &timeframes,
        "plan",
        Duration::ZERO,
    )
    .await;

    assert_eq!(outcome.signals_generated, 0);
    assert!(outcome.failures.is_empty());
    mock.assert_hits_async(0).await;
}
