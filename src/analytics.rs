use serde_json::json;
use sqlx::PgPool;
use tracing::debug;

use crate::config;

/// Best-effort side effects after a successful scan: stamp the profile's
/// last-seen time and forward an event to the analytics sink if one is
/// configured. Detached from the request; failures are logged at debug and
/// discarded, never surfaced.
pub fn track_scan(pool: &PgPool, user_id: i32, symbol: &str, timeframe: &str) {
    let pool = pool.clone();
    let symbol = symbol.to_string();
    let timeframe = timeframe.to_string();

    tokio::spawn(async move {
        if let Err(err) = sqlx::query("UPDATE profiles SET last_seen_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&pool)
            .await
        {
            debug!(?err, %user_id, "last-seen update dropped");
        }

        let Some(endpoint) = config::ANALYTICS_ENDPOINT.as_deref() else {
            return;
        };
        let client = match reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                debug!(?err, "analytics client unavailable");
                return;
            }
        };
        let event = json!({
            "event": "scan_completed",
            "user_id": user_id,
            "symbol": symbol,
            "timeframe": timeframe,
        });
        if let Err(err) = client.post(endpoint).json(&event).send().await {
            debug!(?err, "analytics event dropped");
        }
    });
}
