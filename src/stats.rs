use std::time::{Duration, Instant};

use axum::{extract::Extension, Json};
use chrono::Utc;
use once_cell::sync::Lazy;
use serde::Serialize;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config;
use crate::usage::window_starts;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub scans_total: i64,
    pub scans_today: i64,
    pub scans_hour: i64,
    pub traders: i64,
}

struct CachedStats {
    data: StatsSnapshot,
    fetched_at: Instant,
}

/// Process-wide cache for the public stats endpoint. Stale-while-valid: a
/// snapshot is served until its TTL lapses, there is no invalidation.
static CACHE: Lazy<RwLock<Option<CachedStats>>> = Lazy::new(|| RwLock::new(None));

fn is_fresh(age: Duration, ttl: Duration) -> bool {
    age < ttl
}

/// Public, unauthenticated. Degrades to an all-zero body with HTTP 200 when
/// the store is unreachable; failures are never cached.
pub async fn public_stats(Extension(pool): Extension<PgPool>) -> Json<StatsSnapshot> {
    let ttl = Duration::from_secs(*config::STATS_CACHE_TTL_SECS);

    {
        let cache = CACHE.read().await;
        if let Some(cached) = cache.as_ref() {
            if is_fresh(cached.fetched_at.elapsed(), ttl) {
                return Json(cached.data.clone());
            }
        }
    }

    match load_stats(&pool).await {
        Ok(stats) => {
            let mut cache = CACHE.write().await;
            *cache = Some(CachedStats {
                data: stats.clone(),
                fetched_at: Instant::now(),
            });
            Json(stats)
        }
        Err(err) => {
            warn!(?err, "stats query failed, serving zeros");
            Json(StatsSnapshot::default())
        }
    }
}

async fn load_stats(pool: &PgPool) -> Result<StatsSnapshot, sqlx::Error> {
    let now = Utc::now();
    let (day_start, _) = window_starts(now);
    let hour_start = now - chrono::Duration::hours(1);

    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS scans_total,
            COUNT(*) FILTER (WHERE created_at >= $1) AS scans_today,
            COUNT(*) FILTER (WHERE created_at >= $2) AS scans_hour,
            COUNT(DISTINCT user_id) AS traders
        FROM scans
        "#,
    )
    .bind(day_start)
    .bind(hour_start)
    .fetch_one(pool)
    .await?;

    Ok(StatsSnapshot {
        scans_total: row.get("scans_total"),
        scans_today: row.get("scans_today"),
        scans_hour: row.get("scans_hour"),
        traders: row.get("traders"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_respects_ttl() {
        let ttl = Duration::from_secs(60);
        assert!(is_fresh(Duration::from_secs(0), ttl));
        assert!(is_fresh(Duration::from_secs(59), ttl));
        assert!(!is_fresh(Duration::from_secs(60), ttl));
        assert!(!is_fresh(Duration::from_secs(3600), ttl));
    }
}
