use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::usage::Scan;

use super::provider::AnalysisProvider;

/// Outcome of a batch scan. Failures are per-pair and never fatal to the
/// batch; the caller gets whatever succeeded plus a count.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub signals_generated: usize,
    pub signals: Vec<Scan>,
    pub failures: Vec<String>,
}

/// Calls the provider exactly once and persists the Scan row only when a
/// usable result came back. A provider failure leaves no trace in the store
/// and no usage is consumed for it.
pub async fn scan_single_pair(
    pool: &PgPool,
    provider: &dyn AnalysisProvider,
    user_id: i32,
    pair: &str,
    display_pair: &str,
    timeframe: &str,
    credit_source: &str,
) -> Result<Scan> {
    let analysis = provider.analyse(pair, timeframe).await?;

    let payload = serde_json::to_value(&analysis)
        .map_err(|err| anyhow!("failed to serialize analysis: {err}"))?;
    let scan = sqlx::query_as::<_, Scan>(
        r#"
        INSERT INTO scans (
            id, user_id, pair, display_pair, timeframe,
            trend, bias, confidence, analysis, chart_url,
            share_id, credit_source
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(pair)
    .bind(display_pair)
    .bind(timeframe)
    .bind(&analysis.trend)
    .bind(&analysis.bias)
    .bind(analysis.confidence)
    .bind(payload)
    .bind(&analysis.chart_url)
    .bind(new_share_id())
    .bind(credit_source)
    .fetch_one(pool)
    .await?;

    Ok(scan)
}

/// Walks the Cartesian set of pairs and timeframes sequentially, one provider
/// call at a time. A single pair failing is recorded and skipped. Once the
/// wall-clock budget is spent, remaining combinations are not attempted.
pub async fn run_signal_scan(
    pool: &PgPool,
    provider: &dyn AnalysisProvider,
    user_id: i32,
    pairs: &[String],
    timeframes: &[String],
    credit_source: &str,
    budget: Duration,
) -> BatchOutcome {
    let started = Instant::now();
    let mut signals = Vec::new();
    let mut failures = Vec::new();

    'outer: for pair in pairs {
        for timeframe in timeframes {
            if started.elapsed() >= budget {
                warn!(
                    %user_id,
                    attempted = signals.len() + failures.len(),
                    "full scan budget exhausted, skipping remaining pairs"
                );
                break 'outer;
            }
            match scan_single_pair(pool, provider, user_id, pair, pair, timeframe, credit_source)
                .await
            {
                Ok(scan) => signals.push(scan),
                Err(err) => {
                    warn!(?err, %pair, %timeframe, "pair scan failed, continuing batch");
                    failures.push(format!("{pair} {timeframe}: {err}"));
                }
            }
        }
    }

    BatchOutcome {
        signals_generated: signals.len(),
        signals,
        failures,
    }
}

fn new_share_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_ids_are_short_and_unique() {
        let a = new_share_id();
        let b = new_share_id();
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }
}
