use once_cell::sync::Lazy;

/// Secret used for JWT signing. Must be set via the `JWT_SECRET` env variable.
pub static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"));

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// Base URL of the chart-analysis provider.
pub static ANALYSIS_PROVIDER_ENDPOINT: Lazy<String> = Lazy::new(|| {
    std::env::var("ANALYSIS_PROVIDER_ENDPOINT")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "http://127.0.0.1:8787".to_string())
});

/// Optional bearer token presented to the analysis provider.
pub static ANALYSIS_PROVIDER_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("ANALYSIS_PROVIDER_TOKEN"));

/// Ceiling for a single provider call, in seconds. Defaults to `60`.
pub static ANALYSIS_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("ANALYSIS_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(60)
});

/// Wall-clock budget for a full-market batch scan, in seconds. Defaults to `300`.
/// Pairs still unvisited when the budget runs out are not attempted.
pub static FULL_SCAN_BUDGET_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("FULL_SCAN_BUDGET_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(300)
});

/// Pair universe used when a full scan names no pairs. Comma-separated list via
/// `TRACKED_PAIRS`, e.g. `EUR/USD,GBP/USD,USD/JPY`.
pub static TRACKED_PAIRS: Lazy<Vec<String>> = Lazy::new(|| {
    std::env::var("TRACKED_PAIRS")
        .ok()
        .map(|value| {
            value
                .split(',')
                .filter_map(|raw| {
                    let trimmed = raw.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(trimmed.to_string())
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|pairs| !pairs.is_empty())
        .unwrap_or_else(|| {
            [
                "EUR/USD", "GBP/USD", "USD/JPY", "AUD/USD", "USD/CAD", "USD/CHF", "NZD/USD",
                "EUR/GBP", "EUR/JPY", "GBP/JPY", "XAU/USD", "BTC/USD",
            ]
            .iter()
            .map(|pair| pair.to_string())
            .collect()
        })
});

/// Timeframes used when a full scan names none. Comma-separated via `TRACKED_TIMEFRAMES`.
pub static TRACKED_TIMEFRAMES: Lazy<Vec<String>> = Lazy::new(|| {
    std::env::var("TRACKED_TIMEFRAMES")
        .ok()
        .map(|value| {
            value
                .split(',')
                .filter_map(|raw| {
                    let trimmed = raw.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(trimmed.to_string())
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|frames| !frames.is_empty())
        .unwrap_or_else(|| vec!["H1".to_string()])
});

/// Base URL of the payment gateway's status-verification API.
pub static PAYMENT_VERIFIER_ENDPOINT: Lazy<String> = Lazy::new(|| {
    std::env::var("PAYMENT_VERIFIER_ENDPOINT")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "http://127.0.0.1:8788".to_string())
});

/// API key presented to the payment verifier.
pub static PAYMENT_VERIFIER_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("PAYMENT_VERIFIER_TOKEN"));

/// Shared secret used to check gateway webhook signatures. Webhooks are rejected
/// when unset.
pub static PAYMENT_WEBHOOK_SECRET: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("PAYMENT_WEBHOOK_SECRET"));

/// Cadence of the automatic payment reconciliation sweep, in seconds. Defaults to `300`.
pub static PAYMENT_SWEEP_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("PAYMENT_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(300)
});

/// Time-to-live of the public stats cache, in seconds. Defaults to `60`.
pub static STATS_CACHE_TTL_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("STATS_CACHE_TTL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(60)
});

/// Optional analytics sink. Events are dropped when unset.
pub static ANALYTICS_ENDPOINT: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("ANALYTICS_ENDPOINT"));

/// Base URL of the remote trade-execution bridge.
pub static TRADE_BRIDGE_ENDPOINT: Lazy<String> = Lazy::new(|| {
    std::env::var("TRADE_BRIDGE_ENDPOINT")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "http://127.0.0.1:8789".to_string())
});

/// Ceiling for a trade-bridge call, in seconds. Defaults to `30`.
pub static TRADE_BRIDGE_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("TRADE_BRIDGE_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(30)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
