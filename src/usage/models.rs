use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Static tier definition. Read-only to the rest of the system.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Plan {
    pub code: String,
    pub name: String,
    pub daily_scans: i64,
    pub monthly_scans: i64,
    pub price_cents: i32,
    pub topup_grant: i64,
    pub full_scan: bool,
    pub active: bool,
}

/// Identity record. Plan/status/expiry fields are mutated only by the
/// reconciliation sweep and the admin gift-trial route.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub plan_code: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn subscription_active(&self, now: DateTime<Utc>) -> bool {
        match self.subscription_status.as_deref() {
            Some("active") | Some("trialing") => {}
            _ => return false,
        }
        if let Some(end) = self.subscription_ends_at {
            if end < now {
                return false;
            }
        }
        true
    }
}

/// One completed analysis. Created exactly once per successful provider call,
/// never mutated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub user_id: i32,
    pub pair: String,
    pub display_pair: String,
    pub timeframe: String,
    pub trend: String,
    pub bias: String,
    pub confidence: f64,
    pub analysis: serde_json::Value,
    pub chart_url: Option<String>,
    pub share_id: String,
    pub credit_source: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger entry. Amounts are signed; the balance is always a
/// derived sum, never a stored column.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: Uuid,
    pub user_id: i32,
    pub amount: i64,
    pub kind: String,
    pub description: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// A purchase attempt. Status moves off `pending` only via the
/// reconciliation sweep.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: i32,
    pub plan_code: String,
    pub amount_cents: i32,
    pub currency: String,
    pub status: String,
    pub provider_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Computed on every read from profile + plan + scan counts + ledger sum.
/// Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub plan_code: Option<String>,
    pub can_scan: bool,
    pub scan_reason: Option<String>,
    pub can_scan_via_topup: bool,
    pub daily_used: i64,
    pub daily_limit: i64,
    pub monthly_used: i64,
    pub monthly_limit: i64,
    pub monthly_remaining: i64,
    pub topup_balance: i64,
}

impl UsageSnapshot {
    /// State reported when the profile is missing or carries no plan.
    pub fn no_plan() -> Self {
        Self {
            plan_code: None,
            can_scan: false,
            scan_reason: Some("No active plan".to_string()),
            can_scan_via_topup: false,
            daily_used: 0,
            daily_limit: 0,
            monthly_used: 0,
            monthly_limit: 0,
            monthly_remaining: 0,
            topup_balance: 0,
        }
    }
}
