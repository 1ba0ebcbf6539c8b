use anyhow::Result;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use sqlx::{PgPool, Row};

use super::ledger;
use super::models::{Plan, Profile, UsageSnapshot};

/// Usage aggregation and scan admission. Snapshots are recomputed on every
/// read from the profile, plan caps, scan counts, and the ledger sum.
#[derive(Clone)]
pub struct UsageService {
    pool: PgPool,
}

impl UsageService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_usage(&self, user_id: i32) -> Result<UsageSnapshot> {
        self.usage_at(user_id, Utc::now()).await
    }

    /// The quota check and the subsequent scan record are not atomic:
    /// two concurrent scans by one user can both pass here. The ledger is
    /// append-only, so the worst case is bounded overconsumption.
    pub async fn usage_at(&self, user_id: i32, now: DateTime<Utc>) -> Result<UsageSnapshot> {
        let Some((profile, plan)) = self.profile_with_plan(user_id).await? else {
            let mut snapshot = UsageSnapshot::no_plan();
            snapshot.topup_balance = ledger::topup_balance(&self.pool, user_id).await?;
            return Ok(snapshot);
        };

        if !profile.subscription_active(now) {
            let mut snapshot = UsageSnapshot::no_plan();
            snapshot.topup_balance = ledger::topup_balance(&self.pool, user_id).await?;
            return Ok(snapshot);
        }

        let (day_start, month_start) = window_starts(now);
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE created_at >= $2) AS daily_used,
                COUNT(*) FILTER (WHERE created_at >= $3) AS monthly_used
            FROM scans
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(day_start)
        .bind(month_start)
        .fetch_one(&self.pool)
        .await?;
        let daily_used: i64 = row.get("daily_used");
        let monthly_used: i64 = row.get("monthly_used");

        let topup_balance = ledger::topup_balance(&self.pool, user_id).await?;

        let within_allowance = daily_used < plan.daily_scans && monthly_used < plan.monthly_scans;
        let can_scan_via_topup = !within_allowance && topup_balance > 0;
        let can_scan = within_allowance || can_scan_via_topup;

        let scan_reason = if can_scan {
            None
        } else if daily_used >= plan.daily_scans {
            Some("Daily limit reached".to_string())
        } else {
            Some("Monthly limit reached".to_string())
        };

        Ok(UsageSnapshot {
            plan_code: Some(plan.code.clone()),
            can_scan,
            scan_reason,
            can_scan_via_topup,
            daily_used,
            daily_limit: plan.daily_scans,
            monthly_used,
            monthly_limit: plan.monthly_scans,
            monthly_remaining: (plan.monthly_scans - monthly_used).max(0),
            topup_balance,
        })
    }

    /// Records consumption for one completed scan. Top-up scans append a
    /// single-unit debit; plan-allowance scans write nothing, the Scan row's
    /// timestamp is the counter. Callers invoke this once per successful
    /// scan; there is no internal deduplication.
    pub async fn record_scan(&self, user_id: i32, via_topup: bool) -> Result<()> {
        if via_topup {
            ledger::record_consumption(&self.pool, user_id, "Scan via top-up credit").await?;
        }
        Ok(())
    }

    pub async fn profile_with_plan(&self, user_id: i32) -> Result<Option<(Profile, Plan)>> {
        let row = sqlx::query(
            r#"
            SELECT
                u.id, u.email, u.role, u.plan_code, u.subscription_status,
                u.subscription_ends_at, u.last_seen_at, u.created_at,
                p.code, p.name, p.daily_scans, p.monthly_scans, p.price_cents,
                p.topup_grant, p.full_scan, p.active
            FROM profiles u
            JOIN plans p ON p.code = u.plan_code AND p.active
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let profile = Profile {
            id: row.get("id"),
            email: row.get("email"),
            role: row.get("role"),
            plan_code: row.get("plan_code"),
            subscription_status: row.get("subscription_status"),
            subscription_ends_at: row.get("subscription_ends_at"),
            last_seen_at: row.get("last_seen_at"),
            created_at: row.get("created_at"),
        };
        let plan = Plan {
            code: row.get("code"),
            name: row.get("name"),
            daily_scans: row.get("daily_scans"),
            monthly_scans: row.get("monthly_scans"),
            price_cents: row.get("price_cents"),
            topup_grant: row.get("topup_grant"),
            full_scan: row.get("full_scan"),
            active: row.get("active"),
        };

        Ok(Some((profile, plan)))
    }
}

/// Start of the current UTC day and UTC calendar month.
pub fn window_starts(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap();
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap();
    (day_start, month_start)
}
