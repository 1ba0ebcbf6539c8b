use axum::{
    routing::{get, post},
    Router,
};

use crate::{auth, bridge, payments, scan, stats};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/register", post(auth::register_user))
        .route("/api/login", post(auth::login_user))
        .route("/api/logout", post(auth::logout_user))
        .route("/api/me", get(auth::current_user))
        .route("/api/plans", get(payments::api::list_plans))
        .route("/api/usage", get(scan::api::current_usage))
        .route("/api/scan", post(scan::api::single_scan))
        .route("/api/scan/full", post(scan::api::full_scan))
        .route("/api/scans", get(scan::api::list_scans))
        .route("/api/signal/:share_id", get(scan::api::shared_signal))
        .route("/api/payments", post(payments::api::create_payment))
        .route("/api/payments/webhook", post(payments::webhook::gateway_webhook))
        .route(
            "/api/admin/verify-payments",
            post(payments::api::verify_payments),
        )
        .route("/api/admin/gift-trial", post(payments::api::gift_trial))
        .route("/api/stats", get(stats::public_stats))
        .route("/api/bridge/connect", post(bridge::connect))
        .route("/api/bridge/execute", post(bridge::execute))
        .route("/api/bridge/disconnect", post(bridge::disconnect))
}
