pub mod ledger;
pub mod models;
pub mod service;

pub use models::{CreditEntry, Payment, Plan, Profile, Scan, UsageSnapshot};
pub use service::{window_starts, UsageService};
