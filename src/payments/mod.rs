pub mod api;
pub mod sweep;
pub mod verifier;
pub mod webhook;

pub use sweep::{process_sweep, SweepOutcome};
pub use verifier::{HttpPaymentVerifier, PaymentVerifier, VerifierStatus};
pub use webhook::{start_reconcile_worker, ReconcileHandle, ReconcileJob};
