//! Shared domain types
//!
//! Typed IDs, currency-tagged amounts and timestamp helpers used by the
//! planning, booking and storage modules.

mod id;
mod money;

pub use id::{BookingId, IdResolver, PaymentId, RequestId, RunId, TripId, generate_id};
pub use money::Money;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
