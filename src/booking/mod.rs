//! Booking module - bookings, payments and their state machines
//!
//! A booking is opened for one bookable activity of an itinerary, paid
//! through a [`PaymentProcessor`], then confirmed or cancelled.
//!
//! ```text
//! Booking:  Pending ─→ Confirmed ─→ Cancelled
//!              ├─────→ Cancelled
//!              └─────→ Failed
//!
//! Payment:  Initiated ─→ Succeeded ─→ Refunded
//!              └──→ Failed ─→ Initiated
//! ```

mod breakdown;
mod desk;
mod error;
mod processor;
mod types;

pub use breakdown::{BookingSummary, CostBreakdown, cost_breakdown};
pub use desk::BookingDesk;
pub use error::{BookingError, PaymentError, StateError};
pub use processor::{ChargeRequest, PaymentProcessor, SimulatedProcessor};
pub use types::{
    Booking, BookingStatus, IdempotencyKey, Payment, PaymentDetails, PaymentMethodKind, PaymentStatus,
};
