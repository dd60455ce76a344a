//! Analytics events and the fire-and-forget sink seam

use serde::{Deserialize, Serialize};

use crate::booking::PaymentStatus;
use crate::domain::{BookingId, Money, PaymentId, RunId};

/// Something worth counting, recorded after the fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    TripCreated {
        run_id: RunId,
        destination: String,
        total: Money,
        partial: bool,
    },
    PlanFailed {
        run_id: RunId,
        error: String,
        gaps: usize,
    },
    BookingSaved {
        booking_id: BookingId,
        item: String,
        amount: Money,
    },
    PaymentAttempted {
        booking_id: BookingId,
        payment_id: PaymentId,
        status: PaymentStatus,
        attempts: u32,
    },
    BookingConfirmed {
        booking_id: BookingId,
        confirmation: Option<String>,
    },
    BookingCancelled {
        booking_id: BookingId,
        refunded: bool,
    },
    BookingFailed {
        booking_id: BookingId,
        reason: String,
    },
}

impl AnalyticsEvent {
    /// Snake-case event name, as stored
    pub fn name(&self) -> &'static str {
        match self {
            Self::TripCreated { .. } => "trip_created",
            Self::PlanFailed { .. } => "plan_failed",
            Self::BookingSaved { .. } => "booking_saved",
            Self::PaymentAttempted { .. } => "payment_attempted",
            Self::BookingConfirmed { .. } => "booking_confirmed",
            Self::BookingCancelled { .. } => "booking_cancelled",
            Self::BookingFailed { .. } => "booking_failed",
        }
    }
}

/// Receives analytics events without blocking the caller
///
/// Implementations must not fail the operation that emitted the event;
/// events may be dropped under pressure.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, event: AnalyticsEvent);
}

/// A stored analytics event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub name: String,
    pub event: AnalyticsEvent,
    pub recorded_at: i64,
}
