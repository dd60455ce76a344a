//! Booking and payment error types

use thiserror::Error;

use crate::domain::{BookingId, PaymentId};

use super::types::{BookingStatus, Payment, PaymentStatus};

/// Illegal move in the booking or payment state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Booking {id} cannot move from {from} to {to}")]
    Booking {
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Payment {id} cannot move from {from} to {to}")]
    Payment {
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Booking {booking} is already paid by {payment}")]
    AlreadyPaid { booking: BookingId, payment: PaymentId },

    /// Payments are only taken while a booking is pending
    #[error("Booking {id} is {status}, not pending")]
    NotPending { id: BookingId, status: BookingStatus },
}

/// Failure reported by a payment processor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),

    #[error("Refund rejected: {0}")]
    RefundRejected(String),
}

/// Errors returned by the booking desk
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Booking not found: {0}")]
    NotFound(BookingId),

    #[error("Activity '{0}' has no bookable item")]
    NotBookable(String),

    #[error("Invalid payment details: {0}")]
    InvalidPaymentDetails(String),

    #[error("Booking {0} has no succeeded payment")]
    PaymentRequired(BookingId),

    /// The charge failed; the payment is now `Failed` and the booking still `Pending`
    #[error("Payment {} failed: {source}", payment.id)]
    Payment {
        payment: Box<Payment>,
        #[source]
        source: PaymentError,
    },

    /// Refund failed; neither record was changed
    #[error("Refund failed for booking {booking}: {source}")]
    Refund {
        booking: BookingId,
        #[source]
        source: PaymentError,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

impl BookingError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NotBookable(_) => "not_bookable",
            Self::InvalidPaymentDetails(_) => "invalid_payment_details",
            Self::PaymentRequired(_) => "payment_required",
            Self::Payment { .. } => "payment_failed",
            Self::Refund { .. } => "refund_failed",
            Self::State(_) => "state_error",
        }
    }
}
