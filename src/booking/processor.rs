//! Payment processor seam
//!
//! The desk owns all state transitions; a processor only moves money and
//! answers with a reference or an error.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{BookingId, Money};

use super::error::PaymentError;
use super::types::{IdempotencyKey, PaymentMethodKind};

/// What the processor is asked to charge
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub booking: BookingId,
    pub amount: Money,
    pub method: PaymentMethodKind,
    pub idempotency_key: IdempotencyKey,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charge the amount, returning the processor's confirmation reference
    async fn charge(&self, request: &ChargeRequest) -> Result<String, PaymentError>;

    /// Refund a previous charge, returning the refund reference
    async fn refund(&self, charge_ref: &str, amount: &Money) -> Result<String, PaymentError>;
}

/// In-process processor that approves everything
///
/// Confirmation numbers are `FT` followed by the booking's short id.
/// Individual bookings can be set to decline, for tests and demos.
#[derive(Debug, Default)]
pub struct SimulatedProcessor {
    declined: Mutex<HashSet<BookingId>>,
    refunds_blocked: Mutex<bool>,
}

impl SimulatedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decline every charge for `booking` until `approve` is called
    pub fn decline(&self, booking: &BookingId) {
        self.declined.lock().unwrap_or_else(|p| p.into_inner()).insert(booking.clone());
    }

    pub fn approve(&self, booking: &BookingId) {
        self.declined.lock().unwrap_or_else(|p| p.into_inner()).remove(booking);
    }

    /// Reject refunds while set
    pub fn block_refunds(&self, blocked: bool) {
        *self.refunds_blocked.lock().unwrap_or_else(|p| p.into_inner()) = blocked;
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    async fn charge(&self, request: &ChargeRequest) -> Result<String, PaymentError> {
        debug!(booking = %request.booking, amount = %request.amount, method = %request.method, "SimulatedProcessor::charge: called");
        if self.declined.lock().unwrap_or_else(|p| p.into_inner()).contains(&request.booking) {
            return Err(PaymentError::Declined(format!("{} declined by issuer", request.method.label())));
        }
        Ok(format!("FT{}", request.booking.hex_prefix().to_uppercase()))
    }

    async fn refund(&self, charge_ref: &str, amount: &Money) -> Result<String, PaymentError> {
        debug!(%charge_ref, %amount, "SimulatedProcessor::refund: called");
        if *self.refunds_blocked.lock().unwrap_or_else(|p| p.into_inner()) {
            return Err(PaymentError::RefundRejected(format!("refund of {} not accepted", charge_ref)));
        }
        Ok(format!("RF-{}", charge_ref))
    }
}
