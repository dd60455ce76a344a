//! BookingDesk - booking and payment state machine
//!
//! Operations on the same booking are serialised by a per-booking async lock
//! held across the processor call. The record maps sit behind short-held
//! std mutexes that are never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::domain::{BookingId, Money, PaymentId};
use crate::planning::{Activity, BookableRef};
use crate::store::{AnalyticsEvent, AnalyticsSink};

use super::error::{BookingError, StateError};
use super::processor::{ChargeRequest, PaymentProcessor};
use super::types::{Booking, BookingStatus, IdempotencyKey, Payment, PaymentDetails, PaymentStatus};

/// In-memory booking ledger in front of a payment processor
pub struct BookingDesk {
    processor: Arc<dyn PaymentProcessor>,
    bookings: Mutex<HashMap<BookingId, Booking>>,
    payments: Mutex<HashMap<PaymentId, Payment>>,
    /// Every payment ever opened, by the key it was opened under
    keys: Mutex<HashMap<(BookingId, IdempotencyKey), PaymentId>>,
    locks: Mutex<HashMap<BookingId, Arc<tokio::sync::Mutex<()>>>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
}

impl BookingDesk {
    pub fn new(processor: Arc<dyn PaymentProcessor>) -> Self {
        Self {
            processor,
            bookings: Mutex::new(HashMap::new()),
            payments: Mutex::new(HashMap::new()),
            keys: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            analytics: None,
        }
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    /// Preload bookings and payments saved by an earlier run
    ///
    /// Payments are indexed by key so a repeated key keeps resolving to the
    /// same payment. If several share a key, the newest one wins.
    pub fn with_records(self, bookings: Vec<Booking>, mut payments: Vec<Payment>) -> Self {
        debug!(bookings = bookings.len(), payments = payments.len(), "BookingDesk::with_records: called");
        payments.sort_by_key(|p| p.created_at);
        for payment in payments {
            self.index_key(&payment);
            self.put_payment(payment);
        }
        for booking in bookings {
            self.put_booking(booking);
        }
        self
    }

    /// Open a pending booking for a bookable activity
    pub fn create_booking(&self, activity: &Activity, currency: &str) -> Result<Booking, BookingError> {
        debug!(activity = %activity.name, "BookingDesk::create_booking: called");
        let bookable = activity
            .bookable
            .clone()
            .ok_or_else(|| BookingError::NotBookable(activity.name.clone()))?;

        let booking = Booking::new(&activity.name, bookable, Money::new(activity.cost_estimate, currency));
        self.put_booking(booking.clone());
        info!(booking = %booking.id, item = %booking.bookable, amount = %booking.amount, "create_booking: pending");

        self.emit(AnalyticsEvent::BookingSaved {
            booking_id: booking.id.clone(),
            item: booking.bookable.to_string(),
            amount: booking.amount.clone(),
        });
        Ok(booking)
    }

    /// Charge a pending booking
    ///
    /// Repeating a call with the same key is safe: an in-flight or successful
    /// payment is returned unchanged, a failed one is charged again.
    pub async fn attempt_payment(
        &self,
        booking_id: &BookingId,
        details: &PaymentDetails,
        key: IdempotencyKey,
    ) -> Result<Payment, BookingError> {
        debug!(booking = %booking_id, %key, method = %details.kind(), "BookingDesk::attempt_payment: called");
        details.validate()?;

        let lock = self.lock_for(booking_id);
        let _guard = lock.lock().await;

        let mut booking = self.require_booking(booking_id)?;
        let keyed = self.keyed_payment(&booking.id, &key);

        if let Some(existing) = &keyed
            && existing.status != PaymentStatus::Failed
        {
            debug!(payment = %existing.id, status = %existing.status, "attempt_payment: idempotent replay");
            return Ok(existing.clone());
        }

        if let Some(paid) = booking
            .payment
            .as_ref()
            .and_then(|id| self.payment(id))
            .filter(|p| p.status == PaymentStatus::Succeeded)
        {
            return Err(StateError::AlreadyPaid {
                booking: booking.id.clone(),
                payment: paid.id,
            }
            .into());
        }
        Self::ensure_pending(&booking)?;

        let mut payment = match keyed {
            Some(mut retry) => {
                Self::move_payment(&mut retry, PaymentStatus::Initiated)?;
                retry
            }
            None => {
                let fresh = Payment::new(&booking, key, details.kind());
                self.index_key(&fresh);
                fresh
            }
        };

        payment.attempts += 1;
        booking.payment = Some(payment.id.clone());
        self.put_payment(payment.clone());
        self.put_booking(booking.clone());

        let request = ChargeRequest {
            booking: booking.id.clone(),
            amount: payment.amount.clone(),
            method: payment.method,
            idempotency_key: payment.idempotency_key.clone(),
        };
        let result = self.processor.charge(&request).await;

        match result {
            Ok(reference) => {
                Self::move_payment(&mut payment, PaymentStatus::Succeeded)?;
                payment.processor_ref = Some(reference);
                payment.last_error = None;
                self.put_payment(payment.clone());
                info!(booking = %booking.id, payment = %payment.id, attempts = payment.attempts, "attempt_payment: succeeded");
                self.emit_payment(&payment);
                Ok(payment)
            }
            Err(e) => {
                Self::move_payment(&mut payment, PaymentStatus::Failed)?;
                payment.last_error = Some(e.to_string());
                self.put_payment(payment.clone());
                warn!(booking = %booking.id, payment = %payment.id, error = %e, "attempt_payment: charge failed");
                self.emit_payment(&payment);
                Err(BookingError::Payment {
                    payment: Box::new(payment),
                    source: e,
                })
            }
        }
    }

    /// Confirm a booking whose payment succeeded
    pub async fn confirm_booking(&self, booking_id: &BookingId) -> Result<Booking, BookingError> {
        debug!(booking = %booking_id, "BookingDesk::confirm_booking: called");
        let lock = self.lock_for(booking_id);
        let _guard = lock.lock().await;

        let mut booking = self.require_booking(booking_id)?;
        let payment = booking
            .payment
            .as_ref()
            .and_then(|id| self.payment(id))
            .filter(|p| p.status == PaymentStatus::Succeeded)
            .ok_or_else(|| BookingError::PaymentRequired(booking.id.clone()))?;

        Self::move_booking(&mut booking, BookingStatus::Confirmed)?;
        booking.confirmation = payment.processor_ref.clone();
        self.put_booking(booking.clone());
        info!(booking = %booking.id, confirmation = ?booking.confirmation, "confirm_booking: confirmed");

        self.emit(AnalyticsEvent::BookingConfirmed {
            booking_id: booking.id.clone(),
            confirmation: booking.confirmation.clone(),
        });
        Ok(booking)
    }

    /// Cancel a pending or confirmed booking, refunding a successful payment
    ///
    /// Records change only after the processor accepts the refund.
    pub async fn cancel_booking(&self, booking_id: &BookingId) -> Result<Booking, BookingError> {
        debug!(booking = %booking_id, "BookingDesk::cancel_booking: called");
        let lock = self.lock_for(booking_id);
        let _guard = lock.lock().await;

        let mut booking = self.require_booking(booking_id)?;
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(StateError::Booking {
                id: booking.id.clone(),
                from: booking.status,
                to: BookingStatus::Cancelled,
            }
            .into());
        }

        let paid = booking
            .payment
            .as_ref()
            .and_then(|id| self.payment(id))
            .filter(|p| p.status == PaymentStatus::Succeeded);

        let refunded = match paid {
            Some(mut payment) => {
                let charge_ref = payment.processor_ref.clone().unwrap_or_default();
                let refund_ref = self
                    .processor
                    .refund(&charge_ref, &payment.amount)
                    .await
                    .map_err(|source| {
                        warn!(booking = %booking.id, error = %source, "cancel_booking: refund failed");
                        BookingError::Refund {
                            booking: booking.id.clone(),
                            source,
                        }
                    })?;
                Self::move_payment(&mut payment, PaymentStatus::Refunded)?;
                payment.refund_ref = Some(refund_ref);
                self.put_payment(payment);
                true
            }
            None => false,
        };

        Self::move_booking(&mut booking, BookingStatus::Cancelled)?;
        self.put_booking(booking.clone());
        info!(booking = %booking.id, refunded, "cancel_booking: cancelled");

        self.emit(AnalyticsEvent::BookingCancelled {
            booking_id: booking.id.clone(),
            refunded,
        });
        Ok(booking)
    }

    /// Mark a pending booking failed, e.g. when the item sold out
    ///
    /// A booking holding a successful payment must be cancelled instead so
    /// the charge is refunded.
    pub async fn fail_booking(&self, booking_id: &BookingId, reason: &str) -> Result<Booking, BookingError> {
        debug!(booking = %booking_id, %reason, "BookingDesk::fail_booking: called");
        let lock = self.lock_for(booking_id);
        let _guard = lock.lock().await;

        let mut booking = self.require_booking(booking_id)?;
        if let Some(paid) = booking
            .payment
            .as_ref()
            .and_then(|id| self.payment(id))
            .filter(|p| p.status == PaymentStatus::Succeeded)
        {
            return Err(StateError::AlreadyPaid {
                booking: booking.id.clone(),
                payment: paid.id,
            }
            .into());
        }

        Self::move_booking(&mut booking, BookingStatus::Failed)?;
        booking.failure_reason = Some(reason.to_string());
        self.put_booking(booking.clone());
        warn!(booking = %booking.id, %reason, "fail_booking: failed");

        self.emit(AnalyticsEvent::BookingFailed {
            booking_id: booking.id.clone(),
            reason: reason.to_string(),
        });
        Ok(booking)
    }

    pub fn booking(&self, id: &BookingId) -> Option<Booking> {
        self.bookings.lock().unwrap_or_else(|p| p.into_inner()).get(id).cloned()
    }

    pub fn payment(&self, id: &PaymentId) -> Option<Payment> {
        self.payments.lock().unwrap_or_else(|p| p.into_inner()).get(id).cloned()
    }

    /// All bookings, oldest first
    pub fn bookings(&self) -> Vec<Booking> {
        let mut all: Vec<Booking> = self
            .bookings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Newest booking opened for an item, whatever its status
    pub fn latest_for(&self, bookable: &BookableRef) -> Option<Booking> {
        self.bookings().into_iter().rfind(|b| &b.bookable == bookable)
    }

    fn lock_for(&self, id: &BookingId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    fn require_booking(&self, id: &BookingId) -> Result<Booking, BookingError> {
        self.booking(id).ok_or_else(|| BookingError::NotFound(id.clone()))
    }

    fn put_booking(&self, booking: Booking) {
        self.bookings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(booking.id.clone(), booking);
    }

    fn put_payment(&self, payment: Payment) {
        self.payments
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(payment.id.clone(), payment);
    }

    fn keyed_payment(&self, booking: &BookingId, key: &IdempotencyKey) -> Option<Payment> {
        let id = self
            .keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&(booking.clone(), key.clone()))
            .cloned()?;
        self.payment(&id)
    }

    fn index_key(&self, payment: &Payment) {
        self.keys.lock().unwrap_or_else(|p| p.into_inner()).insert(
            (payment.booking.clone(), payment.idempotency_key.clone()),
            payment.id.clone(),
        );
    }

    fn ensure_pending(booking: &Booking) -> Result<(), StateError> {
        if booking.status == BookingStatus::Pending {
            return Ok(());
        }
        Err(StateError::NotPending {
            id: booking.id.clone(),
            status: booking.status,
        })
    }

    fn move_booking(booking: &mut Booking, to: BookingStatus) -> Result<(), StateError> {
        if !booking.status.can_transition_to(to) {
            return Err(StateError::Booking {
                id: booking.id.clone(),
                from: booking.status,
                to,
            });
        }
        booking.set_status(to);
        Ok(())
    }

    fn move_payment(payment: &mut Payment, to: PaymentStatus) -> Result<(), StateError> {
        if !payment.status.can_transition_to(to) {
            return Err(StateError::Payment {
                id: payment.id.clone(),
                from: payment.status,
                to,
            });
        }
        payment.set_status(to);
        Ok(())
    }

    fn emit_payment(&self, payment: &Payment) {
        self.emit(AnalyticsEvent::PaymentAttempted {
            booking_id: payment.booking.clone(),
            payment_id: payment.id.clone(),
            status: payment.status,
            attempts: payment.attempts,
        });
    }

    fn emit(&self, event: AnalyticsEvent) {
        if let Some(sink) = &self.analytics {
            sink.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::error::PaymentError;
    use crate::booking::processor::SimulatedProcessor;
    use crate::planning::{ActivityCategory, TimeWindow};
    use crate::tools::ToolKind;
    use async_trait::async_trait;
    use chrono::NaiveTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Simulated processor that counts charges and can be slowed down
    #[derive(Default)]
    struct CountingProcessor {
        inner: SimulatedProcessor,
        charges: AtomicUsize,
        refunds: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl PaymentProcessor for CountingProcessor {
        async fn charge(&self, request: &ChargeRequest) -> Result<String, PaymentError> {
            self.charges.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.inner.charge(request).await
        }

        async fn refund(&self, charge_ref: &str, amount: &Money) -> Result<String, PaymentError> {
            self.refunds.fetch_add(1, Ordering::SeqCst);
            self.inner.refund(charge_ref, amount).await
        }
    }

    fn activity(bookable: Option<&str>) -> Activity {
        Activity {
            name: "Pearl Palace".to_string(),
            window: TimeWindow {
                start: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            },
            location: "Hathroi Fort".to_string(),
            cost_estimate: 2400.0,
            category: ActivityCategory::Lodging,
            bookable: bookable.map(|id| BookableRef::new(ToolKind::Lodging, id)),
            notes: None,
        }
    }

    fn upi() -> PaymentDetails {
        PaymentDetails::Upi {
            upi_id: "traveller@upi".to_string(),
        }
    }

    fn desk() -> (BookingDesk, Arc<CountingProcessor>) {
        let processor = Arc::new(CountingProcessor::default());
        (BookingDesk::new(processor.clone()), processor)
    }

    #[test]
    fn test_create_booking() {
        let (desk, _) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "inr").unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.amount, Money::new(2400.0, "INR"));
        assert_eq!(desk.bookings().len(), 1);

        let err = desk.create_booking(&activity(None), "INR").unwrap_err();
        assert!(matches!(err, BookingError::NotBookable(name) if name == "Pearl Palace"));
    }

    #[tokio::test]
    async fn test_pay_then_confirm() {
        let (desk, _) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();

        let payment = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(desk.booking(&booking.id).unwrap().status, BookingStatus::Pending);

        let confirmed = desk.confirm_booking(&booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        let expected = format!("FT{}", booking.id.hex_prefix().to_uppercase());
        assert_eq!(confirmed.confirmation.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_confirm_requires_successful_payment() {
        let (desk, _) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();

        let err = desk.confirm_booking(&booking.id).await.unwrap_err();
        assert!(matches!(err, BookingError::PaymentRequired(_)));
        assert_eq!(desk.booking(&booking.id).unwrap(), booking);
    }

    #[tokio::test]
    async fn test_invalid_details_change_nothing() {
        let (desk, processor) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();

        let details = PaymentDetails::Upi { upi_id: String::new() };
        let err = desk.attempt_payment(&booking.id, &details, "k1".into()).await.unwrap_err();

        assert!(matches!(err, BookingError::InvalidPaymentDetails(_)));
        assert_eq!(processor.charges.load(Ordering::SeqCst), 0);
        assert_eq!(desk.booking(&booking.id).unwrap().payment, None);
    }

    #[tokio::test]
    async fn test_same_key_is_charged_once() {
        let (desk, processor) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();

        let first = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap();
        let second = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(processor.charges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_attempts_with_same_key() {
        let processor = Arc::new(CountingProcessor {
            delay: Duration::from_millis(50),
            ..CountingProcessor::default()
        });
        let desk = Arc::new(BookingDesk::new(processor.clone()));
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let desk = desk.clone();
                let id = booking.id.clone();
                tokio::spawn(async move { desk.attempt_payment(&id, &upi(), "k1".into()).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        assert_eq!(ids[0], ids[1]);
        assert_eq!(processor.charges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_declined_payment_can_be_retried_with_same_key() {
        let (desk, processor) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        processor.inner.decline(&booking.id);

        let err = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap_err();
        let BookingError::Payment { payment, .. } = err else {
            panic!("expected payment error");
        };
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.last_error.is_some());
        assert_eq!(desk.booking(&booking.id).unwrap().status, BookingStatus::Pending);

        processor.inner.approve(&booking.id);
        let retried = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap();
        assert_eq!(retried.id, payment.id);
        assert_eq!(retried.attempts, 2);
        assert_eq!(retried.status, PaymentStatus::Succeeded);
        assert_eq!(processor.charges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_new_key_after_success_is_rejected() {
        let (desk, processor) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap();

        let err = desk.attempt_payment(&booking.id, &upi(), "k2".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::State(StateError::AlreadyPaid { .. })));
        assert_eq!(processor.charges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_confirmed_booking_refunds() {
        let (desk, processor) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        let payment = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap();
        desk.confirm_booking(&booking.id).await.unwrap();

        let cancelled = desk.cancel_booking(&booking.id).await.unwrap();

        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        let payment = desk.payment(&payment.id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
        assert!(payment.refund_ref.unwrap().starts_with("RF-FT"));
        assert_eq!(processor.refunds.load(Ordering::SeqCst), 1);

        let err = desk.cancel_booking(&booking.id).await.unwrap_err();
        assert!(matches!(err, BookingError::State(StateError::Booking { .. })));
    }

    #[tokio::test]
    async fn test_refund_failure_leaves_records_untouched() {
        let (desk, processor) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        let payment = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap();
        let confirmed = desk.confirm_booking(&booking.id).await.unwrap();
        processor.inner.block_refunds(true);

        let err = desk.cancel_booking(&booking.id).await.unwrap_err();

        assert!(matches!(err, BookingError::Refund { .. }));
        assert_eq!(desk.booking(&booking.id).unwrap(), confirmed);
        assert_eq!(desk.payment(&payment.id).unwrap(), payment);
    }

    #[tokio::test]
    async fn test_cancel_unpaid_booking() {
        let (desk, processor) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();

        let cancelled = desk.cancel_booking(&booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(processor.refunds.load(Ordering::SeqCst), 0);

        let err = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::State(_)));
    }

    #[tokio::test]
    async fn test_fail_booking() {
        let (desk, _) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();

        let failed = desk.fail_booking(&booking.id, "sold out").await.unwrap();
        assert_eq!(failed.status, BookingStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("sold out"));

        let err = desk.confirm_booking(&booking.id).await.unwrap_err();
        assert!(matches!(err, BookingError::PaymentRequired(_)));

        let paid = desk.create_booking(&activity(Some("hotel-2")), "INR").unwrap();
        desk.attempt_payment(&paid.id, &upi(), "k1".into()).await.unwrap();
        let err = desk.fail_booking(&paid.id, "sold out").await.unwrap_err();
        assert!(matches!(err, BookingError::State(StateError::AlreadyPaid { .. })));
    }

    #[tokio::test]
    async fn test_earlier_key_is_found_after_another_key_failed() {
        let (desk, processor) = desk();
        let booking = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        processor.inner.decline(&booking.id);

        let BookingError::Payment { payment: first, .. } =
            desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap_err()
        else {
            panic!("expected payment error");
        };
        let BookingError::Payment { payment: second, .. } =
            desk.attempt_payment(&booking.id, &upi(), "k2".into()).await.unwrap_err()
        else {
            panic!("expected payment error");
        };
        assert_ne!(first.id, second.id);

        processor.inner.approve(&booking.id);
        let retried = desk.attempt_payment(&booking.id, &upi(), "k1".into()).await.unwrap();

        assert_eq!(retried.id, first.id);
        assert_eq!(retried.attempts, 2);
        assert_eq!(retried.status, PaymentStatus::Succeeded);
        assert_eq!(desk.booking(&booking.id).unwrap().payment, Some(first.id.clone()));
        assert_eq!(desk.payment(&second.id).unwrap().status, PaymentStatus::Failed);
        assert_eq!(processor.charges.load(Ordering::SeqCst), 3);

        // k2 now belongs to a failed payment on a paid booking
        let err = desk.attempt_payment(&booking.id, &upi(), "k2".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::State(StateError::AlreadyPaid { .. })));
    }

    #[tokio::test]
    async fn test_payment_outside_pending_is_rejected() {
        let (desk, processor) = desk();
        let cancelled = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        desk.cancel_booking(&cancelled.id).await.unwrap();

        let err = desk.attempt_payment(&cancelled.id, &upi(), "k1".into()).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::State(StateError::NotPending { status: BookingStatus::Cancelled, .. })
        ));

        let failed = desk.create_booking(&activity(Some("hotel-2")), "INR").unwrap();
        desk.fail_booking(&failed.id, "sold out").await.unwrap();
        let err = desk.attempt_payment(&failed.id, &upi(), "k1".into()).await.unwrap_err();
        assert!(err.to_string().contains("is failed, not pending"));
        assert_eq!(processor.charges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restored_desk_honours_saved_keys() {
        let (first, first_processor) = desk();
        let declined = first.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        let paid = first.create_booking(&activity(Some("hotel-2")), "INR").unwrap();
        first_processor.inner.decline(&declined.id);
        first.attempt_payment(&declined.id, &upi(), "k1".into()).await.unwrap_err();
        let charged = first.attempt_payment(&paid.id, &upi(), "k1".into()).await.unwrap();

        let bookings = first.bookings();
        let payments: Vec<Payment> = bookings
            .iter()
            .filter_map(|b| b.payment.as_ref().and_then(|id| first.payment(id)))
            .collect();

        let (second, processor) = desk();
        let second = second.with_records(bookings, payments);

        let replay = second.attempt_payment(&paid.id, &upi(), "k1".into()).await.unwrap();
        assert_eq!(replay, charged);
        assert_eq!(processor.charges.load(Ordering::SeqCst), 0);

        let retried = second.attempt_payment(&declined.id, &upi(), "k1".into()).await.unwrap();
        let original = first.booking(&declined.id).unwrap().payment.unwrap();
        assert_eq!(retried.id, original);
        assert_eq!(retried.attempts, 2);
        assert_eq!(processor.charges.load(Ordering::SeqCst), 1);

        let hotel = BookableRef::new(ToolKind::Lodging, "hotel-1");
        assert_eq!(second.latest_for(&hotel).unwrap().id, declined.id);
        assert!(second.latest_for(&BookableRef::new(ToolKind::Lodging, "hotel-9")).is_none());
    }

    #[tokio::test]
    async fn test_latest_for_prefers_newest_booking() {
        let (desk, _) = desk();
        let old = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        desk.cancel_booking(&old.id).await.unwrap();
        let mut newer = desk.create_booking(&activity(Some("hotel-1")), "INR").unwrap();
        newer.created_at = old.created_at + 1;
        let desk = desk.with_records(vec![newer.clone()], vec![]);

        let latest = desk.latest_for(&BookableRef::new(ToolKind::Lodging, "hotel-1")).unwrap();
        assert_eq!(latest.id, newer.id);
        assert_eq!(latest.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_booking() {
        let (desk, _) = desk();
        let err = desk.confirm_booking(&BookingId::from("missing")).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }
}
