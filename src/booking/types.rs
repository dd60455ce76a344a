//! Booking and payment records with their status tables

use serde::{Deserialize, Serialize};

use crate::domain::{BookingId, Money, PaymentId, now_ms};
use crate::planning::BookableRef;

use super::error::BookingError;

/// Booking lifecycle
///
/// `Pending` until paid and confirmed. `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
    Cancelled,
}

impl BookingStatus {
    pub fn can_transition_to(&self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed) | (Pending, Failed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("Unknown booking status: {}", other)),
        }
    }
}

/// Payment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Initiated,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn can_transition_to(&self, to: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, to),
            (Initiated, Succeeded) | (Initiated, Failed) | (Failed, Initiated) | (Succeeded, Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initiated => "initiated",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

/// Supported ways to pay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethodKind {
    Card,
    Upi,
    NetBanking,
    Wallet,
}

impl PaymentMethodKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Card => "Credit/Debit Card",
            Self::Upi => "UPI",
            Self::NetBanking => "Net Banking",
            Self::Wallet => "Digital Wallet",
        }
    }
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Card => "card",
            Self::Upi => "upi",
            Self::NetBanking => "net-banking",
            Self::Wallet => "wallet",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PaymentMethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" => Ok(Self::Card),
            "upi" => Ok(Self::Upi),
            "net-banking" | "netbanking" => Ok(Self::NetBanking),
            "wallet" => Ok(Self::Wallet),
            other => Err(format!("Unknown payment method: {}", other)),
        }
    }
}

/// Method-specific details supplied with a payment attempt
///
/// Never persisted; only the method kind is kept on the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum PaymentDetails {
    Card { number: String, expiry: String, cvv: String },
    Upi { upi_id: String },
    NetBanking { bank: String },
    Wallet { provider: String },
}

impl PaymentDetails {
    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::Card { .. } => PaymentMethodKind::Card,
            Self::Upi { .. } => PaymentMethodKind::Upi,
            Self::NetBanking { .. } => PaymentMethodKind::NetBanking,
            Self::Wallet { .. } => PaymentMethodKind::Wallet,
        }
    }

    /// Every field the method needs must be present
    pub fn validate(&self) -> Result<(), BookingError> {
        let missing = |field: &str| BookingError::InvalidPaymentDetails(format!("{} required", field));
        match self {
            Self::Card { number, expiry, cvv } => {
                for (field, value) in [("card number", number), ("expiry", expiry), ("cvv", cvv)] {
                    if value.trim().is_empty() {
                        return Err(missing(field));
                    }
                }
                Ok(())
            }
            Self::Upi { upi_id } if upi_id.trim().is_empty() => Err(missing("UPI ID")),
            Self::NetBanking { bank } if bank.trim().is_empty() => Err(missing("bank")),
            Self::Wallet { provider } if provider.trim().is_empty() => Err(missing("wallet provider")),
            _ => Ok(()),
        }
    }
}

/// Client-chosen key that makes a payment attempt safe to repeat
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A purchase of one bookable activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub activity_name: String,
    pub bookable: BookableRef,
    pub amount: Money,
    pub status: BookingStatus,
    /// Latest payment attempt for this booking
    pub payment: Option<PaymentId>,
    pub confirmation: Option<String>,
    /// Set when the booking fails
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Booking {
    pub fn new(activity_name: impl Into<String>, bookable: BookableRef, amount: Money) -> Self {
        let activity_name = activity_name.into();
        let now = now_ms();
        Self {
            id: BookingId::generate(&activity_name),
            activity_name,
            bookable,
            amount,
            status: BookingStatus::Pending,
            payment: None,
            confirmation: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn set_status(&mut self, status: BookingStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }
}

/// A charge against a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking: BookingId,
    pub idempotency_key: IdempotencyKey,
    pub amount: Money,
    pub method: PaymentMethodKind,
    pub status: PaymentStatus,
    /// Processor reference for the charge
    pub processor_ref: Option<String>,
    pub refund_ref: Option<String>,
    pub last_error: Option<String>,
    /// Charge attempts made under this payment
    pub attempts: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Payment {
    pub fn new(booking: &Booking, key: IdempotencyKey, method: PaymentMethodKind) -> Self {
        let now = now_ms();
        Self {
            id: PaymentId::generate(booking.id.hex_prefix()),
            booking: booking.id.clone(),
            idempotency_key: key,
            amount: booking.amount.clone(),
            method,
            status: PaymentStatus::Initiated,
            processor_ref: None,
            refund_ref: None,
            last_error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn set_status(&mut self, status: PaymentStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolKind;

    #[test]
    fn test_booking_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Failed.can_transition_to(Cancelled));
        assert!(Failed.is_terminal());
        assert!(!Confirmed.is_terminal());
    }

    #[test]
    fn test_payment_transitions() {
        use PaymentStatus::*;
        assert!(Initiated.can_transition_to(Succeeded));
        assert!(Initiated.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Initiated));
        assert!(Succeeded.can_transition_to(Refunded));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Refunded.can_transition_to(Initiated));
        assert!(!Initiated.can_transition_to(Refunded));
    }

    #[test]
    fn test_payment_details_validation() {
        let card = PaymentDetails::Card {
            number: "4111 1111 1111 1111".to_string(),
            expiry: "12/28".to_string(),
            cvv: String::new(),
        };
        let err = card.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid payment details: cvv required");

        let upi = PaymentDetails::Upi {
            upi_id: "me@upi".to_string(),
        };
        assert!(upi.validate().is_ok());
        assert_eq!(upi.kind(), PaymentMethodKind::Upi);

        let wallet = PaymentDetails::Wallet { provider: " ".to_string() };
        assert!(wallet.validate().is_err());
    }

    #[test]
    fn test_payment_details_serde() {
        let details: PaymentDetails = serde_json::from_str(r#"{"method": "net-banking", "bank": "HDFC"}"#).unwrap();
        assert_eq!(
            details,
            PaymentDetails::NetBanking {
                bank: "HDFC".to_string()
            }
        );
    }

    #[test]
    fn test_status_round_trip_through_text() {
        for status in [BookingStatus::Pending, BookingStatus::Cancelled] {
            assert_eq!(status.to_string().parse::<BookingStatus>(), Ok(status));
        }
        assert_eq!("refunded".parse::<PaymentStatus>(), Ok(PaymentStatus::Refunded));
        assert_eq!("NetBanking".parse::<PaymentMethodKind>(), Ok(PaymentMethodKind::NetBanking));
    }

    #[test]
    fn test_new_payment_copies_booking_amount() {
        let booking = Booking::new(
            "Pearl Palace",
            BookableRef::new(ToolKind::Lodging, "hotel-1"),
            Money::new(2400.0, "INR"),
        );
        let payment = Payment::new(&booking, IdempotencyKey::new("k1"), PaymentMethodKind::Card);
        assert_eq!(payment.booking, booking.id);
        assert_eq!(payment.amount, booking.amount);
        assert_eq!(payment.status, PaymentStatus::Initiated);
        assert_eq!(payment.attempts, 0);
    }
}
