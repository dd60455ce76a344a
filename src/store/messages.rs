//! Trip store messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::booking::{Booking, Payment};
use crate::domain::TripId;

use super::analytics::{AnalyticsEvent, EventRecord};
use super::records::{ChatRecord, TripRecord};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    Corrupt(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Commands sent to the TripStore actor
#[derive(Debug)]
pub enum StoreCommand {
    // Trip operations
    SaveTrip {
        trip: Box<TripRecord>,
        reply: oneshot::Sender<StoreResponse<TripId>>,
    },
    GetTrip {
        id: TripId,
        reply: oneshot::Sender<StoreResponse<Option<TripRecord>>>,
    },
    ListTrips {
        limit: usize,
        reply: oneshot::Sender<StoreResponse<Vec<TripRecord>>>,
    },

    // Booking operations
    SaveBooking {
        trip: TripId,
        booking: Booking,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    SavePayment {
        payment: Payment,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    ListBookings {
        trip: TripId,
        reply: oneshot::Sender<StoreResponse<Vec<Booking>>>,
    },
    ListPayments {
        trip: TripId,
        reply: oneshot::Sender<StoreResponse<Vec<Payment>>>,
    },

    // Chat
    SaveChat {
        chat: ChatRecord,
        reply: oneshot::Sender<StoreResponse<i64>>,
    },
    ListChat {
        trip: TripId,
        limit: usize,
        reply: oneshot::Sender<StoreResponse<Vec<ChatRecord>>>,
    },

    // Analytics
    RecordEvent {
        event: AnalyticsEvent,
    },
    RecentEvents {
        limit: usize,
        reply: oneshot::Sender<StoreResponse<Vec<EventRecord>>>,
    },

    Shutdown,
}
