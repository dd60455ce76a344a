//! TripStore - actor that owns the SQLite connection
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::booking::{Booking, Payment};
use crate::domain::TripId;

use super::analytics::{AnalyticsEvent, AnalyticsSink, EventRecord};
use super::db::Database;
use super::messages::{StoreCommand, StoreError, StoreResponse};
use super::records::{ChatRecord, TripRecord};

const CHANNEL_CAPACITY: usize = 256;

/// Handle to send commands to the TripStore actor
#[derive(Clone)]
pub struct TripStore {
    tx: mpsc::Sender<StoreCommand>,
}

impl TripStore {
    /// Open the database at `path` and spawn the actor
    pub fn spawn(path: impl AsRef<Path>) -> StoreResponse<Self> {
        debug!(path = %path.as_ref().display(), "TripStore::spawn: called");
        let db = Database::open(path.as_ref())?;
        Ok(Self::start(db))
    }

    /// Spawn an actor over a throwaway in-memory database
    pub fn in_memory() -> StoreResponse<Self> {
        debug!("TripStore::in_memory: called");
        Ok(Self::start(Database::in_memory()?))
    }

    fn start(db: Database) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(actor_loop(db, rx));
        info!("TripStore spawned");
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StoreResponse<T>>) -> StoreCommand) -> StoreResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    // === Trips ===

    pub async fn save_trip(&self, trip: TripRecord) -> StoreResponse<TripId> {
        debug!(id = %trip.id, destination = %trip.destination, "save_trip: called");
        self.request(|reply| StoreCommand::SaveTrip {
            trip: Box::new(trip),
            reply,
        })
        .await
    }

    pub async fn get_trip(&self, id: &TripId) -> StoreResponse<Option<TripRecord>> {
        debug!(%id, "get_trip: called");
        self.request(|reply| StoreCommand::GetTrip { id: id.clone(), reply })
            .await
    }

    /// Most recent trips first
    pub async fn list_trips(&self, limit: usize) -> StoreResponse<Vec<TripRecord>> {
        debug!(limit, "list_trips: called");
        self.request(|reply| StoreCommand::ListTrips { limit, reply }).await
    }

    // === Bookings and payments ===

    pub async fn save_booking(&self, trip: &TripId, booking: &Booking) -> StoreResponse<()> {
        debug!(%trip, booking = %booking.id, "save_booking: called");
        self.request(|reply| StoreCommand::SaveBooking {
            trip: trip.clone(),
            booking: booking.clone(),
            reply,
        })
        .await
    }

    pub async fn save_payment(&self, payment: &Payment) -> StoreResponse<()> {
        debug!(payment = %payment.id, "save_payment: called");
        self.request(|reply| StoreCommand::SavePayment {
            payment: payment.clone(),
            reply,
        })
        .await
    }

    pub async fn list_bookings(&self, trip: &TripId) -> StoreResponse<Vec<Booking>> {
        debug!(%trip, "list_bookings: called");
        self.request(|reply| StoreCommand::ListBookings {
            trip: trip.clone(),
            reply,
        })
        .await
    }

    pub async fn list_payments(&self, trip: &TripId) -> StoreResponse<Vec<Payment>> {
        debug!(%trip, "list_payments: called");
        self.request(|reply| StoreCommand::ListPayments {
            trip: trip.clone(),
            reply,
        })
        .await
    }

    // === Chat ===

    pub async fn save_chat(&self, chat: ChatRecord) -> StoreResponse<i64> {
        debug!(trip = %chat.trip, "save_chat: called");
        self.request(|reply| StoreCommand::SaveChat { chat, reply }).await
    }

    /// The newest `limit` exchanges, oldest first
    pub async fn list_chat(&self, trip: &TripId, limit: usize) -> StoreResponse<Vec<ChatRecord>> {
        debug!(%trip, limit, "list_chat: called");
        self.request(|reply| StoreCommand::ListChat {
            trip: trip.clone(),
            limit,
            reply,
        })
        .await
    }

    // === Analytics ===

    /// Most recent events first
    pub async fn recent_events(&self, limit: usize) -> StoreResponse<Vec<EventRecord>> {
        debug!(limit, "recent_events: called");
        self.request(|reply| StoreCommand::RecentEvents { limit, reply }).await
    }

    /// Shutdown the TripStore
    ///
    /// Commands already queued, including analytics events, are processed first.
    pub async fn shutdown(&self) -> StoreResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StoreCommand::Shutdown)
            .await
            .map_err(|_| StoreError::ChannelError)
    }
}

impl AnalyticsSink for TripStore {
    fn record(&self, event: AnalyticsEvent) {
        let name = event.name();
        if let Err(e) = self.tx.try_send(StoreCommand::RecordEvent { event }) {
            debug!(event = name, error = %e, "record: analytics event dropped");
        }
    }
}

/// The actor loop that processes commands
async fn actor_loop(db: Database, mut rx: mpsc::Receiver<StoreCommand>) {
    debug!("actor_loop: called");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::SaveTrip { trip, reply } => {
                debug!(id = %trip.id, "actor_loop: SaveTrip command");
                let _ = reply.send(db.save_trip(&trip));
            }

            StoreCommand::GetTrip { id, reply } => {
                debug!(%id, "actor_loop: GetTrip command");
                let _ = reply.send(db.get_trip(&id));
            }

            StoreCommand::ListTrips { limit, reply } => {
                debug!(limit, "actor_loop: ListTrips command");
                let _ = reply.send(db.list_trips(limit));
            }

            StoreCommand::SaveBooking { trip, booking, reply } => {
                debug!(%trip, booking = %booking.id, "actor_loop: SaveBooking command");
                let _ = reply.send(db.save_booking(&trip, &booking));
            }

            StoreCommand::SavePayment { payment, reply } => {
                debug!(payment = %payment.id, "actor_loop: SavePayment command");
                let _ = reply.send(db.save_payment(&payment));
            }

            StoreCommand::ListBookings { trip, reply } => {
                debug!(%trip, "actor_loop: ListBookings command");
                let _ = reply.send(db.list_bookings(&trip));
            }

            StoreCommand::ListPayments { trip, reply } => {
                debug!(%trip, "actor_loop: ListPayments command");
                let _ = reply.send(db.list_payments(&trip));
            }

            StoreCommand::SaveChat { chat, reply } => {
                debug!(trip = %chat.trip, "actor_loop: SaveChat command");
                let _ = reply.send(db.save_chat(&chat));
            }

            StoreCommand::ListChat { trip, limit, reply } => {
                debug!(%trip, limit, "actor_loop: ListChat command");
                let _ = reply.send(db.list_chat(&trip, limit));
            }

            StoreCommand::RecordEvent { event } => {
                debug!(name = event.name(), "actor_loop: RecordEvent command");
                if let Err(e) = db.record_event(&event) {
                    warn!(name = event.name(), error = %e, "Failed to record analytics event");
                }
            }

            StoreCommand::RecentEvents { limit, reply } => {
                debug!(limit, "actor_loop: RecentEvents command");
                let _ = reply.send(db.recent_events(limit));
            }

            StoreCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("TripStore shutting down");
                break;
            }
        }
    }

    debug!("TripStore actor stopped");
}
