//! SQLite tables behind the trip store
//!
//! Records are stored as JSON next to the columns used for lookups and
//! ordering. Only the actor task touches the connection.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::booking::{Booking, Payment};
use crate::domain::{TripId, now_ms};

use super::analytics::{AnalyticsEvent, EventRecord};
use super::messages::{StoreError, StoreResponse};
use super::records::{ChatRecord, TripRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS trips (
    id          TEXT PRIMARY KEY,
    destination TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    data        TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS bookings (
    id         TEXT PRIMARY KEY,
    trip_id    TEXT NOT NULL REFERENCES trips(id),
    status     TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS payments (
    id         TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    status     TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS analytics (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    recorded_at INTEGER NOT NULL,
    data        TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chat_messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    trip_id     TEXT NOT NULL REFERENCES trips(id),
    message     TEXT NOT NULL,
    response    TEXT NOT NULL,
    suggestions TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bookings_trip ON bookings(trip_id);
CREATE INDEX IF NOT EXISTS idx_chat_trip ON chat_messages(trip_id);
CREATE INDEX IF NOT EXISTS idx_payments_booking ON payments(booking_id);
";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database file and its parent directory
    pub fn open(path: &Path) -> StoreResponse<Self> {
        debug!(path = %path.display(), "Database::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Corrupt(format!("{}: {}", parent.display(), e)))?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> StoreResponse<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResponse<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn save_trip(&self, trip: &TripRecord) -> StoreResponse<TripId> {
        debug!(id = %trip.id, "Database::save_trip: called");
        let data = serde_json::to_string(trip)?;
        self.conn.execute(
            "INSERT INTO trips (id, destination, created_at, data) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET destination = excluded.destination, data = excluded.data",
            params![trip.id.as_str(), trip.destination, trip.created_at, data],
        )?;
        Ok(trip.id.clone())
    }

    pub fn get_trip(&self, id: &TripId) -> StoreResponse<Option<TripRecord>> {
        debug!(%id, "Database::get_trip: called");
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM trips WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()?;
        data.map(|d| serde_json::from_str(&d).map_err(StoreError::from)).transpose()
    }

    /// Newest first
    pub fn list_trips(&self, limit: usize) -> StoreResponse<Vec<TripRecord>> {
        debug!(limit, "Database::list_trips: called");
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM trips ORDER BY created_at DESC, id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        rows.map(|data| -> StoreResponse<TripRecord> { Ok(serde_json::from_str(&data?)?) })
            .collect()
    }

    /// Insert or update a booking under a trip
    pub fn save_booking(&self, trip: &TripId, booking: &Booking) -> StoreResponse<()> {
        debug!(%trip, booking = %booking.id, status = %booking.status, "Database::save_booking: called");
        let data = serde_json::to_string(booking)?;
        let changed = self.conn.execute(
            "INSERT INTO bookings (id, trip_id, status, created_at, data)
             SELECT ?1, ?2, ?3, ?4, ?5 WHERE EXISTS (SELECT 1 FROM trips WHERE id = ?2)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, data = excluded.data",
            params![
                booking.id.as_str(),
                trip.as_str(),
                booking.status.to_string(),
                booking.created_at,
                data
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("trip {}", trip)));
        }
        Ok(())
    }

    pub fn save_payment(&self, payment: &Payment) -> StoreResponse<()> {
        debug!(payment = %payment.id, status = %payment.status, "Database::save_payment: called");
        let data = serde_json::to_string(payment)?;
        let changed = self.conn.execute(
            "INSERT INTO payments (id, booking_id, status, updated_at, data)
             SELECT ?1, ?2, ?3, ?4, ?5 WHERE EXISTS (SELECT 1 FROM bookings WHERE id = ?2)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at, data = excluded.data",
            params![
                payment.id.as_str(),
                payment.booking.as_str(),
                payment.status.to_string(),
                payment.updated_at,
                data
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("booking {}", payment.booking)));
        }
        Ok(())
    }

    /// Bookings of a trip, oldest first
    pub fn list_bookings(&self, trip: &TripId) -> StoreResponse<Vec<Booking>> {
        debug!(%trip, "Database::list_bookings: called");
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM bookings WHERE trip_id = ?1 ORDER BY created_at, id")?;
        let rows = stmt.query_map(params![trip.as_str()], |row| row.get::<_, String>(0))?;
        rows.map(|data| -> StoreResponse<Booking> { Ok(serde_json::from_str(&data?)?) })
            .collect()
    }

    pub fn list_payments(&self, trip: &TripId) -> StoreResponse<Vec<Payment>> {
        debug!(%trip, "Database::list_payments: called");
        let mut stmt = self.conn.prepare(
            "SELECT p.data FROM payments p JOIN bookings b ON b.id = p.booking_id
             WHERE b.trip_id = ?1 ORDER BY p.updated_at, p.id",
        )?;
        let rows = stmt.query_map(params![trip.as_str()], |row| row.get::<_, String>(0))?;
        rows.map(|data| -> StoreResponse<Payment> { Ok(serde_json::from_str(&data?)?) })
            .collect()
    }

    /// Append a chat exchange to a trip, returning its row ID
    pub fn save_chat(&self, chat: &ChatRecord) -> StoreResponse<i64> {
        debug!(trip = %chat.trip, "Database::save_chat: called");
        let suggestions = serde_json::to_string(&chat.suggestions)?;
        let changed = self.conn.execute(
            "INSERT INTO chat_messages (trip_id, message, response, suggestions, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5 WHERE EXISTS (SELECT 1 FROM trips WHERE id = ?1)",
            params![chat.trip.as_str(), chat.message, chat.reply, suggestions, chat.created_at],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("trip {}", chat.trip)));
        }
        Ok(self.conn.last_insert_rowid())
    }

    /// The newest `limit` exchanges of a trip, oldest first
    pub fn list_chat(&self, trip: &TripId, limit: usize) -> StoreResponse<Vec<ChatRecord>> {
        debug!(%trip, limit, "Database::list_chat: called");
        let mut stmt = self.conn.prepare(
            "SELECT id, message, response, suggestions, created_at FROM (
                SELECT * FROM chat_messages WHERE trip_id = ?1 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id",
        )?;
        let rows = stmt.query_map(params![trip.as_str(), limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        rows.map(|row| -> StoreResponse<ChatRecord> {
            let (id, message, reply, suggestions, created_at) = row?;
            Ok(ChatRecord {
                id,
                trip: trip.clone(),
                message,
                reply,
                suggestions: serde_json::from_str(&suggestions)?,
                created_at,
            })
        })
        .collect()
    }

    pub fn record_event(&self, event: &AnalyticsEvent) -> StoreResponse<()> {
        debug!(name = event.name(), "Database::record_event: called");
        let data = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT INTO analytics (name, recorded_at, data) VALUES (?1, ?2, ?3)",
            params![event.name(), now_ms(), data],
        )?;
        Ok(())
    }

    /// Newest first
    pub fn recent_events(&self, limit: usize) -> StoreResponse<Vec<EventRecord>> {
        debug!(limit, "Database::recent_events: called");
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, recorded_at, data FROM analytics ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        rows.map(|row| -> StoreResponse<EventRecord> {
            let (id, name, recorded_at, data) = row?;
            Ok(EventRecord {
                id,
                name,
                recorded_at,
                event: serde_json::from_str(&data)?,
            })
        })
        .collect()
    }
}
