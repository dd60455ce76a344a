//! Store module - persistence for trips, bookings, payments, chat and analytics
//!
//! [`TripStore`] is a cloneable handle to an actor task that owns the SQLite
//! connection. It also implements [`AnalyticsSink`], so the planning agent
//! and booking desk can hand it events without waiting on the database.

mod analytics;
mod db;
mod manager;
mod messages;
mod records;

pub use analytics::{AnalyticsEvent, AnalyticsSink, EventRecord};
pub use manager::TripStore;
pub use messages::{StoreCommand, StoreError, StoreResponse};
pub use records::{ChatRecord, TripRecord};
