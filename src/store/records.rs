//! Persisted trip and chat records

use serde::{Deserialize, Serialize};

use crate::domain::{Money, TripId, now_ms};
use crate::planning::{ChatReply, ChatTurn, PlannedTrip};

/// A planned trip as saved, with the columns listings need pulled out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: TripId,
    pub title: String,
    pub destination: String,
    pub total: Money,
    pub partial: bool,
    pub created_at: i64,
    pub trip: PlannedTrip,
}

impl TripRecord {
    pub fn new(trip: PlannedTrip) -> Self {
        Self {
            id: TripId::generate(&trip.itinerary.destination),
            title: trip.itinerary.title.clone(),
            destination: trip.itinerary.destination.clone(),
            total: trip.itinerary.total(),
            partial: trip.partial,
            created_at: now_ms(),
            trip,
        }
    }
}

/// One question about a trip and the answer it got
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Row ID, 0 until saved
    pub id: i64,
    pub trip: TripId,
    pub message: String,
    pub reply: String,
    pub suggestions: Vec<String>,
    pub created_at: i64,
}

impl ChatRecord {
    pub fn new(trip: TripId, message: impl Into<String>, reply: &ChatReply) -> Self {
        Self {
            id: 0,
            trip,
            message: message.into(),
            reply: reply.reply.clone(),
            suggestions: reply.suggestions.clone(),
            created_at: now_ms(),
        }
    }

    /// The exchange as conversation history for the next question
    pub fn turn(&self) -> ChatTurn {
        ChatTurn {
            message: self.message.clone(),
            reply: self.reply.clone(),
        }
    }
}
