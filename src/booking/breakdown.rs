//! Cost breakdown and booking receipts

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{BookingId, Money};
use crate::planning::{ActivityCategory, Itinerary};

use super::types::{Booking, BookingStatus};

/// Per-category spend for an itinerary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    /// Only categories with at least one activity appear
    pub categories: BTreeMap<ActivityCategory, f64>,
    pub total: Money,
}

impl CostBreakdown {
    pub fn get(&self, category: ActivityCategory) -> f64 {
        self.categories.get(&category).copied().unwrap_or(0.0)
    }

    /// Share of the total spent on `category`, as a percentage
    pub fn share(&self, category: ActivityCategory) -> f64 {
        if self.total.amount <= 0.0 {
            return 0.0;
        }
        self.get(category) / self.total.amount * 100.0
    }
}

pub fn cost_breakdown(itinerary: &Itinerary) -> CostBreakdown {
    let mut categories = BTreeMap::new();
    for activity in itinerary.activities() {
        *categories.entry(activity.category).or_insert(0.0) += activity.cost_estimate;
    }
    CostBreakdown {
        categories,
        total: itinerary.total(),
    }
}

/// Short receipt for a booking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingSummary {
    pub booking_id: BookingId,
    pub destination: String,
    pub item: String,
    pub amount: Money,
    pub status: BookingStatus,
    pub confirmation: Option<String>,
}

impl BookingSummary {
    pub fn from_booking(booking: &Booking, destination: &str) -> Self {
        Self {
            booking_id: booking.id.clone(),
            destination: destination.to_string(),
            item: booking.activity_name.clone(),
            amount: booking.amount.clone(),
            status: booking.status,
            confirmation: booking.confirmation.clone(),
        }
    }
}

impl std::fmt::Display for BookingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} in {} | {} | {}",
            self.booking_id, self.item, self.destination, self.amount, self.status
        )?;
        if let Some(confirmation) = &self.confirmation {
            write!(f, " | confirmation {}", confirmation)?;
        }
        Ok(())
    }
}
