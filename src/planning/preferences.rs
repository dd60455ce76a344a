//! Preference set submitted to a planning run

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Money;

use super::error::PlanningError;

/// How the traveller wants to pace the trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelStyle {
    Relaxed,
    Adventure,
    Cultural,
    #[default]
    Mixed,
}

impl std::fmt::Display for TravelStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Relaxed => "relaxed",
            Self::Adventure => "adventure",
            Self::Cultural => "cultural",
            Self::Mixed => "mixed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TravelStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relaxed" => Ok(Self::Relaxed),
            "adventure" => Ok(Self::Adventure),
            "cultural" => Ok(Self::Cultural),
            "mixed" => Ok(Self::Mixed),
            other => Err(format!("Unknown travel style: {}", other)),
        }
    }
}

/// What the traveller asked for
///
/// Built once and handed to a run by value; the agent never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceSet {
    /// May be absent when the model is expected to suggest one
    pub destination: Option<String>,
    pub origin: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// Ceiling for the whole group and trip
    pub budget: Money,
    pub duration_days: u32,
    pub style: TravelStyle,
    pub group_size: u32,
    pub interests: BTreeSet<String>,
}

impl PreferenceSet {
    pub fn new(budget: Money, duration_days: u32) -> Self {
        Self {
            destination: None,
            origin: None,
            start_date: None,
            budget,
            duration_days,
            style: TravelStyle::default(),
            group_size: 1,
            interests: BTreeSet::new(),
        }
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn style(mut self, style: TravelStyle) -> Self {
        self.style = style;
        self
    }

    pub fn group_size(mut self, group_size: u32) -> Self {
        self.group_size = group_size;
        self
    }

    /// Interest tags are trimmed, lowercased and deduplicated
    pub fn interests<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.interests = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    /// Destination with surrounding whitespace removed, if non-empty
    pub fn known_destination(&self) -> Option<&str> {
        self.destination.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }

    pub fn known_origin(&self) -> Option<&str> {
        self.origin.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }

    /// Structural checks: positive budget, duration and group of at least one
    pub fn validate(&self) -> Result<(), PlanningError> {
        debug!(duration_days = self.duration_days, group_size = self.group_size, "PreferenceSet::validate: called");
        if !self.budget.amount.is_finite() || self.budget.amount <= 0.0 {
            return Err(PlanningError::InvalidPreferences(format!(
                "budget must be greater than zero, got {}",
                self.budget.amount
            )));
        }
        if self.budget.currency.is_empty() {
            return Err(PlanningError::InvalidPreferences("budget currency is required".to_string()));
        }
        if self.duration_days < 1 {
            return Err(PlanningError::InvalidPreferences("duration must be at least 1 day".to_string()));
        }
        if self.group_size < 1 {
            return Err(PlanningError::InvalidPreferences("group size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs() -> PreferenceSet {
        PreferenceSet::new(Money::new(1000.0, "inr"), 3)
            .destination(" Jaipur ")
            .style(TravelStyle::Cultural)
            .group_size(2)
            .interests(["Forts", "food ", "forts", ""])
    }

    #[test]
    fn test_builder() {
        let p = prefs();
        assert_eq!(p.known_destination(), Some("Jaipur"));
        assert_eq!(p.known_origin(), None);
        assert_eq!(p.budget.currency, "INR");
        assert_eq!(p.interests.len(), 2);
        assert!(p.interests.contains("forts"));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_budget = PreferenceSet::new(Money::new(0.0, "INR"), 3);
        assert!(matches!(zero_budget.validate(), Err(PlanningError::InvalidPreferences(_))));

        let nan_budget = PreferenceSet::new(Money::new(f64::NAN, "INR"), 3);
        assert!(nan_budget.validate().is_err());

        let zero_days = PreferenceSet::new(Money::new(100.0, "INR"), 0);
        assert!(zero_days.validate().is_err());

        let empty_group = prefs().group_size(0);
        assert!(empty_group.validate().is_err());
    }

    #[test]
    fn test_travel_style_parse() {
        assert_eq!("Cultural".parse::<TravelStyle>(), Ok(TravelStyle::Cultural));
        assert!("luxury".parse::<TravelStyle>().is_err());
        assert_eq!(TravelStyle::Adventure.to_string(), "adventure");
    }

    #[test]
    fn test_blank_destination_is_unknown() {
        let p = PreferenceSet::new(Money::new(10.0, "USD"), 1).destination("   ");
        assert_eq!(p.known_destination(), None);
    }
}
