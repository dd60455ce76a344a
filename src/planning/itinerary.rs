//! Itinerary model and strict decode/validation of model output
//!
//! The model's text is untrusted. [`decode`] turns it into an [`Itinerary`]
//! or a [`ValidationError`]; [`validate`] then checks it against the run's
//! bundle and budget. Nothing here repairs output.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Money;
use crate::tools::ToolKind;

use super::bundle::ContextBundle;
use super::error::ValidationError;

/// Link from an activity to a purchasable item, written `tool:item-id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookableRef {
    pub tool: ToolKind,
    pub item_id: String,
}

impl BookableRef {
    pub fn new(tool: ToolKind, item_id: impl Into<String>) -> Self {
        Self {
            tool,
            item_id: item_id.into(),
        }
    }
}

impl std::fmt::Display for BookableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tool, self.item_id)
    }
}

impl std::str::FromStr for BookableRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tool, item) = s
            .split_once(':')
            .ok_or_else(|| format!("bookable reference '{}' is not of the form tool:item", s))?;
        let item = item.trim();
        if item.is_empty() {
            return Err(format!("bookable reference '{}' has no item id", s));
        }
        Ok(Self::new(tool.parse()?, item))
    }
}

impl TryFrom<String> for BookableRef {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BookableRef> for String {
    fn from(r: BookableRef) -> Self {
        r.to_string()
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
            .map_err(|_| serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
    }
}

/// Start and end of an activity, local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Spending category used by the cost breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Lodging,
    Sightseeing,
    Dining,
    Transport,
    Event,
    #[default]
    Other,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 6] = [
        Self::Lodging,
        Self::Sightseeing,
        Self::Dining,
        Self::Transport,
        Self::Event,
        Self::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Lodging => "Accommodation",
            Self::Sightseeing => "Sightseeing",
            Self::Dining => "Food & Dining",
            Self::Transport => "Transportation",
            Self::Event => "Events",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub window: TimeWindow,
    pub location: String,
    /// Estimated cost for the whole group, in the itinerary currency
    pub cost_estimate: f64,
    #[serde(default)]
    pub category: ActivityCategory,
    #[serde(default)]
    pub bookable: Option<BookableRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    /// 1-based, consecutive
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub title: String,
    pub destination: String,
    pub currency: String,
    pub days: Vec<Day>,
}

impl Itinerary {
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.days.iter().flat_map(|d| d.activities.iter())
    }

    pub fn activity_count(&self) -> usize {
        self.days.iter().map(|d| d.activities.len()).sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.activities().map(|a| a.cost_estimate).sum()
    }

    pub fn total(&self) -> Money {
        Money::new(self.total_cost(), &self.currency)
    }

    pub fn bookable_activities(&self) -> impl Iterator<Item = &Activity> {
        self.activities().filter(|a| a.bookable.is_some())
    }

    /// Find an activity by name, case-insensitively
    pub fn find_activity(&self, name: &str) -> Option<&Activity> {
        self.activities().find(|a| a.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Remove a surrounding markdown code fence, if any
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (`json`) up to the first newline
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Decode model text into an itinerary
///
/// Accepts a bare JSON object, optionally inside one code fence. Required
/// fields must be present and well-typed; structural rules (day numbering,
/// time windows, cost sign) are checked here too.
pub fn decode(raw: &str) -> Result<Itinerary, ValidationError> {
    debug!(raw_len = raw.len(), "decode: called");
    let body = strip_fence(raw);
    if body.is_empty() {
        return Err(ValidationError::Schema("model returned no content".to_string()));
    }

    let itinerary: Itinerary =
        serde_json::from_str(body).map_err(|e| ValidationError::Schema(format!("itinerary JSON: {}", e)))?;

    if itinerary.title.trim().is_empty() {
        return Err(ValidationError::Schema("title is empty".to_string()));
    }
    if itinerary.currency.trim().is_empty() {
        return Err(ValidationError::Schema("currency is empty".to_string()));
    }

    for (idx, day) in itinerary.days.iter().enumerate() {
        let expected = idx as u32 + 1;
        if day.number != expected {
            return Err(ValidationError::Schema(format!(
                "day numbers must run 1..n in order; found {} at position {}",
                day.number, expected
            )));
        }
        for activity in &day.activities {
            if activity.name.trim().is_empty() {
                return Err(ValidationError::Schema(format!("day {} has an activity without a name", day.number)));
            }
            if activity.window.end < activity.window.start {
                return Err(ValidationError::Schema(format!(
                    "activity '{}' ends before it starts ({})",
                    activity.name, activity.window
                )));
            }
            if !activity.cost_estimate.is_finite() || activity.cost_estimate < 0.0 {
                return Err(ValidationError::Schema(format!(
                    "activity '{}' has an invalid cost estimate {}",
                    activity.name, activity.cost_estimate
                )));
            }
        }
    }

    Ok(itinerary)
}

/// Check a decoded itinerary against the run's bundle and budget
pub fn validate(itinerary: &Itinerary, bundle: &ContextBundle, tolerance: f64) -> Result<(), ValidationError> {
    let preferences = bundle.preferences();
    debug!(days = itinerary.days.len(), tolerance, "validate: called");

    if itinerary.activity_count() == 0 {
        return Err(ValidationError::EmptyPlan);
    }

    if itinerary.days.len() as u32 > preferences.duration_days {
        return Err(ValidationError::Schema(format!(
            "itinerary has {} days but the trip lasts {}",
            itinerary.days.len(),
            preferences.duration_days
        )));
    }

    if !preferences.budget.same_currency(&itinerary.currency) {
        return Err(ValidationError::Schema(format!(
            "itinerary currency {} does not match budget currency {}",
            itinerary.currency, preferences.budget.currency
        )));
    }

    if let Some(unresolved) = itinerary
        .activities()
        .filter_map(|a| a.bookable.as_ref())
        .find(|r| !bundle.resolves(r))
    {
        return Err(ValidationError::Schema(format!(
            "bookable reference {} does not match any tool result",
            unresolved
        )));
    }

    let total = itinerary.total_cost();
    let ceiling = preferences.budget.amount * (1.0 + tolerance);
    if total > ceiling {
        return Err(ValidationError::BudgetExceeded {
            total,
            ceiling,
            currency: preferences.budget.currency.clone(),
        });
    }

    Ok(())
}
