//! Per-run aggregation of tool results

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tools::{ProviderReason, ToolFailure, ToolKind, ToolPayload};

use super::itinerary::BookableRef;
use super::preferences::PreferenceSet;

/// A tool whose data is missing from the bundle, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolGap {
    pub tool: ToolKind,
    pub reason: ProviderReason,
    pub message: String,
}

impl std::fmt::Display for ToolGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.tool, self.reason, self.message)
    }
}

/// Successful tool payloads plus the preferences that drove them
///
/// Holds at most one payload per tool; a later merge for the same tool
/// replaces the earlier one and clears any gap recorded for it.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    preferences: Arc<PreferenceSet>,
    entries: BTreeMap<ToolKind, ToolPayload>,
    gaps: BTreeMap<ToolKind, ToolFailure>,
}

impl ContextBundle {
    pub fn new(preferences: Arc<PreferenceSet>) -> Self {
        Self {
            preferences,
            entries: BTreeMap::new(),
            gaps: BTreeMap::new(),
        }
    }

    pub fn preferences(&self) -> &PreferenceSet {
        &self.preferences
    }

    /// Store a successful payload under its tool
    pub fn merge(&mut self, payload: ToolPayload) {
        let kind = payload.kind();
        debug!(%kind, "ContextBundle::merge: called");
        self.gaps.remove(&kind);
        self.entries.insert(kind, payload);
    }

    /// Record that a tool produced no usable data
    ///
    /// Ignored when the tool already has a payload.
    pub fn record_gap(&mut self, kind: ToolKind, failure: ToolFailure) {
        debug!(%kind, reason = %failure.reason, "ContextBundle::record_gap: called");
        if self.entries.contains_key(&kind) {
            return;
        }
        self.gaps.insert(kind, failure);
    }

    pub fn get(&self, kind: ToolKind) -> Option<&ToolPayload> {
        self.entries.get(&kind)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ToolKind, &ToolPayload)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when at least one requested tool is missing
    pub fn is_partial(&self) -> bool {
        !self.gaps.is_empty()
    }

    pub fn gaps(&self) -> Vec<ToolGap> {
        self.gaps
            .iter()
            .map(|(tool, failure)| ToolGap {
                tool: *tool,
                reason: failure.reason,
                message: failure.message.clone(),
            })
            .collect()
    }

    /// Tools that contributed data
    pub fn tools(&self) -> Vec<ToolKind> {
        self.entries.keys().copied().collect()
    }

    /// Whether a bookable reference names an item this bundle exposes
    pub fn resolves(&self, reference: &BookableRef) -> bool {
        self.entries
            .get(&reference.tool)
            .map(|payload| payload.has_bookable(&reference.item_id))
            .unwrap_or(false)
    }

    /// Every bookable reference the model may use
    pub fn bookable_refs(&self) -> Vec<BookableRef> {
        self.entries
            .values()
            .flat_map(|payload| {
                let tool = payload.kind();
                payload
                    .bookable_ids()
                    .into_iter()
                    .map(move |id| BookableRef::new(tool, id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Money;
    use crate::tools::{EventListing, LocalEvent, LodgingOffer, LodgingResults};

    fn bundle() -> ContextBundle {
        ContextBundle::new(Arc::new(PreferenceSet::new(Money::new(1000.0, "INR"), 3)))
    }

    fn lodging(ids: &[&str]) -> ToolPayload {
        ToolPayload::Lodging(LodgingResults {
            offers: ids
                .iter()
                .map(|id| LodgingOffer {
                    id: id.to_string(),
                    name: id.to_string(),
                    price_per_night: Some(100.0),
                    currency: None,
                    lat: None,
                    lon: None,
                })
                .collect(),
        })
    }

    #[test]
    fn test_merge_is_last_write_wins() {
        let mut b = bundle();
        b.merge(lodging(&["hotel-1"]));
        b.merge(lodging(&["hotel-2"]));

        assert_eq!(b.len(), 1);
        assert!(b.resolves(&BookableRef::new(ToolKind::Lodging, "hotel-2")));
        assert!(!b.resolves(&BookableRef::new(ToolKind::Lodging, "hotel-1")));
    }

    #[test]
    fn test_success_clears_gap() {
        let mut b = bundle();
        b.record_gap(ToolKind::Lodging, ToolFailure::new(ProviderReason::Timeout, "slow"));
        assert!(b.is_partial());

        b.merge(lodging(&["hotel-1"]));
        assert!(!b.is_partial());

        // A late failure does not displace data already collected
        b.record_gap(ToolKind::Lodging, ToolFailure::new(ProviderReason::Timeout, "slow"));
        assert!(!b.is_partial());
    }

    #[test]
    fn test_gaps_and_bookable_refs() {
        let mut b = bundle();
        b.merge(ToolPayload::Events(EventListing {
            events: vec![LocalEvent {
                id: "event-7".to_string(),
                name: "Teej".to_string(),
                starts_at: None,
                venue: None,
                is_free: true,
                url: None,
            }],
        }));
        b.record_gap(ToolKind::Weather, ToolFailure::new(ProviderReason::Unavailable, "no key"));

        let gaps = b.gaps();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].tool, ToolKind::Weather);
        assert_eq!(gaps[0].to_string(), "weather (unavailable): no key");

        assert_eq!(b.bookable_refs(), vec![BookableRef::new(ToolKind::Events, "event-7")]);
        assert!(!b.resolves(&BookableRef::new(ToolKind::Lodging, "event-7")));
        assert_eq!(b.tools(), vec![ToolKind::Events]);
    }
}
