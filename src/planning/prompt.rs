//! Bounded prompt rendering for itinerary generation

use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::bundle::ContextBundle;
use super::error::PlanningError;

const SYSTEM_TEMPLATE: &str = "\
You are FlexiTrip, a travel planner. Reply with a single JSON object and nothing else.

The object must have this shape:
{
  \"title\": string,
  \"destination\": string,
  \"currency\": \"{{currency}}\",
  \"days\": [
    {
      \"number\": 1,
      \"theme\": string (optional),
      \"activities\": [
        {
          \"name\": string,
          \"window\": { \"start\": \"HH:MM\", \"end\": \"HH:MM\" },
          \"location\": string,
          \"cost_estimate\": number (total for the whole group),
          \"category\": \"lodging\" | \"sightseeing\" | \"dining\" | \"transport\" | \"event\" | \"other\",
          \"bookable\": \"tool:item-id\" or null,
          \"notes\": string (optional)
        }
      ]
    }
  ]
}

Rules:
- Number days from 1 with no gaps and plan at most {{duration}} days.
- The sum of all cost_estimate values must not exceed {{budget}} {{currency}}.
- Only set \"bookable\" to one of the references listed under BOOKABLE ITEMS. Otherwise use null.
";

const USER_TEMPLATE: &str = "\
TRIP REQUIREMENTS:
- Destination: {{destination}}
{{#if origin}}- Starting from: {{origin}}
{{/if}}{{#if start_date}}- Start date: {{start_date}}
{{/if}}- Duration: {{duration}} days
- Budget: {{budget}} {{currency}}
- Group size: {{group_size}}
- Travel style: {{style}}
- Interests: {{interests}}

REAL-TIME CONTEXT:
{{#each sections}}
[{{this.tool}}]
{{this.body}}
{{/each}}
{{#if gaps}}
UNAVAILABLE DATA (plan without it):
{{#each gaps}}- {{this}}
{{/each}}{{/if}}
BOOKABLE ITEMS:
{{#if bookable}}{{#each bookable}}- {{this}}
{{/each}}{{else}}- none
{{/if}}{{#if previous_failure}}
Your previous answer was rejected: {{previous_failure}}
Correct this and answer again with JSON only.
{{/if}}";

#[derive(Debug, Serialize)]
struct PromptSection {
    tool: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct PromptContext {
    destination: String,
    origin: Option<String>,
    start_date: Option<String>,
    duration: u32,
    budget: String,
    currency: String,
    group_size: u32,
    style: String,
    interests: String,
    sections: Vec<PromptSection>,
    gaps: Vec<String>,
    bookable: Vec<String>,
    previous_failure: Option<String>,
}

/// Rendered system and user prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Renders the generation prompt with the tool context capped in size
pub struct PromptRenderer {
    hbs: Handlebars<'static>,
    max_context_chars: usize,
    max_items_per_tool: usize,
}

impl PromptRenderer {
    pub fn new(max_context_chars: usize, max_items_per_tool: usize) -> Self {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        Self {
            hbs,
            max_context_chars,
            max_items_per_tool,
        }
    }

    /// Render the prompt for one generation attempt
    ///
    /// `previous_failure` describes why the last attempt was rejected.
    pub fn render(&self, bundle: &ContextBundle, previous_failure: Option<&str>) -> Result<RenderedPrompt, PlanningError> {
        debug!(
            entries = bundle.len(),
            retry = previous_failure.is_some(),
            "PromptRenderer::render: called"
        );
        let prefs = bundle.preferences();
        let context = PromptContext {
            destination: prefs
                .known_destination()
                .unwrap_or("not specified - suggest one that fits the interests and budget")
                .to_string(),
            origin: prefs.known_origin().map(str::to_string),
            start_date: prefs.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            duration: prefs.duration_days,
            budget: format!("{:.2}", prefs.budget.amount),
            currency: prefs.budget.currency.clone(),
            group_size: prefs.group_size,
            style: prefs.style.to_string(),
            interests: if prefs.interests.is_empty() {
                "general sightseeing".to_string()
            } else {
                prefs.interests.iter().cloned().collect::<Vec<_>>().join(", ")
            },
            sections: self.sections(bundle)?,
            gaps: bundle.gaps().iter().map(|g| g.to_string()).collect(),
            bookable: self.bookable(bundle),
            previous_failure: previous_failure.map(str::to_string),
        };

        let system = self
            .hbs
            .render_template(SYSTEM_TEMPLATE, &context)
            .map_err(|e| PlanningError::Prompt(e.to_string()))?;
        let user = self
            .hbs
            .render_template(USER_TEMPLATE, &context)
            .map_err(|e| PlanningError::Prompt(e.to_string()))?;
        Ok(RenderedPrompt { system, user })
    }

    /// References to items the summarised context actually shows
    fn bookable(&self, bundle: &ContextBundle) -> Vec<String> {
        bundle
            .entries()
            .flat_map(|(kind, payload)| {
                payload
                    .summarized(self.max_items_per_tool)
                    .bookable_ids()
                    .into_iter()
                    .map(|id| format!("{}:{}", kind, id))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Serialise each payload, summarised, until the character budget is spent
    fn sections(&self, bundle: &ContextBundle) -> Result<Vec<PromptSection>, PlanningError> {
        let mut remaining = self.max_context_chars;
        let mut sections = Vec::new();

        for (kind, payload) in bundle.entries() {
            if remaining == 0 {
                sections.push(PromptSection {
                    tool: kind.to_string(),
                    body: "(omitted: context limit reached)".to_string(),
                });
                continue;
            }
            let body = serde_json::to_string(&payload.summarized(self.max_items_per_tool))
                .map_err(|e| PlanningError::Prompt(e.to_string()))?;
            let body = if body.chars().count() > remaining {
                let cut: String = body.chars().take(remaining).collect();
                format!("{}...(truncated)", cut)
            } else {
                body
            };
            remaining = remaining.saturating_sub(body.chars().count());
            sections.push(PromptSection {
                tool: kind.to_string(),
                body,
            });
        }

        Ok(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Money;
    use crate::planning::preferences::{PreferenceSet, TravelStyle};
    use crate::tools::{LodgingOffer, LodgingResults, ProviderReason, ToolFailure, ToolKind, ToolPayload, WeatherReport};
    use std::sync::Arc;

    fn bundle(offers: usize) -> ContextBundle {
        let prefs = PreferenceSet::new(Money::new(15000.0, "INR"), 3)
            .destination("Jaipur")
            .origin("Delhi")
            .style(TravelStyle::Cultural)
            .group_size(2)
            .interests(["forts", "food"]);
        let mut bundle = ContextBundle::new(Arc::new(prefs));
        bundle.merge(ToolPayload::Weather(WeatherReport {
            location: "Jaipur".to_string(),
            temperature_c: 33.0,
            conditions: "clear sky".to_string(),
            humidity_pct: Some(20),
            recommendations: vec!["Go early".to_string()],
        }));
        bundle.merge(ToolPayload::Lodging(LodgingResults {
            offers: (0..offers)
                .map(|i| LodgingOffer {
                    id: format!("hotel-{}", i),
                    name: format!("Haveli number {}", i),
                    price_per_night: Some(2400.0),
                    currency: Some("INR".to_string()),
                    lat: None,
                    lon: None,
                })
                .collect(),
        }));
        bundle.record_gap(ToolKind::Events, ToolFailure::new(ProviderReason::Timeout, "deadline exceeded"));
        bundle
    }

    #[test]
    fn test_render_includes_requirements_and_context() {
        let renderer = PromptRenderer::new(10_000, 5);
        let prompt = renderer.render(&bundle(2), None).unwrap();

        assert!(prompt.system.contains("\"currency\": \"INR\""));
        assert!(prompt.system.contains("at most 3 days"));
        assert!(prompt.user.contains("- Destination: Jaipur"));
        assert!(prompt.user.contains("- Starting from: Delhi"));
        assert!(prompt.user.contains("- Interests: food, forts"));
        assert!(prompt.user.contains("[weather]"));
        assert!(prompt.user.contains("clear sky"));
        assert!(prompt.user.contains("- events (timeout): deadline exceeded"));
        assert!(prompt.user.contains("- lodging:hotel-1"));
        assert!(!prompt.user.contains("rejected"));
    }

    #[test]
    fn test_render_notes_previous_failure() {
        let renderer = PromptRenderer::new(10_000, 5);
        let prompt = renderer
            .render(&bundle(1), Some("Schema error: missing field `days`"))
            .unwrap();
        assert!(prompt.user.contains("rejected: Schema error: missing field `days`"));
    }

    #[test]
    fn test_context_is_bounded() {
        let renderer = PromptRenderer::new(300, 50);
        let prompt = renderer.render(&bundle(40), None).unwrap();
        let context = prompt
            .user
            .split("REAL-TIME CONTEXT:")
            .nth(1)
            .and_then(|s| s.split("UNAVAILABLE DATA").next())
            .unwrap();
        // 300 chars of payload plus section headers and truncation markers
        assert!(context.len() < 400, "context was {} chars", context.len());
        assert!(context.contains("(truncated)") || context.contains("(omitted"));
    }

    #[test]
    fn test_items_are_summarized() {
        let renderer = PromptRenderer::new(100_000, 3);
        let prompt = renderer.render(&bundle(20), None).unwrap();
        let section = prompt.user.split("[lodging]").nth(1).unwrap();
        let section = section.split("UNAVAILABLE DATA").next().unwrap();
        assert!(section.contains("hotel-2\""));
        assert!(!section.contains("hotel-3\""));
        assert!(!prompt.user.contains("lodging:hotel-3"));
    }
}
