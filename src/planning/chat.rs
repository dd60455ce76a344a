//! TripChat - travel questions answered by the model with trip context
//!
//! One model call per question. Earlier exchanges about the same trip are
//! sent as conversation history. Follow-up suggestions are picked locally
//! from the question and the context, never by the model.

use std::sync::Arc;

use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message};

use super::agent::PlannedTrip;
use super::preferences::PreferenceSet;

/// Default max tokens for a chat reply
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Earlier exchanges sent along with a question
const MAX_HISTORY: usize = 6;

const SYSTEM_TEMPLATE: &str = "\
You are FlexiTrip, a friendly and knowledgeable travel assistant.

Guidelines:
- Give specific advice the traveller can act on.
- Share cultural insight about the destination when it helps.
- Keep the budget in mind and mention rough costs where you can.
- Ask a follow-up question when the request is unclear.
- Answer in plain text, not JSON.
";

const USER_TEMPLATE: &str = "\
{{#if has_context}}CURRENT CONTEXT:
{{#if destination}}- Destination: {{destination}}
{{/if}}{{#if budget}}- Budget: {{budget}}
{{/if}}{{#if duration_days}}- Duration: {{duration_days}} days
{{/if}}{{#if interests}}- Interests: {{interests}}
{{/if}}{{#if itinerary}}- Current plan:
{{#each itinerary}}  {{this}}
{{/each}}{{/if}}
{{/if}}User asked: \"{{message}}\"
";

/// Errors from a chat exchange
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Model error: {0}")]
    Model(#[from] LlmError),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "empty_message",
            Self::Model(e) => e.code(),
            Self::Prompt(_) => "prompt",
        }
    }
}

/// What the assistant knows about the traveller's plans
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatContext {
    pub destination: Option<String>,
    pub budget: Option<String>,
    pub duration_days: Option<u32>,
    pub interests: Vec<String>,
    /// One line per planned day
    pub itinerary: Vec<String>,
}

impl ChatContext {
    pub fn from_preferences(preferences: &PreferenceSet) -> Self {
        Self {
            destination: preferences.known_destination().map(str::to_string),
            budget: Some(preferences.budget.to_string()),
            duration_days: Some(preferences.duration_days),
            interests: preferences.interests.iter().cloned().collect(),
            itinerary: Vec::new(),
        }
    }

    /// Preferences of a planned trip plus a day-by-day outline of its itinerary
    pub fn from_trip(trip: &PlannedTrip) -> Self {
        let mut context = Self::from_preferences(&trip.preferences);
        if !trip.itinerary.destination.trim().is_empty() {
            context.destination = Some(trip.itinerary.destination.clone());
        }
        context.itinerary = trip
            .itinerary
            .days
            .iter()
            .map(|day| {
                let names: Vec<&str> = day.activities.iter().map(|a| a.name.as_str()).collect();
                format!("Day {}: {}", day.number, names.join(", "))
            })
            .collect();
        context
    }

    pub fn is_empty(&self) -> bool {
        self.destination.is_none()
            && self.budget.is_none()
            && self.duration_days.is_none()
            && self.interests.is_empty()
            && self.itinerary.is_empty()
    }
}

/// An earlier question and the answer it got
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub message: String,
    pub reply: String,
}

/// Answer to one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub suggestions: Vec<String>,
    /// Whether trip context was sent with the question
    pub context_used: bool,
}

#[derive(Debug, Serialize)]
struct ChatPrompt<'a> {
    has_context: bool,
    destination: Option<&'a str>,
    budget: Option<&'a str>,
    duration_days: Option<u32>,
    interests: Option<String>,
    itinerary: &'a [String],
    message: &'a str,
}

/// Answers travel questions through a language model
pub struct TripChat {
    llm: Arc<dyn LlmClient>,
    hbs: Handlebars<'static>,
    max_tokens: u32,
}

impl TripChat {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        Self {
            llm,
            hbs,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Ask one question
    ///
    /// Only the newest exchanges of `history` are sent.
    pub async fn ask(&self, message: &str, context: &ChatContext, history: &[ChatTurn]) -> Result<ChatReply, ChatError> {
        debug!(message_len = message.len(), history = history.len(), "TripChat::ask: called");
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let request = self.request(message, context, history)?;
        let reply = self
            .llm
            .complete(request)
            .await
            .and_then(CompletionResponse::into_text)
            .map_err(|e| {
                warn!(code = e.code(), transient = e.is_transient(), error = %e, "ask: model call failed");
                ChatError::Model(e)
            })?;

        let context_used = !context.is_empty();
        info!(reply_len = reply.len(), context_used, "ask: answered");
        Ok(ChatReply {
            reply: reply.trim().to_string(),
            suggestions: suggestions(message, context),
            context_used,
        })
    }

    fn request(&self, message: &str, context: &ChatContext, history: &[ChatTurn]) -> Result<CompletionRequest, ChatError> {
        let prompt = ChatPrompt {
            has_context: !context.is_empty(),
            destination: context.destination.as_deref(),
            budget: context.budget.as_deref(),
            duration_days: context.duration_days,
            interests: (!context.interests.is_empty()).then(|| context.interests.join(", ")),
            itinerary: &context.itinerary,
            message,
        };
        let user = self
            .hbs
            .render_template(USER_TEMPLATE, &prompt)
            .map_err(|e| ChatError::Prompt(e.to_string()))?;

        let skip = history.len().saturating_sub(MAX_HISTORY);
        let mut messages: Vec<Message> = history[skip..]
            .iter()
            .flat_map(|turn| [Message::user(&turn.message), Message::assistant(&turn.reply)])
            .collect();
        messages.push(Message::user(user));

        Ok(CompletionRequest {
            system_prompt: SYSTEM_TEMPLATE.to_string(),
            messages,
            max_tokens: self.max_tokens,
        })
    }
}

/// Follow-up questions to offer after an answer
///
/// A known destination wins; otherwise the topic of the message decides.
pub fn suggestions(message: &str, context: &ChatContext) -> Vec<String> {
    if let Some(destination) = context.destination.as_deref() {
        return vec![
            format!("Tell me more about {} culture", destination),
            format!("What's the best time to visit {}?", destination),
            "Help me optimize my budget".to_string(),
        ];
    }

    let lower = message.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    let picks: [&str; 3] = if mentions(&["budget", "money", "cost"]) {
        [
            "How can I save money on accommodation?",
            "What are the hidden costs in travel?",
            "Budget-friendly food options?",
        ]
    } else if mentions(&["food", "eat", "restaurant"]) {
        [
            "Best local dishes to try",
            "Street food safety tips",
            "Authentic dining experiences",
        ]
    } else if mentions(&["culture", "tradition", "local"]) {
        [
            "Local festivals and events",
            "Cultural etiquette tips",
            "Traditional experiences to try",
        ]
    } else {
        [
            "Plan a trip for me",
            "Tell me about popular destinations",
            "What should I pack for my trip?",
        ]
    };
    picks.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Money;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{LlmError, Role};

    fn jaipur() -> ChatContext {
        ChatContext::from_preferences(
            &PreferenceSet::new(Money::new(15000.0, "INR"), 3)
                .destination("Jaipur")
                .interests(["forts", "food"]),
        )
    }

    #[test]
    fn test_suggestions_follow_destination_first() {
        let picks = suggestions("where should I eat?", &jaipur());
        assert_eq!(picks[0], "Tell me more about Jaipur culture");
        assert_eq!(picks[1], "What's the best time to visit Jaipur?");
    }

    #[test]
    fn test_suggestions_by_topic() {
        let none = ChatContext::default();
        assert_eq!(
            suggestions("How much does it COST?", &none)[0],
            "How can I save money on accommodation?"
        );
        assert_eq!(suggestions("any good restaurant?", &none)[0], "Best local dishes to try");
        assert_eq!(suggestions("tell me about traditions", &none)[0], "Local festivals and events");
        assert_eq!(suggestions("hello", &none)[0], "Plan a trip for me");
        assert_eq!(suggestions("hello", &none).len(), 3);
    }

    #[tokio::test]
    async fn test_ask_sends_context_and_returns_suggestions() {
        let llm = Arc::new(MockLlmClient::texts(&["  Try the Amber Fort at sunrise.  "]));
        let chat = TripChat::new(llm.clone());

        let reply = chat.ask("What should I see first?", &jaipur(), &[]).await.unwrap();

        assert_eq!(reply.reply, "Try the Amber Fort at sunrise.");
        assert!(reply.context_used);
        assert_eq!(reply.suggestions.len(), 3);

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("CURRENT CONTEXT:"));
        assert!(prompt.contains("- Destination: Jaipur"));
        assert!(prompt.contains("- Budget: INR 15000.00"));
        assert!(prompt.contains("- Duration: 3 days"));
        assert!(prompt.contains("- Interests: food, forts"));
        assert!(prompt.contains("User asked: \"What should I see first?\""));
    }

    #[tokio::test]
    async fn test_ask_without_context() {
        let llm = Arc::new(MockLlmClient::texts(&["Hello!"]));
        let chat = TripChat::new(llm.clone());

        let reply = chat.ask("hi", &ChatContext::default(), &[]).await.unwrap();

        assert!(!reply.context_used);
        assert!(!llm.prompts()[0].contains("CURRENT CONTEXT"));
        assert_eq!(reply.suggestions[0], "Plan a trip for me");
    }

    #[tokio::test]
    async fn test_history_is_sent_newest_last() {
        let llm = Arc::new(MockLlmClient::texts(&["Sure."]));
        let chat = TripChat::new(llm.clone());
        let history: Vec<ChatTurn> = (0..10)
            .map(|i| ChatTurn {
                message: format!("question {}", i),
                reply: format!("answer {}", i),
            })
            .collect();

        let request = chat.request("and now?", &jaipur(), &history).unwrap();

        // Six earlier exchanges, two messages each, then the question
        assert_eq!(request.messages.len(), MAX_HISTORY * 2 + 1);
        assert_eq!(request.messages[0].content, "question 4");
        assert_eq!(request.messages[1].role, Role::Assistant);
        assert!(request.messages.last().unwrap().content.contains("and now?"));

        chat.ask("and now?", &jaipur(), &history).await.unwrap();
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_message_skips_model() {
        let llm = Arc::new(MockLlmClient::texts(&["unused"]));
        let chat = TripChat::new(llm.clone());

        let err = chat.ask("   ", &jaipur(), &[]).await.unwrap_err();

        assert!(matches!(err, ChatError::EmptyMessage));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let llm = Arc::new(MockLlmClient::new(vec![Err(LlmError::Blocked("SAFETY".to_string()))]));
        let chat = TripChat::new(llm);

        let err = chat.ask("Is it safe at night?", &jaipur(), &[]).await.unwrap_err();

        assert!(matches!(err, ChatError::Model(LlmError::Blocked(_))));
        assert_eq!(err.code(), "blocked");
    }
}
