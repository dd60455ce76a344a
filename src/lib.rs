//! FlexiTrip - trip planning agent with live travel context
//!
//! FlexiTrip turns a traveller's preferences into a day-by-day itinerary.
//! A planning run gathers real-time context from tool providers, asks a
//! language model for a plan, and accepts the plan only if it decodes
//! cleanly and fits the budget. Bookable items of a plan can then be paid
//! for and confirmed.
//!
//! # Modules
//!
//! - [`tools`] - tool registry, providers and the request/response protocol
//! - [`planning`] - planning run state machine, prompt and itinerary validation
//! - [`booking`] - booking and payment state machines
//! - [`store`] - SQLite persistence and analytics sink
//! - [`llm`] - model client trait with Gemini and Anthropic implementations
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod booking;
pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod planning;
pub mod store;
pub mod tools;

// Re-export commonly used types
pub use booking::{
    Booking, BookingDesk, BookingError, BookingStatus, IdempotencyKey, Payment, PaymentDetails, PaymentProcessor,
    PaymentStatus, SimulatedProcessor,
};
pub use config::{Config, LlmConfig, PlanningConfig, ToolsConfig};
pub use domain::{BookingId, Money, PaymentId, RunId, TripId};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use planning::{
    ContextBundle, Itinerary, PlanFailure, PlannedTrip, PlanningAgent, PlanningError, PreferenceSet, RunState,
    TravelStyle, ValidationError,
};
pub use store::{AnalyticsEvent, AnalyticsSink, TripRecord, TripStore};
pub use tools::{
    ToolKind, ToolPayload, ToolProvider, ToolRegistry, ToolRequest, ToolResponse, providers::standard_registry,
};
