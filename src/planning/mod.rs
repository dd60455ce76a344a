//! Planning module - turns a preference set into a validated itinerary
//!
//! # Architecture
//!
//! ```text
//! PreferenceSet → PlanningAgent ─ collect ─→ ToolRegistry → ContextBundle
//!                      │
//!                      └─ generate ─→ PromptRenderer → LlmClient → decode → validate
//!
//! PlannedTrip → ChatContext → TripChat → LlmClient → ChatReply
//! ```
//!
//! A run is owned by the task that calls [`PlanningAgent::plan`]. Tool data
//! is best effort and missing tools show up as gaps; the model output is
//! strictly validated and rejected outright when wrong.

mod agent;
mod bundle;
mod chat;
mod error;
mod itinerary;
mod preferences;
mod prompt;

pub use agent::{PlanFailure, PlannedTrip, PlanningAgent, PlanningRun, RunState, build_request, select_tools};
pub use bundle::{ContextBundle, ToolGap};
pub use chat::{ChatContext, ChatError, ChatReply, ChatTurn, TripChat, suggestions as chat_suggestions};
pub use error::{PlanningError, ValidationError};
pub use itinerary::{
    Activity, ActivityCategory, BookableRef, Day, Itinerary, TimeWindow, decode as decode_itinerary,
    validate as validate_itinerary,
};
pub use preferences::{PreferenceSet, TravelStyle};
pub use prompt::{PromptRenderer, RenderedPrompt};
