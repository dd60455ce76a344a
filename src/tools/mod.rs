//! Context protocol layer
//!
//! Tool providers expose external data (weather, lodging, events, routing)
//! behind one request/response contract. The [`ToolRegistry`] binds names to
//! providers and enforces a per-call deadline, so a slow or failing provider
//! becomes a typed error response instead of stalling the planning run.

mod error;
mod metrics;
mod payload;
mod protocol;
mod registry;
mod traits;

pub mod providers;

pub use error::{ProtocolError, ProviderError, ProviderReason};
pub use metrics::{ToolMetrics, ToolStats};
pub use payload::{
    EventListing, LocalEvent, LodgingOffer, LodgingResults, RoutePlan, ToolKind, ToolPayload, WeatherReport,
};
pub use protocol::{ToolArgs, ToolFailure, ToolOutcome, ToolRequest, ToolResponse, ToolStatus};
pub use registry::{DEFAULT_CALL_TIMEOUT, ToolRegistry};
pub use traits::{ToolProvider, optional_str, required_str};
