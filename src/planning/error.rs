//! Planning error types

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

use super::agent::RunState;

/// Generated itinerary rejected by validation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Budget exceeded: estimated {total:.2} {currency} is over the {ceiling:.2} {currency} ceiling")]
    BudgetExceeded { total: f64, ceiling: f64, currency: String },

    #[error("Empty plan: the itinerary contains no activities")]
    EmptyPlan,
}

impl ValidationError {
    /// Stable code for logs and analytics
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::EmptyPlan => "empty_plan",
        }
    }
}

/// Terminal failure of a planning run
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("Invalid preferences: {0}")]
    InvalidPreferences(String),

    #[error("Model error: {0}")]
    Model(#[from] LlmError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Planning run timed out after {0:?}")]
    Timeout(Duration),

    #[error("Illegal run transition: {from:?} -> {to:?}")]
    State { from: RunState, to: RunState },

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),
}

impl PlanningError {
    /// Stable code for logs and analytics
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPreferences(_) => "invalid_preferences",
            Self::Model(_) => "model",
            Self::Validation(v) => v.code(),
            Self::Timeout(_) => "timeout",
            Self::State { .. } => "state",
            Self::Prompt(_) => "prompt",
        }
    }
}
