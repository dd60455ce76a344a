//! Currency-tagged amounts

use serde::{Deserialize, Serialize};

/// An amount in a named currency
///
/// Amounts are plain `f64` estimates; no cross-currency arithmetic is performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into().trim().to_uppercase(),
        }
    }

    /// True when both amounts are in the same currency
    pub fn same_currency(&self, other: &str) -> bool {
        self.currency.eq_ignore_ascii_case(other.trim())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.amount)
    }
}
