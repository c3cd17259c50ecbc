//! Price Sample Types
//!
//! Core domain type for the simulated feed: an immutable price sample.
//! Samples are codec-agnostic; the transport layer decides how they are
//! framed on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Feed Constants
// =============================================================================

/// Symbol carried by every generated sample.
pub const SYMBOL: &str = "AAPL";

/// Lower bound applied to every raw simulated price.
pub const MIN_PRICE: f64 = 0.0;

// =============================================================================
// Price Sample
// =============================================================================

/// One observed price for a symbol.
///
/// Samples have no identity beyond their fields. Transformations always
/// produce a new sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Instrument symbol.
    pub symbol: String,
    /// Simulated price.
    pub price: f64,
    /// Capture time.
    #[serde(rename = "time")]
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    /// Create a validated sample.
    ///
    /// # Errors
    ///
    /// Returns `PriceError` if the symbol is empty or the price is not finite.
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, PriceError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(PriceError::EmptySymbol);
        }
        if !price.is_finite() {
            return Err(PriceError::NonFinitePrice(price));
        }
        Ok(Self {
            symbol,
            price,
            observed_at,
        })
    }

    /// New sample with the price moved by `offset`, same timestamp.
    #[must_use]
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            symbol: self.symbol.clone(),
            price: self.price + offset,
            observed_at: self.observed_at,
        }
    }

    /// New sample with the price moved by `offset` and a fresh timestamp.
    #[must_use]
    pub fn shifted_at(&self, offset: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            symbol: self.symbol.clone(),
            price: self.price + offset,
            observed_at,
        }
    }
}

/// Sample validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PriceError {
    /// Symbol was empty or whitespace.
    #[error("price sample symbol cannot be empty")]
    EmptySymbol,
    /// Price was NaN or infinite.
    #[error("price sample price must be finite, got {0}")]
    NonFinitePrice(f64),
}

// =============================================================================
// Tests
// =============================================================================
