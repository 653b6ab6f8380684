//! Claim event data structures
//!
//! Core types for representing healthcare claim events and the
//! provider-day aggregation key used throughout the pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Single claim event from the upstream event store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEvent {
    /// Timestamp of the claim event
    pub event_ts: DateTime<Utc>,
    /// Provider that submitted the claim
    pub provider_id: String,
    /// Allowed amount for the claim
    pub allowed_amt: f64,
}

impl ClaimEvent {
    /// Create a new claim event
    pub fn new(event_ts: DateTime<Utc>, provider_id: impl Into<String>, allowed_amt: f64) -> Self {
        Self {
            event_ts,
            provider_id: provider_id.into(),
            allowed_amt,
        }
    }

    /// Calendar day of the event (UTC)
    pub fn day(&self) -> NaiveDate {
        self.event_ts.date_naive()
    }
}

/// Aggregation key: one provider's activity on one calendar day.
///
/// Ordering is `(day, provider_id)` ascending, which is the natural sort
/// order of the feature table and every derived structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderDay {
    pub day: NaiveDate,
    pub provider_id: String,
}

impl ProviderDay {
    /// Create a new provider-day key
    pub fn new(day: NaiveDate, provider_id: impl Into<String>) -> Self {
        Self {
            day,
            provider_id: provider_id.into(),
        }
    }
}

impl std::fmt::Display for ProviderDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.day, self.provider_id)
    }
}
