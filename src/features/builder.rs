//! Provider-day feature construction
//!
//! Turns raw claim events into a time-ordered feature table: per-day
//! claim counts, allowed-amount statistics, and trailing moving averages
//! partitioned by provider.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::{ClaimEvent, ProviderDay};

/// Aggregated features for one provider on one calendar day.
///
/// `std_allowed` is NaN when the provider-day has a single claim (sample
/// standard deviation is undefined for n = 1); the fill stage replaces it
/// with 0.0 before anything downstream consumes the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDayFeature {
    pub day: NaiveDate,
    pub provider_id: String,
    /// Number of claims observed on this day
    pub claims_cnt: u32,
    /// Mean allowed amount
    pub avg_allowed: f64,
    /// Sample standard deviation of allowed amounts
    pub std_allowed: f64,
    /// Trailing mean of `claims_cnt` over `[day - W, day]`
    pub ma_claims: f64,
    /// Trailing mean of `avg_allowed` over the same window
    pub ma_allowed: f64,
}

impl ProviderDayFeature {
    /// The `(day, provider_id)` key of this row
    pub fn key(&self) -> ProviderDay {
        ProviderDay::new(self.day, self.provider_id.clone())
    }
}

/// Builder for the provider-day feature table
pub struct FeatureBuilder {
    /// Trailing window length W; a moving average covers up to W+1 days
    pub window_days: u32,
}

impl FeatureBuilder {
    /// Create a builder with the given trailing window length
    pub fn new(window_days: u32) -> Self {
        Self { window_days }
    }

    /// Build the feature table from raw claim events.
    ///
    /// Output holds exactly one row per observed `(day, provider_id)` pair
    /// with at least one claim, sorted ascending by that key. Days without
    /// claims produce no row and contribute nothing to the moving averages
    /// (no gap-filling, no look-ahead).
    pub fn build(&self, events: &[ClaimEvent]) -> Vec<ProviderDayFeature> {
        // Group allowed amounts by (day, provider); BTreeMap iteration
        // yields the final (day, provider_id) ascending order for free.
        let mut groups: BTreeMap<ProviderDay, Vec<f64>> = BTreeMap::new();
        for event in events {
            groups
                .entry(ProviderDay::new(event.day(), event.provider_id.clone()))
                .or_default()
                .push(event.allowed_amt);
        }

        let mut rows: Vec<ProviderDayFeature> = groups
            .into_iter()
            .map(|(key, amounts)| {
                let (mean, std) = mean_and_sample_std(&amounts);
                ProviderDayFeature {
                    day: key.day,
                    provider_id: key.provider_id,
                    claims_cnt: amounts.len() as u32,
                    avg_allowed: mean,
                    std_allowed: std,
                    ma_claims: f64::NAN,
                    ma_allowed: f64::NAN,
                }
            })
            .collect();

        self.apply_trailing_means(&mut rows);
        rows
    }

    /// Fill in `ma_claims` / `ma_allowed` for every row.
    ///
    /// Per provider, rows are already chronological; each window spans the
    /// calendar days `[day - W, day]` inclusive, so it holds at most W+1
    /// points and fewer wherever the provider has no claims on a day.
    fn apply_trailing_means(&self, rows: &mut [ProviderDayFeature]) {
        let mut by_provider: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            by_provider
                .entry(row.provider_id.clone())
                .or_default()
                .push(i);
        }

        let window = Duration::days(i64::from(self.window_days));

        for indices in by_provider.values() {
            let series: Vec<(NaiveDate, f64, f64)> = indices
                .iter()
                .map(|&i| (rows[i].day, f64::from(rows[i].claims_cnt), rows[i].avg_allowed))
                .collect();

            let mut start = 0;
            for (pos, &i) in indices.iter().enumerate() {
                let earliest = series[pos].0 - window;
                while series[start].0 < earliest {
                    start += 1;
                }

                let span = &series[start..=pos];
                let n = span.len() as f64;
                rows[i].ma_claims = span.iter().map(|&(_, cnt, _)| cnt).sum::<f64>() / n;
                rows[i].ma_allowed = span.iter().map(|&(_, _, avg)| avg).sum::<f64>() / n;
            }
        }
    }
}

/// Mean and sample standard deviation; std is NaN for fewer than 2 values.
fn mean_and_sample_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    if n < 2 {
        return (mean, f64::NAN);
    }

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, variance.sqrt())
}
