//! Unsupervised outlier detection over the provider-day feature matrix
//!
//! Two independent detectors:
//! - `isolation_forest`: ensemble of randomized partition trees
//! - `lof`: local outlier factor over k nearest neighbors
//!
//! Both consume the same dense matrix and flag a fixed contamination
//! fraction of rows; neither sees the other's output.

mod isolation_forest;
mod lof;

pub use isolation_forest::*;
pub use lof::*;

use std::cmp::Ordering;

use ndarray::Array2;

use crate::data::ProviderDay;
use crate::error::DetectorResult;
use crate::features::FeatureMatrix;

/// Result of running one detector over the feature matrix.
///
/// Both vectors are aligned with the matrix rows the detector scored.
#[derive(Debug, Clone)]
pub struct DetectorOutput {
    /// Binary flags, one per feature row
    pub is_anomaly: Vec<bool>,
    /// Continuous anomaly scores (higher = more anomalous)
    pub scores: Vec<f64>,
}

impl DetectorOutput {
    /// Create a new detector output
    pub fn new(is_anomaly: Vec<bool>, scores: Vec<f64>) -> Self {
        Self { is_anomaly, scores }
    }

    /// Indices of flagged rows
    pub fn flagged_indices(&self) -> Vec<usize> {
        self.is_anomaly
            .iter()
            .enumerate()
            .filter_map(|(i, &flag)| flag.then_some(i))
            .collect()
    }

    /// Keys of flagged rows in `matrix`
    pub fn flagged_keys(&self, matrix: &FeatureMatrix) -> Vec<ProviderDay> {
        self.flagged_indices()
            .into_iter()
            .map(|i| matrix.key(i))
            .collect()
    }

    /// Number of flagged rows
    pub fn anomaly_count(&self) -> usize {
        self.is_anomaly.iter().filter(|&&flag| flag).count()
    }

    /// Fraction of rows flagged
    pub fn anomaly_rate(&self) -> f64 {
        if self.is_anomaly.is_empty() {
            0.0
        } else {
            self.anomaly_count() as f64 / self.is_anomaly.len() as f64
        }
    }
}

/// Trait for batch outlier detectors over the feature matrix.
///
/// Input must be dense: a NaN reaching a detector is a programming error
/// upstream of the fill stage and panics rather than silently producing
/// garbage labels.
pub trait OutlierDetector {
    /// Score every row and flag the contamination fraction
    fn detect(&mut self, data: &Array2<f64>) -> DetectorResult<DetectorOutput>;

    /// Name of the detector
    fn name(&self) -> &'static str;
}

/// Number of rows a detector flags for a given contamination fraction.
///
/// Always at least one row for non-empty input, matching the "most
/// anomalous `ceil(rows * contamination)`" labeling rule.
pub(crate) fn flag_count(rows: usize, contamination: f64) -> usize {
    (rows as f64 * contamination).ceil() as usize
}

/// Flag the `count` highest-scoring rows; ties broken by row order.
pub(crate) fn flag_top_scores(scores: &[f64], count: usize) -> Vec<bool> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut flags = vec![false; scores.len()];
    for &i in order.iter().take(count) {
        flags[i] = true;
    }
    flags
}
