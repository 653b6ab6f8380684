//! Zero-fill stage between feature construction and detection
//!
//! Detectors require dense numeric input, so every missing value (only
//! `std_allowed` can be missing by construction) is replaced with 0.0
//! here, in one auditable place. The comparison stage reads the same
//! zero-filled rows, so "no data" and "exactly zero" are deliberately
//! indistinguishable downstream of this stage.

use ndarray::Array2;

use super::builder::ProviderDayFeature;
use crate::data::ProviderDay;

/// Numeric columns handed to the detectors, in matrix column order
pub const FEATURE_COLUMNS: [&str; 5] = [
    "claims_cnt",
    "avg_allowed",
    "std_allowed",
    "ma_claims",
    "ma_allowed",
];

/// Dense, zero-filled feature table.
///
/// `rows[i]` and `data.row(i)` describe the same provider-day; the stored
/// rows already carry the zero-filled values.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Zero-filled feature rows, sorted by `(day, provider_id)`
    pub rows: Vec<ProviderDayFeature>,
    /// Matrix view of [`FEATURE_COLUMNS`], aligned with `rows`
    pub data: Array2<f64>,
}

impl FeatureMatrix {
    /// Number of provider-day rows
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of numeric feature columns
    pub fn n_features(&self) -> usize {
        FEATURE_COLUMNS.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Key of row `i`
    pub fn key(&self, i: usize) -> ProviderDay {
        self.rows[i].key()
    }
}

/// Replace missing values with 0.0 and materialize the dense matrix.
pub fn to_matrix(features: &[ProviderDayFeature]) -> FeatureMatrix {
    let rows: Vec<ProviderDayFeature> = features
        .iter()
        .map(|row| ProviderDayFeature {
            avg_allowed: fill(row.avg_allowed),
            std_allowed: fill(row.std_allowed),
            ma_claims: fill(row.ma_claims),
            ma_allowed: fill(row.ma_allowed),
            ..row.clone()
        })
        .collect();

    let data = Array2::from_shape_fn((rows.len(), FEATURE_COLUMNS.len()), |(i, j)| {
        let row = &rows[i];
        match j {
            0 => f64::from(row.claims_cnt),
            1 => row.avg_allowed,
            2 => row.std_allowed,
            3 => row.ma_claims,
            _ => row.ma_allowed,
        }
    });

    FeatureMatrix { rows, data }
}

fn fill(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}
