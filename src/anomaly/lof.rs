//! Local outlier factor anomaly detection
//!
//! Scores each row by comparing its local reachability density to that of
//! its k nearest neighbors (Euclidean distance over the feature columns).
//! A row in a much sparser neighborhood than its neighbors gets a factor
//! well above 1 and ranks as an outlier.
//!
//! Neighbor search is brute force and breaks distance ties by row index,
//! so the output is deterministic for a fixed input ordering.

use ndarray::Array2;

use super::{flag_count, flag_top_scores, DetectorOutput, OutlierDetector};
use crate::error::{DetectorError, DetectorResult};

/// Guard against division by zero for co-located points
const MIN_DENSITY_SUM: f64 = 1e-10;

/// Local outlier factor detector
#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    /// Neighborhood size k
    pub neighbors: usize,
    /// Fraction of rows to flag, in (0, 1)
    pub contamination: f64,
}

impl LocalOutlierFactor {
    /// Create a new detector with neighborhood size `neighbors`
    pub fn new(neighbors: usize, contamination: f64) -> Self {
        Self {
            neighbors,
            contamination,
        }
    }

    /// LOF score per row (higher = locally sparser = more anomalous)
    fn local_outlier_factors(&self, data: &Array2<f64>) -> Vec<f64> {
        let n = data.nrows();
        let k = self.neighbors;

        // Pairwise Euclidean distances
        let mut distances = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = euclidean(data, i, j);
                distances[i][j] = d;
                distances[j][i] = d;
            }
        }

        // k nearest neighbors per row, ties by row index
        let mut neighbor_sets: Vec<Vec<usize>> = Vec::with_capacity(n);
        let mut k_distance = vec![0.0; n];
        for i in 0..n {
            let mut order: Vec<usize> = (0..n).filter(|&j| j != i).collect();
            order.sort_by(|&a, &b| {
                distances[i][a]
                    .partial_cmp(&distances[i][b])
                    .unwrap()
                    .then(a.cmp(&b))
            });
            order.truncate(k);
            k_distance[i] = distances[i][order[k - 1]];
            neighbor_sets.push(order);
        }

        // Local reachability density: inverse mean reachability distance
        let mut lrd = vec![0.0; n];
        for i in 0..n {
            let reach_sum: f64 = neighbor_sets[i]
                .iter()
                .map(|&j| distances[i][j].max(k_distance[j]))
                .sum();
            lrd[i] = k as f64 / reach_sum.max(MIN_DENSITY_SUM);
        }

        // Factor: mean neighbor density relative to own density
        (0..n)
            .map(|i| {
                let neighbor_density: f64 =
                    neighbor_sets[i].iter().map(|&j| lrd[j]).sum::<f64>() / k as f64;
                neighbor_density / lrd[i]
            })
            .collect()
    }
}

impl OutlierDetector for LocalOutlierFactor {
    fn detect(&mut self, data: &Array2<f64>) -> DetectorResult<DetectorOutput> {
        assert!(
            data.iter().all(|v| v.is_finite()),
            "local outlier factor requires dense finite input; run the fill stage first"
        );

        let n = data.nrows();
        if n == 0 {
            return Err(DetectorError::EmptyInput);
        }
        if self.neighbors == 0 || self.neighbors >= n {
            return Err(DetectorError::InsufficientRows {
                rows: n,
                neighbors: self.neighbors,
            });
        }

        let scores = self.local_outlier_factors(data);
        let flags = flag_top_scores(&scores, flag_count(n, self.contamination));

        Ok(DetectorOutput::new(flags, scores))
    }

    fn name(&self) -> &'static str {
        "LocalOutlierFactor"
    }
}

fn euclidean(data: &Array2<f64>, i: usize, j: usize) -> f64 {
    (0..data.ncols())
        .map(|c| {
            let d = data[[i, c]] - data[[j, c]];
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
