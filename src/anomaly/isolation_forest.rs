//! Isolation forest anomaly detection
//!
//! Ensemble of randomized partition trees; rows that isolate in fewer
//! splits score as more anomalous. Fully reproducible for a fixed seed
//! and input row order.

use ndarray::{Array2, ArrayView1};
use rand::prelude::*;

use super::{flag_count, flag_top_scores, DetectorOutput, OutlierDetector};
use crate::error::DetectorResult;

/// Euler-Mascheroni constant, for the average BST path-length term
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// A node in an isolation tree
#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// Single randomized partition tree over a subsample of rows
#[derive(Debug, Clone)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(data: &Array2<f64>, indices: &mut [usize], max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::build_node(data, indices, 0, max_depth, rng),
        }
    }

    fn build_node(
        data: &Array2<f64>,
        indices: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        if depth >= max_depth || indices.len() <= 1 {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let feature = rng.gen_range(0..data.ncols());
        let (mut min_val, mut max_val) = (f64::INFINITY, f64::NEG_INFINITY);
        for &i in indices.iter() {
            let v = data[[i, feature]];
            min_val = min_val.min(v);
            max_val = max_val.max(v);
        }

        // Constant column on this subset: nothing left to split on
        if max_val - min_val < 1e-12 {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let threshold = rng.gen_range(min_val..max_val);

        // Partition indices in place around the threshold
        let split = partition(indices, |i| data[[i, feature]] < threshold);
        if split == 0 || split == indices.len() {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let (left_indices, right_indices) = indices.split_at_mut(split);
        let left = Self::build_node(data, left_indices, depth + 1, max_depth, rng);
        let right = Self::build_node(data, right_indices, depth + 1, max_depth, rng);

        Node::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Splits taken to isolate `sample`, plus the unresolved-leaf estimate
    fn path_length(&self, sample: &ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;

        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] < *threshold {
                        left
                    } else {
                        right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Move indices satisfying `pred` to the front, returning the split point
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut split = 0;
    for i in 0..indices.len() {
        if pred(indices[i]) {
            indices.swap(split, i);
            split += 1;
        }
    }
    split
}

/// Isolation forest detector
#[derive(Debug, Clone)]
pub struct IsolationForest {
    /// Number of trees in the ensemble
    pub n_estimators: usize,
    /// Fraction of rows to flag, in (0, 1)
    pub contamination: f64,
    /// Rows subsampled per tree
    pub max_samples: usize,
    /// Seed for the ensemble construction
    pub seed: u64,
    trees: Vec<IsolationTree>,
    /// Normalization constant for the subsample size used at fit time
    norm: f64,
}

impl IsolationForest {
    /// Create a new isolation forest
    pub fn new(n_estimators: usize, contamination: f64) -> Self {
        Self {
            n_estimators,
            contamination,
            max_samples: 256,
            seed: 42,
            trees: Vec::new(),
            norm: 1.0,
        }
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the per-tree subsample size
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Build the tree ensemble over `data`
    pub fn fit(&mut self, data: &Array2<f64>) {
        let n_rows = data.nrows();
        let subsample = self.max_samples.min(n_rows).max(1);
        let max_depth = (subsample as f64).log2().ceil().max(1.0) as usize;

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.norm = average_path_length(subsample).max(f64::MIN_POSITIVE);

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let mut indices: Vec<usize> = (0..n_rows).choose_multiple(&mut rng, subsample);
                IsolationTree::build(data, &mut indices, max_depth, &mut rng)
            })
            .collect();
    }

    /// Fit, score, and flag the contamination fraction in one step.
    ///
    /// Unlike the neighborhood detector this cannot fail on well-formed
    /// input, so it returns the output directly.
    pub fn label(&mut self, data: &Array2<f64>) -> DetectorOutput {
        assert!(
            data.iter().all(|v| v.is_finite()),
            "isolation forest requires dense finite input; run the fill stage first"
        );

        if data.nrows() == 0 {
            return DetectorOutput::new(vec![], vec![]);
        }

        self.fit(data);
        let scores = self.score_samples(data);
        let flags = flag_top_scores(&scores, flag_count(data.nrows(), self.contamination));

        DetectorOutput::new(flags, scores)
    }

    /// Anomaly score per row: `2^(-E[path] / c(subsample))`, in (0, 1)
    pub fn score_samples(&self, data: &Array2<f64>) -> Vec<f64> {
        (0..data.nrows())
            .map(|i| {
                let sample = data.row(i);
                let mean_path: f64 = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(&sample))
                    .sum::<f64>()
                    / self.trees.len() as f64;

                2.0_f64.powf(-mean_path / self.norm)
            })
            .collect()
    }
}

impl OutlierDetector for IsolationForest {
    fn detect(&mut self, data: &Array2<f64>) -> DetectorResult<DetectorOutput> {
        Ok(self.label(data))
    }

    fn name(&self) -> &'static str {
        "IsolationForest"
    }
}
