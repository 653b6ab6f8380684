//! Pipeline configuration
//!
//! All tunables live in an explicit [`PipelineConfig`] passed into the
//! pipeline entry point. The environment-variable constructor exists for
//! deployments that configure through the process environment; nothing in
//! the library reads the environment on its own.

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

/// Parameters for the isolation forest detector.
#[derive(Debug, Clone)]
pub struct IsolationForestParams {
    /// Number of trees in the ensemble
    pub n_estimators: usize,
    /// Expected fraction of rows to flag, in (0, 1)
    pub contamination: f64,
    /// Seed for the tree ensemble
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            contamination: 0.02,
            seed: 42,
        }
    }
}

/// Parameters for the local outlier factor detector.
#[derive(Debug, Clone)]
pub struct LofParams {
    /// Neighborhood size for the density estimate
    pub neighbors: usize,
    /// Expected fraction of rows to flag, in (0, 1)
    pub contamination: f64,
}

impl Default for LofParams {
    fn default() -> Self {
        Self {
            neighbors: 20,
            contamination: 0.02,
        }
    }
}

/// Configuration for a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Trailing window length W; each moving average covers `[day - W, day]`
    pub window_days: u32,
    /// Minimum number of feature rows required to score at all
    pub min_rows: usize,
    /// Isolation forest parameters
    pub isolation: IsolationForestParams,
    /// Local outlier factor parameters
    pub lof: LofParams,
    /// Number of providers kept in the flag-count ranking
    pub top_providers: usize,
    /// Upper bound on the sampled joint view
    pub sample_rows: usize,
    /// Seed for the joint-view sampling
    pub sample_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            min_rows: 2000,
            isolation: IsolationForestParams::default(),
            lof: LofParams::default(),
            top_providers: 15,
            sample_rows: 8000,
            sample_seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the process environment.
    ///
    /// Recognized variables: `WINDOW_DAYS`, `MIN_ROWS`, `ISO_CONTAMINATION`,
    /// `LOF_CONTAMINATION`, `LOF_NEIGHBORS`, `SEED`. Unset variables keep
    /// their defaults; unparsable values are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(w) = read_var::<u32>("WINDOW_DAYS")? {
            config.window_days = w;
        }
        if let Some(m) = read_var::<usize>("MIN_ROWS")? {
            config.min_rows = m;
        }
        if let Some(c) = read_var::<f64>("ISO_CONTAMINATION")? {
            config.isolation.contamination = c;
        }
        if let Some(c) = read_var::<f64>("LOF_CONTAMINATION")? {
            config.lof.contamination = c;
        }
        if let Some(k) = read_var::<usize>("LOF_NEIGHBORS")? {
            config.lof.neighbors = k;
        }
        if let Some(s) = read_var::<u64>("SEED")? {
            config.isolation.seed = s;
            config.sample_seed = s;
        }

        Ok(config)
    }

    /// Set the trailing window length.
    pub fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    /// Set the minimum row threshold.
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    /// Set the isolation forest parameters.
    pub fn with_isolation(mut self, params: IsolationForestParams) -> Self {
        self.isolation = params;
        self
    }

    /// Set the local outlier factor parameters.
    pub fn with_lof(mut self, params: LofParams) -> Self {
        self.lof = params;
        self
    }
}

fn read_var<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { var, value: raw }),
        Err(_) => Ok(None),
    }
}
