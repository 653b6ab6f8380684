//! End-to-end pipeline: events to features to labels to comparison
//!
//! Single-pass batch computation. The feature table is built once, gated
//! on a minimum row count, densified by the fill stage, scored by both
//! detectors, and summarized. A local-outlier-factor failure degrades the
//! run to single-detector mode instead of aborting it.

use tracing::{debug, info, warn};

use crate::anomaly::{DetectorOutput, IsolationForest, LocalOutlierFactor, OutlierDetector};
use crate::compare::{join_labels, Comparator, ComparisonSummary, JoinedRow};
use crate::config::PipelineConfig;
use crate::data::ClaimEvent;
use crate::error::DetectorError;
use crate::features::{to_matrix, FeatureBuilder, FeatureMatrix};

/// Result of a pipeline run.
///
/// Too little data is a normal outcome, not an error: the run terminates
/// cleanly with no labels and no comparison.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Fewer feature rows than the configured minimum; nothing was scored
    InsufficientData { rows: usize, min_rows: usize },
    /// Full run with labels and comparison summary
    Completed(Box<PipelineReport>),
}

/// Everything a completed run exposes to downstream sinks.
#[derive(Debug)]
pub struct PipelineReport {
    /// Dense, zero-filled feature table
    pub features: FeatureMatrix,
    /// Isolation forest output
    pub iso: DetectorOutput,
    /// Local outlier factor output, or the reason it could not run
    pub lof: Result<DetectorOutput, DetectorError>,
    /// Feature table joined with both label sets (archival sink)
    pub joined: Vec<JoinedRow>,
    /// Agreement summary (reporting and plotting sinks)
    pub summary: ComparisonSummary,
}

impl PipelineReport {
    /// True when both detectors produced labels
    pub fn lof_available(&self) -> bool {
        self.lof.is_ok()
    }

    /// Rows flagged by at least one detector (review sink)
    pub fn flagged_rows(&self) -> Vec<&JoinedRow> {
        self.joined.iter().filter(|row| row.flagged()).collect()
    }

    /// Rows flagged by the isolation forest
    pub fn iso_flagged(&self) -> Vec<&JoinedRow> {
        self.joined.iter().filter(|row| row.anomaly_iso).collect()
    }

    /// Rows flagged by the local outlier factor
    pub fn lof_flagged(&self) -> Vec<&JoinedRow> {
        self.joined.iter().filter(|row| row.anomaly_lof).collect()
    }
}

/// Run the full pipeline over a batch of claim events.
pub fn run_pipeline(events: &[ClaimEvent], config: &PipelineConfig) -> PipelineOutcome {
    let builder = FeatureBuilder::new(config.window_days);
    let features = builder.build(events);
    debug!(
        events = events.len(),
        rows = features.len(),
        "built provider-day feature table"
    );

    if features.len() < config.min_rows {
        info!(
            rows = features.len(),
            min_rows = config.min_rows,
            "not enough feature rows to score; skipping detection"
        );
        return PipelineOutcome::InsufficientData {
            rows: features.len(),
            min_rows: config.min_rows,
        };
    }

    let matrix = to_matrix(&features);

    let mut iso = IsolationForest::new(
        config.isolation.n_estimators,
        config.isolation.contamination,
    )
    .with_seed(config.isolation.seed);
    let iso_output = iso.label(&matrix.data);
    info!(
        flagged = iso_output.anomaly_count(),
        rate = iso_output.anomaly_rate(),
        "isolation forest labels"
    );

    let mut lof = LocalOutlierFactor::new(config.lof.neighbors, config.lof.contamination);
    let lof_output = lof.detect(&matrix.data);
    match &lof_output {
        Ok(output) => info!(
            flagged = output.anomaly_count(),
            rate = output.anomaly_rate(),
            "local outlier factor labels"
        ),
        Err(err) => warn!(
            error = %err,
            "local outlier factor skipped; comparison limited to the isolation forest"
        ),
    }

    let joined = join_labels(&matrix, &iso_output, lof_output.as_ref().ok());
    let comparator = Comparator::new()
        .with_top_n(config.top_providers)
        .with_sample_rows(config.sample_rows)
        .with_sample_seed(config.sample_seed);
    let summary = comparator.summarize(&joined);

    PipelineOutcome::Completed(Box::new(PipelineReport {
        features: matrix,
        iso: iso_output,
        lof: lof_output,
        joined,
        summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(day: u32, provider: &str, amount: f64) -> ClaimEvent {
        ClaimEvent::new(
            Utc.with_ymd_and_hms(2024, 2, day, 12, 0, 0).unwrap(),
            provider,
            amount,
        )
    }

    #[test]
    fn test_insufficient_data_is_clean() {
        let events = vec![event(1, "P1", 100.0), event(2, "P1", 110.0)];
        let config = PipelineConfig::default().with_min_rows(10);

        match run_pipeline(&events, &config) {
            PipelineOutcome::InsufficientData { rows, min_rows } => {
                assert_eq!(rows, 2);
                assert_eq!(min_rows, 10);
            }
            PipelineOutcome::Completed(_) => panic!("expected clean early termination"),
        }
    }

    #[test]
    fn test_degrades_without_lof() {
        // 8 provider-days but the default k=20 neighborhood cannot be built
        let events: Vec<ClaimEvent> = (1..=8)
            .map(|d| event(d, "P1", 100.0 + d as f64))
            .collect();
        let config = PipelineConfig::default().with_min_rows(1);

        match run_pipeline(&events, &config) {
            PipelineOutcome::Completed(report) => {
                assert!(!report.lof_available());
                assert_eq!(report.iso.is_anomaly.len(), 8);
                assert!(report.joined.iter().all(|r| !r.anomaly_lof));
                assert_eq!(report.summary.overlap.lof_only, 0);
            }
            PipelineOutcome::InsufficientData { .. } => panic!("expected a completed run"),
        }
    }
}
