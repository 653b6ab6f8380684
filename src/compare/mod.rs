//! Agreement analysis between the two detectors
//!
//! Joins both label sets back onto the feature table and derives the
//! comparison summary: per-day flag rates, overlap counts with Jaccard
//! index, a provider ranking, and a seeded sample of joined rows for
//! visualization. Everything here only reads its inputs.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::anomaly::DetectorOutput;
use crate::data::ProviderDay;
use crate::features::FeatureMatrix;

/// Providers kept in the flag-count ranking
pub const TOP_PROVIDERS: usize = 15;
/// Upper bound on the sampled joint view
pub const MAX_SAMPLE_ROWS: usize = 8000;

/// One feature row joined with both detectors' labels and scores.
///
/// Rows missing from a detector's label set carry `false`, and a zero
/// score when the detector did not run at all; downstream consumers never
/// see a missing label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedRow {
    pub day: NaiveDate,
    pub provider_id: String,
    pub claims_cnt: u32,
    pub avg_allowed: f64,
    pub std_allowed: f64,
    pub ma_claims: f64,
    pub ma_allowed: f64,
    pub iso_score: f64,
    pub anomaly_iso: bool,
    pub lof_score: f64,
    pub anomaly_lof: bool,
}

impl JoinedRow {
    /// The `(day, provider_id)` key of this row
    pub fn key(&self) -> ProviderDay {
        ProviderDay::new(self.day, self.provider_id.clone())
    }

    /// True if either detector flagged this row
    pub fn flagged(&self) -> bool {
        self.anomaly_iso || self.anomaly_lof
    }
}

/// Percentage of a day's provider rows flagged by each detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRate {
    pub day: NaiveDate,
    pub iso_pct: f64,
    pub lof_pct: f64,
}

/// Overlap between the two label sets over the full table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlapCounts {
    /// Flagged by both detectors
    pub both: usize,
    /// Flagged by the isolation forest only
    pub iso_only: usize,
    /// Flagged by the local outlier factor only
    pub lof_only: usize,
    /// Flagged by at least one detector
    pub either: usize,
    /// `both / either`, 0.0 when `either` is 0; rounded to 4 decimals
    pub jaccard: f64,
}

impl OverlapCounts {
    /// Flat `(metric, value)` records for reporting sinks
    pub fn as_records(&self) -> Vec<OverlapRecord> {
        vec![
            OverlapRecord::new("ISO only", self.iso_only as f64),
            OverlapRecord::new("LOF only", self.lof_only as f64),
            OverlapRecord::new("Both", self.both as f64),
            OverlapRecord::new("Either", self.either as f64),
            OverlapRecord::new("Jaccard overlap", self.jaccard),
        ]
    }
}

/// One row of the flat overlap report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapRecord {
    pub metric: String,
    pub value: f64,
}

impl OverlapRecord {
    fn new(metric: &str, value: f64) -> Self {
        Self {
            metric: metric.to_string(),
            value,
        }
    }
}

/// Per-provider flag totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFlagCounts {
    pub provider_id: String,
    pub iso_count: usize,
    pub lof_count: usize,
}

/// Mutually exclusive flag category for a sampled row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagCategory {
    Both,
    #[serde(rename = "ISO only")]
    IsoOnly,
    #[serde(rename = "LOF only")]
    LofOnly,
    None,
}

impl FlagCategory {
    /// Assign a category; `Both` wins over single flags, `None` last
    pub fn of(row: &JoinedRow) -> Self {
        match (row.anomaly_iso, row.anomaly_lof) {
            (true, true) => Self::Both,
            (true, false) => Self::IsoOnly,
            (false, true) => Self::LofOnly,
            (false, false) => Self::None,
        }
    }
}

impl std::fmt::Display for FlagCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Both => "Both",
            Self::IsoOnly => "ISO only",
            Self::LofOnly => "LOF only",
            Self::None => "None",
        };
        write!(f, "{label}")
    }
}

/// One sampled row of the joint view, for plotting only.
///
/// Kept flat so it serializes cleanly as one CSV record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledRow {
    pub day: NaiveDate,
    pub provider_id: String,
    pub claims_cnt: u32,
    pub avg_allowed: f64,
    pub anomaly_iso: bool,
    pub anomaly_lof: bool,
    pub category: FlagCategory,
}

impl SampledRow {
    fn of(row: &JoinedRow) -> Self {
        Self {
            day: row.day,
            provider_id: row.provider_id.clone(),
            claims_cnt: row.claims_cnt,
            avg_allowed: row.avg_allowed,
            anomaly_iso: row.anomaly_iso,
            anomaly_lof: row.anomaly_lof,
            category: FlagCategory::of(row),
        }
    }

    /// The `(day, provider_id)` key of this row
    pub fn key(&self) -> ProviderDay {
        ProviderDay::new(self.day, self.provider_id.clone())
    }
}

/// Full agreement summary between the two detectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSummary {
    /// Per-day flag rates, ascending by day
    pub daily_rates: Vec<DailyRate>,
    /// Overlap counts and Jaccard index over the full table
    pub overlap: OverlapCounts,
    /// Providers ranked by isolation-forest flag count
    pub top_providers: Vec<ProviderFlagCounts>,
    /// Seeded uniform sample of the joined table
    pub sample: Vec<SampledRow>,
}

/// Left-join the feature table with both detectors' label sets.
///
/// Joins on `(day, provider_id)` against each detector's flagged-key set;
/// a key absent from a set yields `false`. A detector that did not run
/// (`None`) contributes all-false labels and zero scores, which is what
/// degrades the summary to single-detector mode.
pub fn join_labels(
    features: &FeatureMatrix,
    iso: &DetectorOutput,
    lof: Option<&DetectorOutput>,
) -> Vec<JoinedRow> {
    let iso_flagged: HashSet<ProviderDay> = iso.flagged_keys(features).into_iter().collect();
    let lof_flagged: HashSet<ProviderDay> = lof
        .map(|output| output.flagged_keys(features).into_iter().collect())
        .unwrap_or_default();

    features
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let key = row.key();
            JoinedRow {
                day: row.day,
                provider_id: row.provider_id.clone(),
                claims_cnt: row.claims_cnt,
                avg_allowed: row.avg_allowed,
                std_allowed: row.std_allowed,
                ma_claims: row.ma_claims,
                ma_allowed: row.ma_allowed,
                iso_score: iso.scores[i],
                anomaly_iso: iso_flagged.contains(&key),
                lof_score: lof.map(|output| output.scores[i]).unwrap_or(0.0),
                anomaly_lof: lof_flagged.contains(&key),
            }
        })
        .collect()
}

/// Comparator over the joined feature/label table
#[derive(Debug, Clone)]
pub struct Comparator {
    /// Providers kept in the ranking
    pub top_n: usize,
    /// Sample size cap
    pub sample_rows: usize,
    /// Seed for the uniform sample
    pub sample_seed: u64,
}

impl Default for Comparator {
    fn default() -> Self {
        Self {
            top_n: TOP_PROVIDERS,
            sample_rows: MAX_SAMPLE_ROWS,
            sample_seed: 42,
        }
    }
}

impl Comparator {
    /// Create a comparator with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ranking size
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Set the sample size cap
    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    /// Set the sampling seed
    pub fn with_sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = seed;
        self
    }

    /// Join and summarize in one step.
    pub fn compare(
        &self,
        features: &FeatureMatrix,
        iso: &DetectorOutput,
        lof: Option<&DetectorOutput>,
    ) -> ComparisonSummary {
        self.summarize(&join_labels(features, iso, lof))
    }

    /// Derive the full summary from an already-joined table.
    pub fn summarize(&self, joined: &[JoinedRow]) -> ComparisonSummary {
        ComparisonSummary {
            daily_rates: daily_rates(joined),
            overlap: overlap_counts(joined),
            top_providers: top_providers(joined, self.top_n),
            sample: self.sample(joined),
        }
    }

    /// Uniform sample without replacement, categorized for plotting.
    fn sample(&self, joined: &[JoinedRow]) -> Vec<SampledRow> {
        let size = self.sample_rows.min(joined.len());
        let mut rng = StdRng::seed_from_u64(self.sample_seed);

        rand::seq::index::sample(&mut rng, joined.len(), size)
            .into_iter()
            .map(|i| SampledRow::of(&joined[i]))
            .collect()
    }
}

/// Percentage of each day's rows flagged, per detector, ascending by day.
pub fn daily_rates(joined: &[JoinedRow]) -> Vec<DailyRate> {
    let mut per_day: BTreeMap<NaiveDate, (usize, usize, usize)> = BTreeMap::new();
    for row in joined {
        let entry = per_day.entry(row.day).or_insert((0, 0, 0));
        entry.0 += 1;
        entry.1 += usize::from(row.anomaly_iso);
        entry.2 += usize::from(row.anomaly_lof);
    }

    per_day
        .into_iter()
        .map(|(day, (total, iso, lof))| DailyRate {
            day,
            iso_pct: 100.0 * iso as f64 / total as f64,
            lof_pct: 100.0 * lof as f64 / total as f64,
        })
        .collect()
}

/// Overlap counts and Jaccard index over the full joined table.
pub fn overlap_counts(joined: &[JoinedRow]) -> OverlapCounts {
    let mut counts = OverlapCounts::default();
    for row in joined {
        match (row.anomaly_iso, row.anomaly_lof) {
            (true, true) => counts.both += 1,
            (true, false) => counts.iso_only += 1,
            (false, true) => counts.lof_only += 1,
            (false, false) => {}
        }
    }
    counts.either = counts.both + counts.iso_only + counts.lof_only;

    counts.jaccard = if counts.either > 0 {
        let raw = counts.both as f64 / counts.either as f64;
        (raw * 10_000.0).round() / 10_000.0
    } else {
        0.0
    };

    counts
}

/// Providers ranked by isolation-forest flag count, descending; ties
/// resolve in provider-id order. Keeps the first `top_n`.
pub fn top_providers(joined: &[JoinedRow], top_n: usize) -> Vec<ProviderFlagCounts> {
    let mut per_provider: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in joined {
        let entry = per_provider.entry(&row.provider_id).or_insert((0, 0));
        entry.0 += usize::from(row.anomaly_iso);
        entry.1 += usize::from(row.anomaly_lof);
    }

    let mut ranking: Vec<ProviderFlagCounts> = per_provider
        .into_iter()
        .map(|(provider_id, (iso_count, lof_count))| ProviderFlagCounts {
            provider_id: provider_id.to_string(),
            iso_count,
            lof_count,
        })
        .collect();

    // BTreeMap iteration already ordered by provider id, so a stable sort
    // on the count leaves ties in natural key order.
    ranking.sort_by(|a, b| b.iso_count.cmp(&a.iso_count));
    ranking.truncate(top_n);
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::DetectorOutput;
    use crate::features::{to_matrix, ProviderDayFeature};

    fn feature(day: u32, provider: &str) -> ProviderDayFeature {
        ProviderDayFeature {
            day: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            provider_id: provider.to_string(),
            claims_cnt: 2,
            avg_allowed: 100.0,
            std_allowed: 5.0,
            ma_claims: 2.0,
            ma_allowed: 100.0,
        }
    }

    fn matrix_of(rows: Vec<ProviderDayFeature>) -> FeatureMatrix {
        to_matrix(&rows)
    }

    fn output(flags: &[bool]) -> DetectorOutput {
        let scores: Vec<f64> = flags.iter().map(|&f| if f { 0.9 } else { 0.1 }).collect();
        DetectorOutput::new(flags.to_vec(), scores)
    }

    #[test]
    fn test_join_fills_absent_labels_with_false() {
        let features = matrix_of(vec![feature(1, "P1"), feature(1, "P2"), feature(2, "P1")]);
        let iso = output(&[true, false, false]);

        let joined = join_labels(&features, &iso, None);
        assert_eq!(joined.len(), 3);
        assert!(joined[0].anomaly_iso);
        assert!(!joined[1].anomaly_iso);
        // Detector B absent: every row false, zero score, never missing
        assert!(joined.iter().all(|r| !r.anomaly_lof && r.lof_score == 0.0));
    }

    #[test]
    fn test_overlap_identities() {
        let features = matrix_of(vec![
            feature(1, "P1"),
            feature(1, "P2"),
            feature(2, "P1"),
            feature(2, "P2"),
        ]);
        let iso = output(&[true, true, false, false]);
        let lof = output(&[false, true, true, false]);

        let counts = overlap_counts(&join_labels(&features, &iso, Some(&lof)));
        assert_eq!(counts.both, 1);
        assert_eq!(counts.iso_only, 1);
        assert_eq!(counts.lof_only, 1);
        assert_eq!(counts.either, 3);
        assert_eq!(counts.both + counts.iso_only + counts.lof_only, counts.either);
        assert!((counts.jaccard - 0.3333).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard_bounds() {
        let features = matrix_of(vec![feature(1, "P1"), feature(1, "P2")]);

        // Identical non-empty label sets: jaccard exactly 1
        let same = output(&[true, false]);
        let counts = overlap_counts(&join_labels(&features, &same, Some(&same)));
        assert_eq!(counts.jaccard, 1.0);
        assert_eq!(counts.iso_only, 0);
        assert_eq!(counts.lof_only, 0);

        // No flags at all: either = 0 and jaccard defined as 0
        let none = output(&[false, false]);
        let counts = overlap_counts(&join_labels(&features, &none, Some(&none)));
        assert_eq!(counts.either, 0);
        assert_eq!(counts.jaccard, 0.0);
    }

    #[test]
    fn test_daily_rates_as_percentages() {
        let features = matrix_of(vec![
            feature(1, "P1"),
            feature(1, "P2"),
            feature(2, "P1"),
            feature(2, "P2"),
        ]);
        let iso = output(&[true, false, false, false]);
        let lof = output(&[false, false, true, true]);

        let rates = daily_rates(&join_labels(&features, &iso, Some(&lof)));
        assert_eq!(rates.len(), 2);
        assert!((rates[0].iso_pct - 50.0).abs() < 1e-12);
        assert_eq!(rates[0].lof_pct, 0.0);
        assert_eq!(rates[1].iso_pct, 0.0);
        assert!((rates[1].lof_pct - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_top_providers_ranking_and_ties() {
        let features = matrix_of(vec![
            feature(1, "PA"),
            feature(2, "PA"),
            feature(1, "PB"),
            feature(2, "PB"),
            feature(1, "PC"),
        ]);
        // PA and PB each flagged once by iso; PC never
        let iso = output(&[true, false, true, false, false]);
        let lof = output(&[false, false, true, true, false]);

        let ranking = top_providers(&join_labels(&features, &iso, Some(&lof)), 2);
        assert_eq!(ranking.len(), 2);
        // Tie on iso_count broken by provider id
        assert_eq!(ranking[0].provider_id, "PA");
        assert_eq!(ranking[1].provider_id, "PB");
        assert_eq!(ranking[1].lof_count, 2);
    }

    #[test]
    fn test_sample_bounded_and_reproducible() {
        let rows: Vec<ProviderDayFeature> = (1..=20).map(|d| feature(d, "P1")).collect();
        let features = matrix_of(rows);
        let flags: Vec<bool> = (0..20).map(|i| i == 3).collect();
        let iso = output(&flags);

        let comparator = Comparator::new().with_sample_rows(5);
        let first = comparator.compare(&features, &iso, None);
        let second = comparator.compare(&features, &iso, None);

        assert_eq!(first.sample.len(), 5);
        let first_keys: Vec<ProviderDay> = first.sample.iter().map(|s| s.key()).collect();
        let second_keys: Vec<ProviderDay> = second.sample.iter().map(|s| s.key()).collect();
        assert_eq!(first_keys, second_keys);

        // Small table: the sample is the whole table
        let full = Comparator::new().compare(&features, &iso, None);
        assert_eq!(full.sample.len(), 20);
    }

    #[test]
    fn test_category_priority() {
        let mut row = join_labels(&matrix_of(vec![feature(1, "P1")]), &output(&[true]), None)
            .pop()
            .unwrap();

        row.anomaly_lof = true;
        assert_eq!(FlagCategory::of(&row), FlagCategory::Both);
        row.anomaly_lof = false;
        assert_eq!(FlagCategory::of(&row), FlagCategory::IsoOnly);
        row.anomaly_iso = false;
        row.anomaly_lof = true;
        assert_eq!(FlagCategory::of(&row), FlagCategory::LofOnly);
        row.anomaly_lof = false;
        assert_eq!(FlagCategory::of(&row), FlagCategory::None);
        assert_eq!(FlagCategory::LofOnly.to_string(), "LOF only");
    }

    #[test]
    fn test_overlap_records() {
        let counts = OverlapCounts {
            both: 3,
            iso_only: 2,
            lof_only: 1,
            either: 6,
            jaccard: 0.5,
        };
        let records = counts.as_records();
        assert_eq!(records.len(), 5);
        assert_eq!(records[2].metric, "Both");
        assert_eq!(records[2].value, 3.0);
        assert_eq!(records[4].metric, "Jaccard overlap");
    }
}
