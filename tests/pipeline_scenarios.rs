//! End-to-end pipeline scenarios

use chrono::{NaiveDate, TimeZone, Utc};

use claims_anomaly::config::PipelineConfig;
use claims_anomaly::data::{ClaimEvent, ProviderDay};
use claims_anomaly::pipeline::{run_pipeline, PipelineOutcome, PipelineReport};

fn claim(year: i32, month: u32, day: u32, hour: u32, provider: &str, amount: f64) -> ClaimEvent {
    ClaimEvent::new(
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap(),
        provider,
        amount,
    )
}

/// 3 providers x 10 days of stable activity, with one extreme
/// allowed-amount spike for provider P2 on day 5.
fn spiked_events() -> Vec<ClaimEvent> {
    let providers = ["P1", "P2", "P3"];
    let mut events = Vec::new();

    for (p, provider) in providers.iter().enumerate() {
        for day in 1..=10u32 {
            for c in 0..4u32 {
                let spike = *provider == "P2" && day == 5;
                let amount = if spike {
                    50_000.0 + c as f64
                } else {
                    95.0 + ((p as u32 * 13 + day * 7 + c * 3) % 11) as f64
                };
                events.push(claim(2024, 3, day, 8 + c, provider, amount));
            }
        }
    }

    events
}

fn completed(events: &[ClaimEvent], config: &PipelineConfig) -> Box<PipelineReport> {
    match run_pipeline(events, config) {
        PipelineOutcome::Completed(report) => report,
        PipelineOutcome::InsufficientData { rows, min_rows } => {
            panic!("expected a completed run, got {rows} rows with min {min_rows}")
        }
    }
}

#[test]
fn spike_is_the_only_isolation_flag() {
    let events = spiked_events();
    let config = PipelineConfig::default().with_min_rows(1);
    let report = completed(&events, &config);

    assert_eq!(report.features.n_rows(), 30);

    // ceil(30 * 0.02) = 1 flag, and it must be the spiked provider-day
    let spike_key = ProviderDay::new(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), "P2");
    let flagged = report.iso.flagged_keys(&report.features);
    assert_eq!(flagged, vec![spike_key]);

    // Day 5 is the only day with a nonzero isolation-forest rate
    for rate in &report.summary.daily_rates {
        if rate.day == NaiveDate::from_ymd_opt(2024, 3, 5).unwrap() {
            assert!((rate.iso_pct - 100.0 / 3.0).abs() < 1e-9);
        } else {
            assert_eq!(rate.iso_pct, 0.0);
        }
    }

    // The spiked provider leads the ranking
    assert_eq!(report.summary.top_providers[0].provider_id, "P2");
    assert_eq!(report.summary.top_providers[0].iso_count, 1);
}

#[test]
fn overlap_identities_hold() {
    let events = spiked_events();
    let config = PipelineConfig::default().with_min_rows(1);
    let report = completed(&events, &config);

    let overlap = &report.summary.overlap;
    assert_eq!(
        overlap.both + overlap.iso_only + overlap.lof_only,
        overlap.either
    );
    assert!(overlap.either <= report.features.n_rows());
    assert!((0.0..=1.0).contains(&overlap.jaccard));
}

#[test]
fn rerun_reproduces_the_same_labels() {
    let events = spiked_events();
    let config = PipelineConfig::default().with_min_rows(1);

    let first = completed(&events, &config);
    let second = completed(&events, &config);

    assert_eq!(first.iso.is_anomaly, second.iso.is_anomaly);
    assert_eq!(first.iso.scores, second.iso.scores);
    assert_eq!(first.summary.overlap.jaccard, second.summary.overlap.jaccard);
}

#[test]
fn too_few_rows_terminates_cleanly() {
    // 1999 single-claim provider-days against the default 2000 minimum
    let events: Vec<ClaimEvent> = (0..1999)
        .map(|i| {
            let day = 1 + (i % 28) as u32;
            claim(2024, 4, day, 12, &format!("PRV{i:04}"), 100.0)
        })
        .collect();

    match run_pipeline(&events, &PipelineConfig::default()) {
        PipelineOutcome::InsufficientData { rows, min_rows } => {
            assert_eq!(rows, 1999);
            assert_eq!(min_rows, 2000);
        }
        PipelineOutcome::Completed(_) => panic!("1999 rows must not be scored"),
    }
}

#[test]
fn infeasible_neighborhood_degrades_to_single_detector() {
    // 10 provider-days but the default k=20 neighborhood cannot be built
    let events: Vec<ClaimEvent> = (1..=10)
        .map(|day| claim(2024, 5, day, 9, "P1", 100.0 + day as f64))
        .collect();
    let config = PipelineConfig::default().with_min_rows(1);
    let report = completed(&events, &config);

    assert!(report.lof.is_err());
    assert!(!report.lof_available());

    // Isolation forest still produced labels
    assert_eq!(report.iso.is_anomaly.len(), 10);

    // Every LOF-side field reports zero or empty instead of crashing
    let summary = &report.summary;
    assert_eq!(summary.overlap.both, 0);
    assert_eq!(summary.overlap.lof_only, 0);
    assert!(summary.daily_rates.iter().all(|r| r.lof_pct == 0.0));
    assert!(summary.top_providers.iter().all(|p| p.lof_count == 0));
    assert!(report.lof_flagged().is_empty());
    assert!(report.joined.iter().all(|r| r.lof_score == 0.0));
}

#[test]
fn both_detectors_agree_on_an_extreme_spike() {
    let events = spiked_events();
    let config = PipelineConfig::default().with_min_rows(1);
    let report = completed(&events, &config);

    // 30 rows clear the k=20 neighborhood requirement
    let lof = report.lof.as_ref().expect("lof should run on 30 rows");
    let spike_key = ProviderDay::new(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), "P2");
    assert_eq!(lof.flagged_keys(&report.features), vec![spike_key]);

    // Full agreement on a single flag each
    assert_eq!(report.summary.overlap.both, 1);
    assert_eq!(report.summary.overlap.either, 1);
    assert_eq!(report.summary.overlap.jaccard, 1.0);
}
