//! Provider-Day Anomaly Detection for Healthcare Claims
//!
//! This library flags anomalous provider-day behavior in a stream of
//! healthcare claim events. It builds rolling statistical features per
//! provider and calendar day, scores them with two independent
//! unsupervised detectors, and quantifies how much the detectors agree.
//!
//! # Modules
//!
//! - `data`: claim event types and file adapters
//! - `features`: provider-day feature construction and the zero-fill stage
//! - `anomaly`: isolation forest and local outlier factor detectors
//! - `compare`: label-set agreement analysis
//! - `pipeline`: end-to-end orchestration
//! - `config`: explicit pipeline configuration
//!
//! # Example
//!
//! ```no_run
//! use claims_anomaly::config::PipelineConfig;
//! use claims_anomaly::data::EventLoader;
//! use claims_anomaly::pipeline::{run_pipeline, PipelineOutcome};
//!
//! let events = EventLoader::load_csv("claims_events.csv").unwrap();
//! let config = PipelineConfig::default().with_window_days(7);
//!
//! match run_pipeline(&events, &config) {
//!     PipelineOutcome::Completed(report) => {
//!         println!("jaccard = {}", report.summary.overlap.jaccard);
//!     }
//!     PipelineOutcome::InsufficientData { rows, min_rows } => {
//!         println!("only {rows} rows, need {min_rows}");
//!     }
//! }
//! ```

pub mod anomaly;
pub mod compare;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod pipeline;

pub use anomaly::*;
pub use compare::*;
pub use config::PipelineConfig;
pub use data::*;
pub use error::*;
pub use features::*;
pub use pipeline::*;
