//! Loading and saving claim events
//!
//! CSV and JSON adapters for the pipeline boundary. The algorithmic core
//! only ever sees in-memory `ClaimEvent` slices; these helpers exist for
//! the CLI and for tests.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{Reader, Writer};
use serde::Serialize;

use super::claims::ClaimEvent;

/// Loader for claim event files
pub struct EventLoader;

impl EventLoader {
    /// Load claim events from a CSV file with an `event_ts,provider_id,allowed_amt` header.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ClaimEvent>> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open file: {:?}", path.as_ref()))?;

        let mut reader = Reader::from_reader(file);
        let mut events = Vec::new();

        for result in reader.deserialize() {
            let event: ClaimEvent = result.context("Failed to parse claim event")?;
            events.push(event);
        }

        Ok(events)
    }

    /// Load claim events from a JSON array file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Vec<ClaimEvent>> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open file: {:?}", path.as_ref()))?;

        let events: Vec<ClaimEvent> = serde_json::from_reader(file)?;
        Ok(events)
    }

    /// Save claim events to a CSV file.
    pub fn save_csv<P: AsRef<Path>>(events: &[ClaimEvent], path: P) -> Result<()> {
        write_csv(events, path)
    }
}

/// Serialize any row collection to a CSV file.
///
/// Used by the CLI to emit the feature table, flagged subsets, and the
/// comparison summary records as flat artifacts.
pub fn write_csv<T: Serialize, P: AsRef<Path>>(rows: &[T], path: P) -> Result<()> {
    let file = File::create(&path)
        .with_context(|| format!("Failed to create file: {:?}", path.as_ref()))?;

    let mut writer = Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
