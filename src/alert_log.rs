//! Durable record of every alert dispatch attempt.
//!
//! Records accumulate in memory and are appended to a CSV file on flush
//! (shutdown, or on demand after a dispatch). The header is written only
//! when the file is first created.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One dispatch attempt, successful or not. Never mutated after creation.
///
/// The response fields hold the remote payload (or error text) as plain
/// strings so the record stays flat for CSV serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub vehicle_id: String,
    pub location_label: String,
    pub reason: String,
    pub duration_secs: u64,
    pub activation_response: Option<String>,
    pub deactivation_response: Option<String>,
    pub success: bool,
}

/// In-memory append log with a flushed watermark.
#[derive(Default)]
pub struct AlertLog {
    records: Vec<AlertRecord>,
    flushed: usize,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: AlertRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[AlertRecord] {
        &self.records
    }

    /// Appends all not-yet-flushed records to the CSV file at `path`,
    /// creating it (with headers) if needed.
    pub fn flush(&mut self, path: &str) -> Result<()> {
        if self.flushed == self.records.len() {
            return Ok(());
        }

        let file_exists = Path::new(path).exists();
        debug!(
            path,
            pending = self.records.len() - self.flushed,
            "Flushing alert log"
        );

        let file = OpenOptions::new().append(true).create(true).open(path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(!file_exists) // IMPORTANT when appending
            .from_writer(file);

        for record in &self.records[self.flushed..] {
            writer.serialize(record)?;
        }
        writer.flush()?;
        self.flushed = self.records.len();

        Ok(())
    }
}
