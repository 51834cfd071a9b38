use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;
use tracing::info;

use crate::api::PoolMeasure;

/// One CSV row of measurement history.
#[derive(Serialize)]
struct HistoryRow<'a> {
    flipr_id: &'a str,
    timestamp: String,
    #[serde(rename = "chlorine_mV")]
    chlorine: f64,
    ph: f64,
    #[serde(rename = "temperature_C")]
    temperature: f64,
    #[serde(rename = "red_ox_mV")]
    red_ox: f64,
}

/// Appends every polled measure of one device to a timestamped CSV file.
pub struct HistoryRecorder {
    flipr_id: String,
    writer: Writer<File>,
    path: PathBuf,
}

impl HistoryRecorder {
    pub fn create(dir: &Path, flipr_id: &str) -> csv::Result<Self> {
        fs::create_dir_all(dir)?;

        let file_name = chrono::Local::now()
            .format(&format!("flipr_{flipr_id}_%Y-%m-%d_%H-%M-%S.csv"))
            .to_string();
        let path = dir.join(file_name);
        let file = File::create(&path)?;

        info!("Recording measurement history for {} to {}", flipr_id, path.display());
        Ok(HistoryRecorder {
            flipr_id: flipr_id.to_string(),
            writer: Writer::from_writer(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows are flushed as they arrive; a poll every hour is not worth
    /// buffering.
    pub fn record(&mut self, measure: &PoolMeasure) -> csv::Result<()> {
        self.writer.serialize(HistoryRow {
            flipr_id: &self.flipr_id,
            timestamp: measure.date_time.to_rfc3339(),
            chlorine: measure.chlorine,
            ph: measure.ph,
            temperature: measure.temperature,
            red_ox: measure.red_ox,
        })?;
        self.writer.flush()?;
        Ok(())
    }
}
