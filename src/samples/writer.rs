//! Position log writer
//!
//! Appends accepted samples to the durable log and overwrites the two
//! latest-value files polled by the web front end. Each log line goes out in
//! a single write so a concurrent reader never sees half a line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::recency::RecencyBuffer;
use super::sample::PositionSample;
use crate::config::{LogConfig, PathsConfig};
use crate::tracking::Position;
use crate::vision::DecodedDate;
use crate::Result;

/// What happened to a recorded sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Appended to the log and published
    Appended(PositionSample),
    /// Already logged recently
    Duplicate,
    /// Position unknown, nothing written
    UnknownPosition,
}

/// Writes samples to the log and the latest-value files
pub struct LogWriter {
    epoch_base: i64,
    log_path: PathBuf,
    position_path: PathBuf,
    time_path: PathBuf,
    recency: RecencyBuffer,
}

impl LogWriter {
    /// Create the writer, making sure the output directories exist
    pub fn open(paths: &PathsConfig, config: &LogConfig) -> Result<Self> {
        for path in [&paths.position_log, &paths.current_position, &paths.current_time] {
            ensure_parent(path)?;
        }

        Ok(Self {
            epoch_base: config.epoch_base,
            log_path: paths.position_log.clone(),
            position_path: paths.current_position.clone(),
            time_path: paths.current_time.clone(),
            recency: RecencyBuffer::new(config.recency_capacity, config.recency_policy),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Record a position observed at the given in-game date
    pub fn record(&mut self, date: &DecodedDate, position: Position) -> Result<RecordOutcome> {
        if !position.is_known() {
            log::debug!("Position unknown at {}, sample discarded", date);
            return Ok(RecordOutcome::UnknownPosition);
        }

        let sample = PositionSample::from_date(self.epoch_base, date.clone(), position);
        if self.recency.contains(&sample) {
            log::debug!("Duplicate sample {} at {} skipped", sample.timestamp, position);
            return Ok(RecordOutcome::Duplicate);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(sample.to_log_line().as_bytes())?;

        fs::write(&self.position_path, format!("{} {}", position.x, position.y))?;
        fs::write(
            &self.time_path,
            format!("{} {} {} {}", date.day, date.hour, date.minute, date.second),
        )?;

        log::info!("{}\t{},{}", sample.timestamp, position.x, position.y);
        self.recency.insert(sample.clone());
        Ok(RecordOutcome::Appended(sample))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
