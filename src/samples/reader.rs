//! Snapshot reading of the position log
//!
//! The log may be appended to while it is being read. Only newline-terminated
//! lines count; a trailing partial line is left for the next snapshot.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::sample::PositionSample;
use crate::Result;

/// All complete samples in the log at the time it was read
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    samples: Vec<PositionSample>,
}

impl LogSnapshot {
    /// Read the whole log. A missing log is an empty snapshot.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = match fs::read_to_string(path.as_ref()) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::parse(&content))
    }

    /// Parse log content, ignoring an unterminated last line and malformed lines
    pub fn parse(content: &str) -> Self {
        let complete = match content.rfind('\n') {
            Some(end) => &content[..=end],
            None => "",
        };

        let samples = complete
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match line.parse::<PositionSample>() {
                Ok(sample) => Some(sample),
                Err(e) => {
                    log::warn!("Skipping malformed log line '{}': {}", line, e);
                    None
                }
            })
            .collect();

        Self { samples }
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    /// Most recent sample
    pub fn last(&self) -> Option<&PositionSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
