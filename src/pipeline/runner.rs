//! Tracking worker
//!
//! Reads frames one at a time and feeds them to the analyzer on a dedicated
//! thread. The worker runs until the stream ends; there is no stop request.

use image::RgbImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::analyzer::{FrameAnalyzer, FrameStats};
use super::source::{FrameSource, StreamResolver};
use crate::config::SourceConfig;
use crate::{Result, TrackerError};

/// State of the tracking worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    /// Not started, or the stream has ended
    Stopped,
    /// Waiting for the stream to resolve
    WaitingForSource,
    /// Reading and analysing frames
    Running,
    /// Gave up on the stream
    Error(String),
}

/// Handle to the tracking thread
pub struct TrackingWorker {
    state: Arc<Mutex<WorkerState>>,
    worker: Option<JoinHandle<FrameStats>>,
}

impl TrackingWorker {
    /// Spawn the worker. It owns the analyzer, and with it all tracker state,
    /// for the rest of its life.
    pub fn start(
        analyzer: FrameAnalyzer,
        resolver: Box<dyn StreamResolver>,
        source: &SourceConfig,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(WorkerState::WaitingForSource));
        let thread_state = state.clone();
        let source = source.clone();

        let handle = thread::Builder::new()
            .name("overworld-tracker".to_string())
            .spawn(move || run_tracking_loop(thread_state, analyzer, resolver, source))?;

        log::info!("Tracking worker started");
        Ok(Self {
            state,
            worker: Some(handle),
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state.lock().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the stream to end and return the final frame counts
    pub fn join(mut self) -> Result<FrameStats> {
        let Some(handle) = self.worker.take() else {
            return Ok(FrameStats::default());
        };
        handle
            .join()
            .map_err(|_| TrackerError::Worker("tracking thread panicked".to_string()))
    }
}

/// Resolve the stream, retrying a limited number of times
fn open_source(resolver: &mut dyn StreamResolver, config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let attempts = config.resolve_attempts.max(1);
    let mut attempt = 1;
    loop {
        match resolver.resolve() {
            Ok(source) => return Ok(source),
            Err(e) if attempt < attempts => {
                log::warn!(
                    "Stream {} not available ({}), attempt {}/{}",
                    resolver.current_url(),
                    e,
                    attempt,
                    attempts
                );
                thread::sleep(Duration::from_secs(config.resolve_interval_secs));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Re-resolve once and read once more
fn retry_read(resolver: &mut dyn StreamResolver) -> Result<(Box<dyn FrameSource>, RgbImage)> {
    let mut source = resolver.resolve()?;
    let frame = source.read_frame()?;
    Ok((source, frame))
}

fn run_tracking_loop(
    state: Arc<Mutex<WorkerState>>,
    mut analyzer: FrameAnalyzer,
    mut resolver: Box<dyn StreamResolver>,
    config: SourceConfig,
) -> FrameStats {
    let mut source = match open_source(resolver.as_mut(), &config) {
        Ok(source) => source,
        Err(e) => {
            log::error!("Could not open stream {}: {}", resolver.current_url(), e);
            *state.lock() = WorkerState::Error(e.to_string());
            return analyzer.stats();
        }
    };

    *state.lock() = WorkerState::Running;
    log::info!("Reading frames from {}", resolver.current_url());

    let mut last_log = Instant::now();
    loop {
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Frame read failed ({}), re-resolving {}", e, resolver.current_url());
                match retry_read(resolver.as_mut()) {
                    Ok((fresh, frame)) => {
                        source = fresh;
                        frame
                    }
                    Err(e) => {
                        log::info!("Stream ended: {}", e);
                        break;
                    }
                }
            }
        };

        match analyzer.analyze(&frame) {
            Ok(outcome) => log::trace!("{:?}", outcome),
            Err(e) => log::error!("Frame dropped: {}", e),
        }

        if last_log.elapsed() >= Duration::from_secs(5) {
            let stats = analyzer.stats();
            log::info!(
                "Tracking: {} frames read, {} samples logged, {} not localised",
                stats.frames,
                stats.logged,
                stats.not_localized
            );
            last_log = Instant::now();
        }
    }

    *state.lock() = WorkerState::Stopped;
    analyzer.stats()
}
