//! Frame pipeline
//!
//! - `source` - stream resolution and frame reading
//! - `analyzer` - everything that happens to a single frame
//! - `runner` - the tracking worker that drives the analyzer
//! - `export` - the map export worker

mod analyzer;
mod export;
mod runner;
mod source;

pub use analyzer::{FrameAnalyzer, FrameOutcome, FrameStats};
pub use export::{ExportReport, ExportWorker, MapExporter};
pub use runner::{TrackingWorker, WorkerState};
pub use source::{FrameDirectoryResolver, FrameSource, StreamResolver};
