//! Durable position log
//!
//! - `LogWriter` - appends accepted samples and publishes the latest values
//! - `RecencyBuffer` - suppresses samples logged moments ago
//! - `LogSnapshot` - tolerant full read for the export worker

mod reader;
mod recency;
mod sample;
mod writer;

pub use reader::LogSnapshot;
pub use recency::{RecencyBuffer, RecencyPolicy};
pub use sample::PositionSample;
pub use writer::{LogWriter, RecordOutcome};
