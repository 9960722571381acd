//! Position samples and their log line format
//!
//! One line per sample, semicolon separated:
//!
//! ```text
//! timestamp;day;hour;minute;second;x;y
//! ```

use serde::{Deserialize, Serialize};

use crate::tracking::Position;
use crate::vision::DecodedDate;

/// An accepted (timestamp, date, position) observation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionSample {
    /// Real-world seconds: epoch base plus the in-game elapsed time
    pub timestamp: i64,
    pub date: DecodedDate,
    pub position: Position,
}

impl PositionSample {
    /// Build a sample, deriving the timestamp from the date
    pub fn from_date(epoch_base: i64, date: DecodedDate, position: Position) -> Self {
        Self {
            timestamp: date.timestamp(epoch_base),
            date,
            position,
        }
    }

    /// Newline-terminated log line
    pub fn to_log_line(&self) -> String {
        format!(
            "{};{};{};{};{};{};{}\n",
            self.timestamp,
            self.date.day,
            self.date.hour,
            self.date.minute,
            self.date.second,
            self.position.x,
            self.position.y
        )
    }
}

impl std::str::FromStr for PositionSample {
    type Err = String;

    /// Parse one log line, with or without its trailing newline
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(';').collect();
        let [timestamp, day, hour, minute, second, x, y] = fields[..] else {
            return Err(format!("expected 7 fields, got {}", fields.len()));
        };

        let number = |name: &str, value: &str| -> Result<i64, String> {
            value
                .parse::<i64>()
                .map_err(|e| format!("invalid {} '{}': {}", name, value, e))
        };
        let coordinate = |name: &str, value: &str| -> Result<i32, String> {
            value
                .parse::<i32>()
                .map_err(|e| format!("invalid {} '{}': {}", name, value, e))
        };
        number("day", day)?;
        number("hour", hour)?;
        number("minute", minute)?;
        number("second", second)?;

        Ok(Self {
            timestamp: number("timestamp", timestamp)?,
            date: DecodedDate {
                day: day.to_string(),
                hour: hour.to_string(),
                minute: minute.to_string(),
                second: second.to_string(),
            },
            position: Position::new(coordinate("x", x)?, coordinate("y", y)?),
        })
    }
}
