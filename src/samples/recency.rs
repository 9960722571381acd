//! Duplicate suppression for recently logged samples

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::sample::PositionSample;

/// How the recency buffer makes room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyPolicy {
    /// Clear everything once the buffer grows past capacity. A sample seen
    /// just before the reset can be logged again right after it.
    #[default]
    #[serde(alias = "reset")]
    ResetOnOverflow,
    /// Drop the oldest entry once the buffer grows past capacity
    EvictOldest,
}

/// Bounded memory of recently logged samples
#[derive(Debug, Clone)]
pub struct RecencyBuffer {
    capacity: usize,
    policy: RecencyPolicy,
    entries: VecDeque<PositionSample>,
}

impl RecencyBuffer {
    pub fn new(capacity: usize, policy: RecencyPolicy) -> Self {
        Self {
            capacity,
            policy,
            entries: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn contains(&self, sample: &PositionSample) -> bool {
        self.entries.contains(sample)
    }

    /// Remember a sample, then apply the overflow policy
    pub fn insert(&mut self, sample: PositionSample) {
        self.entries.push_back(sample);
        if self.entries.len() > self.capacity {
            match self.policy {
                RecencyPolicy::ResetOnOverflow => {
                    log::debug!("Recency buffer past {} entries, clearing", self.capacity);
                    self.entries.clear();
                }
                RecencyPolicy::EvictOldest => {
                    self.entries.pop_front();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
