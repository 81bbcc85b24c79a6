//! Session-scoped pitch history.
//!
//! Each estimator owns one tracker, so independent detection streams never
//! share history. Call [`PitchTracker::reset`] (through the estimator's
//! `reset_tracking`) when a recording session starts or stops.

use std::collections::VecDeque;

/// History length used by the Basic tier.
pub const BASIC_HISTORY: usize = 5;

/// History length used by the Pro tier.
pub const PRO_HISTORY: usize = 10;

/// Bounded ring buffer of accepted frequencies plus the reference frequency
/// used to judge the next frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchTracker {
    history: VecDeque<f32>,
    capacity: usize,
    previous: Option<f32>,
}

impl PitchTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            previous: None,
        }
    }

    /// Records an accepted frequency, evicting the oldest one when full.
    ///
    /// The reference frequency becomes the raw value; callers that smooth
    /// with the median override it through [`PitchTracker::set_previous`].
    pub fn push(&mut self, frequency: f32) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(frequency);
        self.previous = Some(frequency);
    }

    pub fn set_previous(&mut self, frequency: f32) {
        self.previous = Some(frequency);
    }

    /// Last accepted (or smoothed) frequency.
    pub fn previous(&self) -> Option<f32> {
        self.previous
    }

    /// Accepted frequencies, oldest first.
    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Median of the history (mean of the middle pair for even lengths).
    pub fn median(&self) -> Option<f32> {
        if self.history.is_empty() {
            return None;
        }
        let mut sorted: Vec<f32> = self.history.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    /// Forgets all history.
    pub fn reset(&mut self) {
        self.history.clear();
        self.previous = None;
    }
}
