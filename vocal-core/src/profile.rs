//! Singer voice-range profile.
//!
//! Profiles are learned and persisted by the caller; the estimators only read
//! them. A profile built from fewer than [`MIN_PROFILE_SAMPLES`] observations
//! is treated as untrained.

use serde::{Deserialize, Serialize};

/// Observations required before a profile influences scoring.
pub const MIN_PROFILE_SAMPLES: u32 = 50;

/// Running estimate of a singer's range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Lowest comfortably sung frequency in Hz
    pub min_f0: f32,
    /// Highest comfortably sung frequency in Hz
    pub max_f0: f32,
    /// Centre of the comfortable range in Hz
    pub comfortable_f0: f32,
    /// Number of pitch observations behind the estimate
    pub sample_count: u32,
}

impl VoiceProfile {
    pub fn new(min_f0: f32, max_f0: f32, comfortable_f0: f32, sample_count: u32) -> Self {
        Self {
            min_f0,
            max_f0,
            comfortable_f0,
            sample_count,
        }
    }

    /// True once enough observations back the range.
    pub fn is_trained(&self) -> bool {
        self.sample_count >= MIN_PROFILE_SAMPLES
    }

    pub fn contains(&self, frequency: f32) -> bool {
        (self.min_f0..=self.max_f0).contains(&frequency)
    }
}
