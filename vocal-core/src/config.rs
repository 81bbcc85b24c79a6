//! Detector configuration.
//!
//! The two tiers share one parameter set but differ in their defaults: the Pro
//! tier casts a wider candidate net (YIN threshold 0.35) and relies on its
//! scorer, so it accepts a lower final confidence (0.6) than Basic (0.25 / 0.7).

use serde::{Deserialize, Serialize};

use crate::error::{PitchError, PitchResult};
use crate::fft::DEFAULT_FFT_SIZE;

/// Tunable parameters for one estimator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Frames with an RMS below this are treated as silence
    pub rms_threshold: f32,
    /// CMND value a dip must fall below to become a candidate
    pub yin_threshold: f32,
    /// Lowest detectable frequency in Hz (sets the longest period searched)
    pub min_frequency: f32,
    /// Highest detectable frequency in Hz (sets the shortest period searched)
    pub max_frequency: f32,
    /// Minimum `1 - d'` of the winning candidate
    pub confidence_gate: f32,
    /// FFT size for spectral scoring (Pro tier only)
    pub fft_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::basic()
    }
}

impl DetectorConfig {
    /// Defaults for the single-hypothesis tier.
    pub fn basic() -> Self {
        Self {
            rms_threshold: 0.001,
            yin_threshold: 0.25,
            min_frequency: 65.0,
            max_frequency: 2100.0,
            confidence_gate: 0.7,
            fft_size: DEFAULT_FFT_SIZE,
        }
    }

    /// Defaults for the multi-hypothesis tier.
    pub fn pro() -> Self {
        Self {
            yin_threshold: 0.35,
            confidence_gate: 0.6,
            ..Self::basic()
        }
    }

    /// Checks that every parameter is usable.
    pub fn validate(&self) -> PitchResult<()> {
        let (min, max) = (self.min_frequency, self.max_frequency);
        if !(min.is_finite() && max.is_finite()) || min <= 0.0 || max <= min {
            return Err(PitchError::InvalidFrequencyRange { min, max });
        }
        if !(self.rms_threshold >= 0.0 && self.rms_threshold.is_finite()) {
            return Err(PitchError::InvalidConfig(format!(
                "rms_threshold must be a non-negative number, got {}",
                self.rms_threshold
            )));
        }
        if !(self.yin_threshold > 0.0 && self.yin_threshold <= 1.0) {
            return Err(PitchError::InvalidConfig(format!(
                "yin_threshold must be in (0, 1], got {}",
                self.yin_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_gate) {
            return Err(PitchError::InvalidConfig(format!(
                "confidence_gate must be in [0, 1], got {}",
                self.confidence_gate
            )));
        }
        if self.fft_size < 64 {
            return Err(PitchError::InvalidConfig(format!(
                "fft_size must be at least 64, got {}",
                self.fft_size
            )));
        }
        Ok(())
    }

    /// Shortest and longest lag searched at a sample rate.
    ///
    /// # Returns
    /// * `(min_period, max_period)` - `floor(sr / max_frequency)` (at least 1)
    ///   and `floor(sr / min_frequency)`
    pub fn period_range(&self, sample_rate: u32) -> PitchResult<(usize, usize)> {
        if sample_rate == 0 {
            return Err(PitchError::InvalidSampleRate(sample_rate));
        }
        let sr = sample_rate as f32;
        let min_period = ((sr / self.max_frequency) as usize).max(1);
        let max_period = (sr / self.min_frequency) as usize;
        // Need room for one local minimum with two neighbours
        if max_period < min_period + 2 {
            return Err(PitchError::InvalidFrequencyRange {
                min: self.min_frequency,
                max: self.max_frequency,
            });
        }
        Ok((min_period, max_period))
    }

    /// Frame length needed at a sample rate: the lag span plus an equally long
    /// integration window.
    pub fn required_frame_len(&self, sample_rate: u32) -> PitchResult<usize> {
        let (_, max_period) = self.period_range(sample_rate)?;
        Ok(2 * max_period)
    }
}
