//! # YIN Period Search
//!
//! Shared machinery for both estimators: the noise gate, the difference
//! function, the cumulative mean normalized difference (CMND), local-minimum
//! candidate search and parabolic refinement. The estimators differ only in
//! how they pick among the candidates returned here.

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::error::{PitchError, PitchResult};

/// A period hypothesis: one local minimum of the CMND below the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Lag in samples
    pub period: usize,
    /// `sample_rate / period` in Hz
    pub frequency: f32,
    /// CMND value at the lag; lower means stronger periodicity
    pub difference: f32,
}

impl Candidate {
    /// YIN confidence, `1 - d'`, clamped to [0, 1].
    pub fn confidence(&self) -> f32 {
        (1.0 - self.difference).clamp(0.0, 1.0)
    }
}

/// Root mean square of a frame (0 for an empty frame).
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Validates a frame against a configuration.
///
/// # Returns
/// * `Ok((min_period, max_period))` - Lag bounds for the search
/// * `Err(PitchError)` - Zero sample rate, frame shorter than `2 * max_period`,
///   or non-finite samples
pub fn validate_frame(
    samples: &[f32],
    sample_rate: u32,
    config: &DetectorConfig,
) -> PitchResult<(usize, usize)> {
    let (min_period, max_period) = config.period_range(sample_rate)?;
    let required = 2 * max_period;
    if samples.len() < required {
        return Err(PitchError::InputTooShort {
            len: samples.len(),
            required,
        });
    }
    if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
        return Err(PitchError::InvalidInput(format!(
            "non-finite sample at index {i}"
        )));
    }
    Ok((min_period, max_period))
}

/// Reusable difference / CMND buffers.
#[derive(Debug, Clone, Default)]
pub struct YinBuffer {
    difference: Vec<f32>,
    cmnd: Vec<f32>,
}

impl YinBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the difference function and CMND for lags `0..max_period`.
    ///
    /// The caller must have validated `signal.len() >= 2 * max_period`.
    pub fn compute(&mut self, signal: &[f32], max_period: usize) {
        self.difference.clear();
        self.difference.resize(max_period, 0.0);
        self.cmnd.clear();
        self.cmnd.resize(max_period, 1.0);

        // --- Difference function: squared differences over a max_period window ---
        let window = &signal[..max_period];
        for tau in 1..max_period {
            let shifted = &signal[tau..tau + max_period];
            self.difference[tau] = window
                .iter()
                .zip(shifted)
                .map(|(a, b)| {
                    let delta = a - b;
                    delta * delta
                })
                .sum();
        }

        // --- Cumulative mean normalized difference ---
        let mut running_sum = 0.0;
        for tau in 1..max_period {
            running_sum += self.difference[tau];
            self.cmnd[tau] = if running_sum > 0.0 {
                self.difference[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }
    }

    pub fn cmnd(&self) -> &[f32] {
        &self.cmnd
    }

    /// Collects every local minimum of the CMND below `threshold`.
    ///
    /// Lags are searched from `min_period` up to the last lag that still has
    /// a right-hand neighbour. Candidates come back in ascending lag order.
    pub fn candidates(&self, min_period: usize, threshold: f32, sample_rate: u32) -> Vec<Candidate> {
        let d = &self.cmnd;
        if d.len() < 3 {
            return Vec::new();
        }
        let first = min_period.max(1);
        let last = d.len() - 2;

        (first..=last)
            .filter(|&tau| d[tau] < threshold && d[tau] < d[tau - 1] && d[tau] < d[tau + 1])
            .map(|tau| Candidate {
                period: tau,
                frequency: sample_rate as f32 / tau as f32,
                difference: d[tau],
            })
            .collect()
    }

    /// Parabolic interpolation around a lag for sub-sample accuracy.
    pub fn refine(&self, tau: usize) -> f32 {
        if tau == 0 || tau + 1 >= self.cmnd.len() {
            return tau as f32;
        }
        let y1 = self.cmnd[tau - 1];
        let y2 = self.cmnd[tau];
        let y3 = self.cmnd[tau + 1];

        let denominator = y1 - 2.0 * y2 + y3;
        if denominator.abs() < f32::EPSILON {
            return tau as f32;
        }
        let shift = (y1 - y3) / (2.0 * denominator);
        if shift.is_finite() && shift.abs() < 1.0 {
            tau as f32 + shift
        } else {
            tau as f32
        }
    }
}
