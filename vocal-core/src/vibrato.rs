//! Vibrato measurement over a short history of accepted pitch samples.

use serde::{Deserialize, Serialize};

use crate::PitchSample;

/// Default analysis window in seconds.
pub const DEFAULT_VIBRATO_WINDOW: f64 = 0.5;

/// Samples required in the whole history.
const MIN_TOTAL_SAMPLES: usize = 10;
/// Samples required inside the analysis window.
const MIN_WINDOW_SAMPLES: usize = 5;

/// Periodic pitch modulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vibrato {
    /// Modulation rate in Hz
    pub rate_hz: f32,
    /// Peak-to-peak excursion relative to the mean, in cents
    pub extent_cents: f32,
}

/// Estimates vibrato from the samples of the last `window_seconds`.
///
/// `samples` must be in timestamp order; the window ends at the newest one.
/// Rate is half the number of mean crossings per second of window, extent is
/// `(max - min) / mean * 1200`.
///
/// Returns `None` with fewer than 10 samples overall or fewer than 5 inside
/// the window.
pub fn estimate_vibrato(samples: &[PitchSample], window_seconds: f64) -> Option<Vibrato> {
    if samples.len() < MIN_TOTAL_SAMPLES || window_seconds <= 0.0 {
        return None;
    }
    let newest = samples.last()?.timestamp;
    let windowed: Vec<f64> = samples
        .iter()
        .filter(|s| newest - s.timestamp <= window_seconds)
        .map(|s| s.frequency as f64)
        .collect();
    if windowed.len() < MIN_WINDOW_SAMPLES {
        return None;
    }

    let mean = windowed.iter().sum::<f64>() / windowed.len() as f64;
    if mean <= 0.0 {
        return None;
    }

    let crossings = windowed
        .windows(2)
        .filter(|pair| (pair[0] >= mean) != (pair[1] >= mean))
        .count();

    let (min, max) = windowed
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| {
            (lo.min(f), hi.max(f))
        });

    Some(Vibrato {
        rate_hz: (crossings as f64 / 2.0 / window_seconds) as f32,
        extent_cents: ((max - min) / mean * 1200.0) as f32,
    })
}
