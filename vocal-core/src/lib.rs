// vocal-core/src/lib.rs

//! The core logic for real-time singing-voice pitch feedback.
//! This crate is responsible for fundamental-frequency estimation, octave
//! disambiguation, note/cents conversion and vibrato measurement. It is
//! completely headless and contains no capture or GUI code.
//!
//! Two estimators are provided:
//! - [`BasicEstimator`]: single-hypothesis YIN with octave-jump guards
//! - [`ProEstimator`]: multi-hypothesis YIN scored against the spectrum,
//!   recent history and the singer's [`VoiceProfile`]
//!
//! Each estimator owns its own [`PitchTracker`], so two streams never share
//! history. Call `reset_tracking()` when a recording session starts.

pub mod config;
pub mod fft;
pub mod hypothesis;
pub mod pitch;
pub mod profile;
pub mod tracker;
pub mod tuning;
pub mod vibrato;
pub mod yin;

mod error;

pub use config::DetectorConfig;
pub use error::{PitchError, PitchResult};
pub use hypothesis::{ProEstimate, ProEstimator, ScoredCandidate};
pub use pitch::BasicEstimator;
pub use profile::VoiceProfile;
pub use tracker::PitchTracker;
pub use tuning::{NoteInfo, PitchClass};
pub use vibrato::{Vibrato, estimate_vibrato};

use serde::{Deserialize, Serialize};

/// One time-domain analysis frame handed over by the capture layer.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    /// Linear PCM samples, nominally in [-1, 1]
    pub samples: &'a [f32],
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Caller clock in seconds, copied onto the resulting sample
    pub timestamp: f64,
}

impl<'a> AudioFrame<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            timestamp: 0.0,
        }
    }

    /// Same frame stamped with a time in seconds.
    pub fn at(self, timestamp: f64) -> Self {
        Self { timestamp, ..self }
    }
}

/// Represents the pitch detected in a single analysis frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchSample {
    /// Detected fundamental frequency in Hz.
    pub frequency: f32,
    /// Nearest equal-tempered pitch class.
    pub note: PitchClass,
    /// Octave of the nearest note (C4 is middle C).
    pub octave: i32,
    /// Deviation from the nearest note in cents, within [-50, 50].
    pub cents: i32,
    /// Confidence of the detection (0.0 to 1.0).
    pub confidence: f32,
    /// Caller clock in seconds.
    pub timestamp: f64,
}

impl PitchSample {
    /// Builds a sample from a frequency estimate.
    ///
    /// Returns `None` if the frequency is not a positive finite number.
    pub fn from_estimate(frequency: f32, confidence: f32, timestamp: f64) -> Option<Self> {
        let info = tuning::frequency_to_note(frequency)?;
        Some(Self {
            frequency,
            note: info.note,
            octave: info.octave,
            cents: info.cents,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
        })
    }

    pub fn note_info(&self) -> NoteInfo {
        NoteInfo {
            note: self.note,
            octave: self.octave,
            cents: self.cents,
        }
    }
}

/// Which estimator produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMode {
    Basic,
    Pro,
}

/// Why a frame produced no pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoPitch {
    /// Frame RMS fell below the silence gate
    Silence { rms: f32 },
    /// No CMND local minimum cleared the threshold
    NoCandidate,
    /// The estimate is a harmonic leap away from the tracked pitch
    HarmonicJump { frequency: f32, previous: f32 },
    /// The winning candidate's confidence is below the tier's gate
    LowConfidence { frequency: f32, confidence: f32 },
}

/// Outcome of analysing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection<T> {
    Pitched(T),
    Unpitched(NoPitch),
}

impl<T> Detection<T> {
    pub fn is_pitched(&self) -> bool {
        matches!(self, Detection::Pitched(_))
    }

    pub fn pitched(&self) -> Option<&T> {
        match self {
            Detection::Pitched(value) => Some(value),
            Detection::Unpitched(_) => None,
        }
    }

    pub fn into_pitched(self) -> Option<T> {
        match self {
            Detection::Pitched(value) => Some(value),
            Detection::Unpitched(_) => None,
        }
    }

    /// The rejection reason, if the frame was not pitched.
    pub fn reason(&self) -> Option<NoPitch> {
        match self {
            Detection::Pitched(_) => None,
            Detection::Unpitched(reason) => Some(*reason),
        }
    }
}
