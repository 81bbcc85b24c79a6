//! Error types for the pitch estimators.
//!
//! Only malformed input or configuration is an error. A frame that simply
//! carries no usable pitch is reported through [`crate::Detection::Unpitched`].

use thiserror::Error;

/// Errors raised when a frame or configuration cannot be analysed at all.
///
/// Invalid input comes in two shapes: [`PitchError::InputTooShort`] for a frame
/// that cannot hold the analysis window, and [`PitchError::InvalidInput`] for
/// one whose content is unusable. Match both, or use
/// [`PitchError::is_invalid_input`], to catch every rejected frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PitchError {
    /// Invalid input: the frame is shorter than the lag span plus
    /// integration window (`2 * max_period` samples)
    #[error("Input too short: {len} samples, need at least {required}")]
    InputTooShort { len: usize, required: usize },

    /// Sample rate of zero
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Frequency band is empty, inverted or not positive
    #[error("Invalid frequency range: {min} - {max} Hz")]
    InvalidFrequencyRange { min: f32, max: f32 },

    /// A configuration value is outside its accepted range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input: frame content cannot be analysed (non-finite samples).
    /// Short frames are reported as [`PitchError::InputTooShort`] instead.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PitchError {
    /// True when the frame itself was rejected, as opposed to the detector
    /// configuration or sample rate.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InputTooShort { .. } | Self::InvalidInput(_))
    }
}

/// Result type for pitch operations
pub type PitchResult<T> = Result<T, PitchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_malformed_frames_are_invalid_input() {
        let short = PitchError::InputTooShort { len: 512, required: 1476 };
        assert!(short.is_invalid_input());
        assert_eq!(short.to_string(), "Input too short: 512 samples, need at least 1476");
        assert!(PitchError::InvalidInput("non-finite sample at index 3".into()).is_invalid_input());

        assert!(!PitchError::InvalidSampleRate(0).is_invalid_input());
        assert!(!PitchError::InvalidConfig("yin_threshold".into()).is_invalid_input());
        assert!(!PitchError::InvalidFrequencyRange { min: 500.0, max: 100.0 }.is_invalid_input());
    }
}
