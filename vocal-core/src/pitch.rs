//! # Pitch Detection Module
//!
//! This module implements the Basic tier: a single-hypothesis YIN estimator
//! tuned for singing voice.
//!
//! ## Features
//! - YIN pitch detection with sub-harmonic candidate filtering
//! - Octave-aware continuity scoring against the tracked pitch
//! - Parabolic interpolation for sub-sample accuracy
//! - Post-hoc veto of implausible harmonic leaps
//! - Median-smoothed tracking over the last five accepted frames

use log::{debug, trace};

use crate::config::DetectorConfig;
use crate::error::PitchResult;
use crate::tracker::{BASIC_HISTORY, PitchTracker};
use crate::tuning::semitone_distance;
use crate::yin::{self, Candidate, YinBuffer};
use crate::{AudioFrame, Detection, DetectionMode, NoPitch, PitchSample};

/// Relative tolerance when matching a period multiple.
const MULTIPLE_TOLERANCE: f32 = 0.05;
/// A sub-multiple survives only if its dip is deeper than this margin.
const DEPTH_MARGIN: f32 = 0.05;
/// CMND band around the best candidate treated as a tie.
const TIE_BAND: f32 = 0.05;

/// Weight of the (octave-aware) semitone distance in continuity scoring.
const DISTANCE_WEIGHT: f32 = 3.0;
/// Weight of the CMND value in continuity scoring.
const DIFFERENCE_WEIGHT: f32 = 20.0;
/// Semitone cost charged per octave of an apparent octave jump.
const OCTAVE_JUMP_COST: f32 = 15.0;
/// How close to a whole number of octaves a distance must be to count as a jump.
const OCTAVE_TOLERANCE: f32 = 1.0;

/// Frequency ratios vetoed as harmonic leaps.
const HARMONIC_RATIOS: [f32; 3] = [2.0, 3.0, 4.0];
const HARMONIC_RATIO_TOLERANCE: f32 = 0.08;
/// A harmonic-ratio change must also exceed this many semitones to be vetoed.
const MAX_PLAUSIBLE_JUMP: f32 = 5.0;

/// Minimum history before the tracked pitch switches from raw to median.
const MEDIAN_MIN_SAMPLES: usize = 3;

/// Single-hypothesis YIN estimator with octave-jump guards.
///
/// Holds its own [`PitchTracker`]; create one estimator per detection stream.
#[derive(Debug, Clone)]
pub struct BasicEstimator {
    config: DetectorConfig,
    yin: YinBuffer,
    tracker: PitchTracker,
}

impl Default for BasicEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicEstimator {
    /// Creates an estimator with the Basic tier defaults.
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::basic(),
            yin: YinBuffer::new(),
            tracker: PitchTracker::new(BASIC_HISTORY),
        }
    }

    /// Creates an estimator with a custom configuration.
    pub fn with_config(config: DetectorConfig) -> PitchResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn mode(&self) -> DetectionMode {
        DetectionMode::Basic
    }

    pub fn tracker(&self) -> &PitchTracker {
        &self.tracker
    }

    /// Forgets the tracked pitch. Call at the start and end of a session.
    pub fn reset_tracking(&mut self) {
        debug!("basic tracker reset ({} samples dropped)", self.tracker.len());
        self.tracker.reset();
    }

    /// Estimates the pitch of one frame.
    ///
    /// # Arguments
    /// * `frame` - Time-domain samples, sample rate and timestamp
    ///
    /// # Returns
    /// * `Ok(Detection::Pitched(sample))` - A reliable pitch
    /// * `Ok(Detection::Unpitched(reason))` - Silence, no candidate, a vetoed
    ///   harmonic leap or low confidence
    /// * `Err(PitchError)` - The frame is too short or malformed
    pub fn detect(&mut self, frame: &AudioFrame<'_>) -> PitchResult<Detection<PitchSample>> {
        let (min_period, max_period) =
            yin::validate_frame(frame.samples, frame.sample_rate, &self.config)?;

        // --- Noise Gate: Calculate RMS to filter out silence ---
        let rms = yin::rms(frame.samples);
        if rms < self.config.rms_threshold {
            return Ok(reject(NoPitch::Silence { rms }));
        }

        self.yin.compute(frame.samples, max_period);
        let candidates =
            self.yin
                .candidates(min_period, self.config.yin_threshold, frame.sample_rate);
        if candidates.is_empty() {
            return Ok(reject(NoPitch::NoCandidate));
        }

        let filtered = filter_subharmonics(&candidates);
        trace!("basic candidates {candidates:?}, kept {filtered:?}");

        let previous = self.tracker.previous();
        let winner = match previous {
            Some(prev) if filtered.len() >= 2 => pick_by_continuity(&filtered, prev),
            _ => pick_fundamental(&filtered),
        };
        let Some(winner) = winner else {
            return Ok(reject(NoPitch::NoCandidate));
        };

        let refined_period = self.yin.refine(winner.period);
        let frequency = (frame.sample_rate as f32 / refined_period)
            .clamp(self.config.min_frequency, self.config.max_frequency);

        if let Some(prev) = previous {
            if is_harmonic_jump(frequency, prev) {
                return Ok(reject(NoPitch::HarmonicJump {
                    frequency,
                    previous: prev,
                }));
            }
        }

        let confidence = winner.confidence();
        if confidence < self.config.confidence_gate {
            return Ok(reject(NoPitch::LowConfidence {
                frequency,
                confidence,
            }));
        }

        let Some(sample) = PitchSample::from_estimate(frequency, confidence, frame.timestamp)
        else {
            return Ok(reject(NoPitch::NoCandidate));
        };

        self.tracker.push(frequency);
        if self.tracker.len() >= MEDIAN_MIN_SAMPLES {
            if let Some(median) = self.tracker.median() {
                self.tracker.set_previous(median);
            }
        }

        Ok(Detection::Pitched(sample))
    }
}

fn reject<T>(reason: NoPitch) -> Detection<T> {
    debug!("basic frame rejected: {reason:?}");
    Detection::Unpitched(reason)
}

/// Drops candidates whose period is an integer multiple (2x, 3x, 4x, ...) of
/// a shorter kept period, i.e. sub-harmonics of an already-kept candidate.
///
/// A sub-multiple whose CMND dip is clearly deeper than the kept candidate's
/// survives: the shorter period then belongs to a strong overtone and the
/// longer one to the true fundamental.
///
/// # Arguments
/// * `candidates` - Candidates in ascending period order
pub fn filter_subharmonics(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let shadowed = kept.iter().any(|k| {
            let ratio = candidate.period as f32 / k.period as f32;
            let multiple = ratio.round();
            let is_multiple =
                multiple >= 2.0 && (ratio - multiple).abs() <= multiple * MULTIPLE_TOLERANCE;
            is_multiple && candidate.difference >= k.difference - DEPTH_MARGIN
        });
        if !shadowed {
            kept.push(*candidate);
        }
    }
    kept
}

/// Semitone distance in which an apparent octave jump is inflated.
///
/// A distance within [`OCTAVE_TOLERANCE`] of `k >= 1` octaves costs
/// `remainder + k * 15` instead of `12 * k`, so octave flips between
/// consecutive frames are strongly discouraged.
pub fn octave_aware_distance(frequency: f32, previous: f32) -> f32 {
    let distance = semitone_distance(frequency, previous);
    let octaves = (distance / 12.0).round();
    let remainder = (distance - octaves * 12.0).abs();
    if octaves >= 1.0 && remainder <= OCTAVE_TOLERANCE {
        remainder + octaves * OCTAVE_JUMP_COST
    } else {
        distance
    }
}

/// Picks the candidate closest to the tracked pitch (lowest score wins).
fn pick_by_continuity(candidates: &[Candidate], previous: f32) -> Option<Candidate> {
    let score = |c: &Candidate| {
        octave_aware_distance(c.frequency, previous) * DISTANCE_WEIGHT
            + c.difference * DIFFERENCE_WEIGHT
    };
    candidates
        .iter()
        .min_by(|a, b| score(a).total_cmp(&score(b)))
        .copied()
}

/// Picks the lowest-frequency candidate among those within [`TIE_BAND`] of
/// the best CMND value, favouring the fundamental over a harmonic.
fn pick_fundamental(candidates: &[Candidate]) -> Option<Candidate> {
    let best = candidates
        .iter()
        .map(|c| c.difference)
        .min_by(|a, b| a.total_cmp(b))?;
    candidates
        .iter()
        .filter(|c| c.difference <= best + TIE_BAND)
        .min_by(|a, b| a.frequency.total_cmp(&b.frequency))
        .copied()
}

/// True when `frequency` sits at a 2x, 3x or 4x ratio (either direction) from
/// the tracked pitch and the jump is wider than a fourth.
pub fn is_harmonic_jump(frequency: f32, previous: f32) -> bool {
    let ratio = frequency / previous;
    let inverse = previous / frequency;
    let near_harmonic = HARMONIC_RATIOS.iter().any(|&h| {
        (ratio - h).abs() < HARMONIC_RATIO_TOLERANCE || (inverse - h).abs() < HARMONIC_RATIO_TOLERANCE
    });
    near_harmonic && semitone_distance(frequency, previous) > MAX_PLAUSIBLE_JUMP
}
