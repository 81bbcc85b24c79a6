//! Multi-hypothesis pitch estimation (Pro tier)
//!
//! Every CMND dip below a loose threshold becomes a hypothesis. Each one is
//! scored on four axes and the best fused score wins:
//! - harmonic consistency against the frame's magnitude spectrum
//! - temporal stability against recently accepted pitches
//! - range match against the singer's [`VoiceProfile`]
//! - the candidate's own YIN confidence

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::error::PitchResult;
use crate::fft::{SpectralAnalyzer, Spectrum};
use crate::profile::VoiceProfile;
use crate::tracker::{PRO_HISTORY, PitchTracker};
use crate::tuning::semitone_distance;
use crate::yin::{self, Candidate, YinBuffer};
use crate::{AudioFrame, Detection, DetectionMode, NoPitch, PitchSample};

/// Scored candidates kept for diagnostics.
pub const TOP_CANDIDATES: usize = 3;

/// Final scores closer than this are ties; the shorter period wins a tie.
const SCORE_TIE_EPSILON: f32 = 1e-3;

/// Score handed out when a prior has nothing to say.
const NEUTRAL_SCORE: f32 = 0.5;

/// Sub-harmonic energy ratio above which the candidate is likely a sub-harmonic pick.
const SUBHARMONIC_DOMINANCE: f32 = 1.2;
const SUBHARMONIC_PICK_SCORE: f32 = 0.3;
/// Octave-above energy ratio above which the candidate is likely an octave too low.
const OCTAVE_ABOVE_DOMINANCE: f32 = 1.5;
const OCTAVE_LOW_PICK_SCORE: f32 = 0.4;
/// Harmonic energy below this fraction of the frame's peak bin is window leakage.
const LEAKAGE_LEVEL: f32 = 1e-3;

/// History needed before stability is scored.
const MIN_STABILITY_HISTORY: usize = 3;

/// Floor for in-range candidates far from the comfortable pitch.
const IN_RANGE_FLOOR: f32 = 0.3;
/// Semitones from the comfortable pitch at which the in-range score bottoms out.
const IN_RANGE_SPAN: f32 = 24.0;

/// Relative weight of each scoring axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub harmonic: f32,
    pub stability: f32,
    pub range: f32,
    pub confidence: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            harmonic: 0.4,
            stability: 0.3,
            range: 0.2,
            confidence: 0.1,
        }
    }
}

/// One hypothesis with its per-axis scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// Candidate frequency at its integer period, in Hz
    pub frequency: f32,
    /// YIN confidence `1 - d'`
    pub confidence: f32,
    pub harmonic_score: f32,
    pub stability_score: f32,
    pub range_score: f32,
    pub final_score: f32,
}

/// Pro-tier result: the winning sample plus the best-scored hypotheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProEstimate {
    pub sample: PitchSample,
    /// Up to [`TOP_CANDIDATES`] hypotheses, winner first
    pub candidates: Vec<ScoredCandidate>,
    pub mode: DetectionMode,
}

/// Harmonic-consistency score of a candidate fundamental.
///
/// Compares the harmonic energy at `f0` with that of its sub-harmonic `f0 / 2`
/// and of the octave above `2 * f0`.
///
/// # Returns
/// * `0.3` - The sub-harmonic explains more than 120% of the energy
/// * `0.4` - The octave above explains more than 150% of the energy
/// * otherwise `E(f0) / max(E(f0), E(f0/2), E(2f0))` in [0, 1]
///
/// The score is a ratio, so a candidate far below the sung pitch, whose first
/// harmonics all fall between the voice's partials, compares leakage with
/// leakage and can still score close to 1. Such candidates are logged at
/// `trace` level; the stability and range axes are what pull them down.
pub fn harmonic_consistency(spectrum: &Spectrum, f0: f32) -> f32 {
    let energy = spectrum.harmonic_energy(f0);
    let sub_energy = spectrum.harmonic_energy(f0 / 2.0);
    let octave_energy = spectrum.harmonic_energy(f0 * 2.0);

    if is_leakage_level(spectrum, energy) {
        trace!(
            "{f0:.1} Hz: harmonics at leakage level ({energy:.2e} vs peak {:.2e})",
            spectrum.peak_magnitude()
        );
    }

    if sub_energy > energy * SUBHARMONIC_DOMINANCE {
        return SUBHARMONIC_PICK_SCORE;
    }
    if octave_energy > energy * OCTAVE_ABOVE_DOMINANCE {
        return OCTAVE_LOW_PICK_SCORE;
    }
    let reference = energy.max(sub_energy).max(octave_energy).max(f32::EPSILON);
    (energy / reference).clamp(0.0, 1.0)
}

fn is_leakage_level(spectrum: &Spectrum, energy: f32) -> bool {
    energy < spectrum.peak_magnitude() * LEAKAGE_LEVEL
}

/// Temporal-stability score from the tracked history.
///
/// Neutral with fewer than three accepted pitches; otherwise falls linearly
/// from 1 (no movement) to 0 (a full octave on average).
pub fn stability_score(tracker: &PitchTracker, f0: f32) -> f32 {
    if tracker.len() < MIN_STABILITY_HISTORY {
        return NEUTRAL_SCORE;
    }
    let total: f32 = tracker.history().map(|f| semitone_distance(f0, f)).sum();
    let average = total / tracker.len() as f32;
    (1.0 - average / 12.0).max(0.0)
}

/// Range-match score against a voice profile.
///
/// Neutral without a trained profile. Inside the range the score falls from 1
/// at the comfortable pitch to a floor of 0.3; outside it falls from 0.3 by
/// one unit per octave beyond the boundary.
pub fn range_score(profile: Option<&VoiceProfile>, f0: f32) -> f32 {
    let Some(profile) = profile.filter(|p| p.is_trained()) else {
        return NEUTRAL_SCORE;
    };
    if profile.contains(f0) {
        let from_center = semitone_distance(f0, profile.comfortable_f0);
        (1.0 - from_center / IN_RANGE_SPAN).max(IN_RANGE_FLOOR)
    } else {
        let boundary = if f0 < profile.min_f0 {
            profile.min_f0
        } else {
            profile.max_f0
        };
        let outside = semitone_distance(f0, boundary);
        (IN_RANGE_FLOOR - outside / 12.0).max(0.0)
    }
}

/// Multi-hypothesis YIN estimator with spectral, temporal and range priors.
#[derive(Debug)]
pub struct ProEstimator {
    config: DetectorConfig,
    weights: ScoreWeights,
    yin: YinBuffer,
    analyzer: SpectralAnalyzer,
    tracker: PitchTracker,
    profile: Option<VoiceProfile>,
}

impl Default for ProEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProEstimator {
    /// Creates an estimator with the Pro tier defaults and no voice profile.
    pub fn new() -> Self {
        let config = DetectorConfig::pro();
        Self {
            analyzer: SpectralAnalyzer::new(config.fft_size),
            config,
            weights: ScoreWeights::default(),
            yin: YinBuffer::new(),
            tracker: PitchTracker::new(PRO_HISTORY),
            profile: None,
        }
    }

    /// Creates an estimator with a custom configuration.
    pub fn with_config(config: DetectorConfig) -> PitchResult<Self> {
        config.validate()?;
        Ok(Self {
            analyzer: SpectralAnalyzer::new(config.fft_size),
            config,
            ..Self::new()
        })
    }

    /// Replaces the scoring weights.
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Attaches (or clears) the singer's voice profile.
    pub fn set_profile(&mut self, profile: Option<VoiceProfile>) {
        self.profile = profile;
    }

    pub fn profile(&self) -> Option<&VoiceProfile> {
        self.profile.as_ref()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn mode(&self) -> DetectionMode {
        DetectionMode::Pro
    }

    pub fn tracker(&self) -> &PitchTracker {
        &self.tracker
    }

    /// Forgets the tracked history. Call at the start and end of a session.
    pub fn reset_tracking(&mut self) {
        debug!("pro tracker reset ({} samples dropped)", self.tracker.len());
        self.tracker.reset();
    }

    /// Estimates the pitch of one frame.
    ///
    /// # Arguments
    /// * `frame` - Time-domain samples, sample rate and timestamp
    ///
    /// # Returns
    /// * `Ok(Detection::Pitched(estimate))` - Winner plus top scored candidates
    /// * `Ok(Detection::Unpitched(reason))` - Silence, no candidate or low confidence
    /// * `Err(PitchError)` - The frame is too short or malformed
    pub fn detect(&mut self, frame: &AudioFrame<'_>) -> PitchResult<Detection<ProEstimate>> {
        let (min_period, max_period) =
            yin::validate_frame(frame.samples, frame.sample_rate, &self.config)?;

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

        let spectrum = self.analyzer.analyze(frame.samples, frame.sample_rate);
        let mut scored: Vec<(Candidate, ScoredCandidate)> = candidates
            .iter()
            .map(|c| (*c, self.score(&spectrum, c)))
            .collect();
        trace!("pro hypotheses {scored:?}");

        let Some(winner_index) = select_winner(&scored) else {
            return Ok(reject(NoPitch::NoCandidate));
        };
        let (winner, winner_score) = scored.swap_remove(winner_index);

        if winner_score.confidence < self.config.confidence_gate {
            return Ok(reject(NoPitch::LowConfidence {
                frequency: winner.frequency,
                confidence: winner_score.confidence,
            }));
        }

        let refined_period = self.yin.refine(winner.period);
        let frequency = (frame.sample_rate as f32 / refined_period)
            .clamp(self.config.min_frequency, self.config.max_frequency);
        let Some(sample) =
            PitchSample::from_estimate(frequency, winner_score.confidence, frame.timestamp)
        else {
            return Ok(reject(NoPitch::NoCandidate));
        };

        self.tracker.push(frequency);

        scored.sort_by(|a, b| b.1.final_score.total_cmp(&a.1.final_score));
        let mut top = Vec::with_capacity(TOP_CANDIDATES);
        top.push(winner_score);
        top.extend(
            scored
                .iter()
                .map(|(_, s)| *s)
                .take(TOP_CANDIDATES - 1),
        );

        Ok(Detection::Pitched(ProEstimate {
            sample,
            candidates: top,
            mode: DetectionMode::Pro,
        }))
    }

    fn score(&self, spectrum: &Spectrum, candidate: &Candidate) -> ScoredCandidate {
        let f0 = candidate.frequency;
        let harmonic_score = harmonic_consistency(spectrum, f0);
        let stability_score = stability_score(&self.tracker, f0);
        let range_score = range_score(self.profile.as_ref(), f0);
        let confidence = candidate.confidence();

        let w = &self.weights;
        let final_score = harmonic_score * w.harmonic
            + stability_score * w.stability
            + range_score * w.range
            + confidence * w.confidence;

        ScoredCandidate {
            frequency: f0,
            confidence,
            harmonic_score,
            stability_score,
            range_score,
            final_score,
        }
    }
}

/// Index of the highest fused score; near-ties go to the shorter period.
fn select_winner(scored: &[(Candidate, ScoredCandidate)]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, (candidate, score)) in scored.iter().enumerate() {
        let replace = match best {
            None => true,
            Some(b) => {
                let (best_candidate, best_score) = &scored[b];
                let delta = score.final_score - best_score.final_score;
                delta > SCORE_TIE_EPSILON
                    || (delta.abs() <= SCORE_TIE_EPSILON && candidate.period < best_candidate.period)
            }
        };
        if replace {
            best = Some(i);
        }
    }
    best
}

fn reject<T>(reason: NoPitch) -> Detection<T> {
    debug!("pro frame rejected: {reason:?}");
    Detection::Unpitched(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::DEFAULT_FFT_SIZE;
    use approx::assert_relative_eq;

    const SAMPLE_RATE: u32 = 48000;
    const FRAME: usize = 2048;

    fn generate_sine(freq: f32, amplitude: f32) -> Vec<f32> {
        (0..FRAME)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    fn mix(a: &[f32], b: &[f32]) -> Vec<f32> {
        a.iter().zip(b).map(|(x, y)| x + y).collect()
    }

    fn tracker_with(frequencies: &[f32]) -> PitchTracker {
        let mut tracker = PitchTracker::new(PRO_HISTORY);
        for &f in frequencies {
            tracker.push(f);
        }
        tracker
    }

    fn scored(period: usize, final_score: f32) -> (Candidate, ScoredCandidate) {
        let frequency = SAMPLE_RATE as f32 / period as f32;
        (
            Candidate {
                period,
                frequency,
                difference: 0.0,
            },
            ScoredCandidate {
                frequency,
                confidence: 1.0,
                harmonic_score: 0.0,
                stability_score: 0.0,
                range_score: 0.0,
                final_score,
            },
        )
    }

    #[test]
    fn test_sine_220() {
        let mut estimator = ProEstimator::new();
        let samples = generate_sine(220.0, 0.5);
        let result = estimator.detect(&AudioFrame::new(&samples, SAMPLE_RATE)).unwrap();
        let estimate = result.pitched().expect("220 Hz sine should be pitched");
        assert!(
            (estimate.sample.frequency - 220.0).abs() < 2.2,
            "got {}",
            estimate.sample.frequency
        );
        assert!(estimate.sample.confidence >= 0.6);
        assert_eq!(estimate.mode, DetectionMode::Pro);
        assert!(!estimate.candidates.is_empty() && estimate.candidates.len() <= TOP_CANDIDATES);
        assert_eq!(estimator.tracker().len(), 1);
    }

    #[test]
    fn test_silence() {
        let mut estimator = ProEstimator::new();
        let samples = vec![0.0; FRAME];
        let result = estimator.detect(&AudioFrame::new(&samples, SAMPLE_RATE)).unwrap();
        assert!(matches!(result.reason(), Some(NoPitch::Silence { .. })));
    }

    #[test]
    fn test_harmonic_consistency_prefers_fundamental() {
        let samples = mix(&generate_sine(220.0, 0.3), &generate_sine(440.0, 0.5));
        let mut analyzer = SpectralAnalyzer::new(DEFAULT_FFT_SIZE);
        let spectrum = analyzer.analyze(&samples, SAMPLE_RATE);

        let fundamental = harmonic_consistency(&spectrum, 220.0);
        let octave = harmonic_consistency(&spectrum, 440.0);
        assert!(fundamental > octave, "f0 {fundamental} vs 2f0 {octave}");
        assert_relative_eq!(fundamental, 1.0);
    }

    #[test]
    fn test_harmonic_consistency_flags_octave_low_pick() {
        let samples = generate_sine(440.0, 0.5);
        let mut analyzer = SpectralAnalyzer::new(DEFAULT_FFT_SIZE);
        let spectrum = analyzer.analyze(&samples, SAMPLE_RATE);
        assert_relative_eq!(harmonic_consistency(&spectrum, 220.0), OCTAVE_LOW_PICK_SCORE);
        assert_relative_eq!(harmonic_consistency(&spectrum, 440.0), 1.0);
    }

    #[test]
    fn test_leakage_level_candidate_keeps_ratio_score() {
        // One strong partial at 1760 Hz over a flat leakage floor
        let mut magnitudes = vec![1e-6; DEFAULT_FFT_SIZE / 2];
        magnitudes[74..=76].fill(100.0);
        let spectrum = Spectrum::from_magnitudes(magnitudes, DEFAULT_FFT_SIZE, SAMPLE_RATE);

        // 1760 / 24: every harmonic, sub-harmonic and octave sits on the floor
        let low = 1760.0 / 24.0;
        let energy = spectrum.harmonic_energy(low);
        assert!(is_leakage_level(&spectrum, energy));
        assert_relative_eq!(harmonic_consistency(&spectrum, low), 1.0);

        let energy = spectrum.harmonic_energy(1760.0);
        assert!(!is_leakage_level(&spectrum, energy));
        assert_relative_eq!(harmonic_consistency(&spectrum, 1760.0), 1.0);
    }

    #[test]
    fn test_stability_score() {
        assert_eq!(stability_score(&tracker_with(&[196.0, 196.0]), 392.0), NEUTRAL_SCORE);

        let history = tracker_with(&[196.0; 5]);
        assert_relative_eq!(stability_score(&history, 196.0), 1.0);
        assert_relative_eq!(stability_score(&history, 392.0), 0.0, epsilon = 1e-4);
        // Half an octave away
        let tritone = 196.0 * 2.0_f32.sqrt();
        assert_relative_eq!(stability_score(&history, tritone), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_range_score() {
        let profile = VoiceProfile::new(180.0, 260.0, 220.0, 200);
        assert_eq!(range_score(None, 220.0), NEUTRAL_SCORE);
        let untrained = VoiceProfile {
            sample_count: 10,
            ..profile
        };
        assert_eq!(range_score(Some(&untrained), 110.0), NEUTRAL_SCORE);

        assert_relative_eq!(range_score(Some(&profile), 220.0), 1.0);
        let inside_edge = range_score(Some(&profile), 180.0);
        assert!(inside_edge > IN_RANGE_FLOOR && inside_edge < 1.0);
        // 110 Hz is ~8.5 semitones below the range: clamped to zero
        assert_eq!(range_score(Some(&profile), 110.0), 0.0);
        // One semitone above the top
        let just_above = 260.0 * 2.0_f32.powf(1.0 / 12.0);
        assert_relative_eq!(
            range_score(Some(&profile), just_above),
            0.3 - 1.0 / 12.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_select_winner_breaks_ties_toward_shorter_period() {
        let candidates = [scored(654, 0.7502), scored(218, 0.75), scored(436, 0.51)];
        assert_eq!(select_winner(&candidates), Some(1));

        let clear = [scored(654, 0.80), scored(218, 0.75)];
        assert_eq!(select_winner(&clear), Some(0));
        assert_eq!(select_winner(&[]), None);
    }

    #[test]
    fn test_custom_weights() {
        let weights = ScoreWeights {
            harmonic: 0.0,
            stability: 0.0,
            range: 0.0,
            confidence: 1.0,
        };
        let mut estimator = ProEstimator::new().with_weights(weights);
        let samples = generate_sine(220.0, 0.5);
        let estimate = estimator
            .detect(&AudioFrame::new(&samples, SAMPLE_RATE))
            .unwrap()
            .into_pitched()
            .unwrap();
        for c in &estimate.candidates {
            assert_relative_eq!(c.final_score, c.confidence);
        }
    }
}
