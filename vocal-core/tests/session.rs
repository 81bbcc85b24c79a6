//! End-to-end behaviour of both estimators over short synthetic sessions.

use approx::assert_relative_eq;
use vocal_core::tuning::{frequency_to_note, note_to_frequency};
use vocal_core::{
    AudioFrame, BasicEstimator, DetectionMode, DetectorConfig, NoPitch, PitchClass, PitchError,
    ProEstimator, VoiceProfile, estimate_vibrato,
};

const SAMPLE_RATE: u32 = 48000;
const FRAME: usize = 2048;

// ============================================================================
// Test Signal Generators
// ============================================================================

fn generate_sine(freq: f32, amplitude: f32) -> Vec<f32> {
    (0..FRAME)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

/// Reproducible white noise in [-amplitude, amplitude]
fn generate_noise(seed: u64, amplitude: f32) -> Vec<f32> {
    let mut state = seed;
    (0..FRAME)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            amplitude * ((state as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32
        })
        .collect()
}

fn mix(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

fn within_percent(actual: f32, expected: f32, percent: f32) -> bool {
    (actual - expected).abs() <= expected * percent / 100.0
}

/// G3 fundamental under a much louder octave.
fn ambiguous_g3_frame() -> Vec<f32> {
    mix(&generate_sine(196.0, 0.12), &generate_sine(392.0, 0.5))
}

// ============================================================================
// Single frames
// ============================================================================

#[test]
fn test_sine_220_both_tiers() {
    let samples = generate_sine(220.0, 0.5);
    let frame = AudioFrame::new(&samples, SAMPLE_RATE);

    let mut basic = BasicEstimator::new();
    let sample = basic.detect(&frame).unwrap().into_pitched().unwrap();
    assert!(within_percent(sample.frequency, 220.0, 1.0), "basic {}", sample.frequency);
    assert!(sample.confidence >= basic.config().confidence_gate);

    let mut pro = ProEstimator::new();
    let estimate = pro.detect(&frame).unwrap().into_pitched().unwrap();
    assert!(
        within_percent(estimate.sample.frequency, 220.0, 1.0),
        "pro {}",
        estimate.sample.frequency
    );
    assert!(estimate.sample.confidence >= pro.config().confidence_gate);
    assert_eq!(estimate.mode, DetectionMode::Pro);
    assert_eq!(estimate.candidates[0].confidence, estimate.sample.confidence);
}

#[test]
fn test_silence_both_tiers() {
    let samples = vec![0.0; FRAME];
    let frame = AudioFrame::new(&samples, SAMPLE_RATE);

    let basic = BasicEstimator::new().detect(&frame).unwrap();
    assert!(matches!(basic.reason(), Some(NoPitch::Silence { .. })));
    let pro = ProEstimator::new().detect(&frame).unwrap();
    assert!(matches!(pro.reason(), Some(NoPitch::Silence { .. })));
}

#[test]
fn test_noise_has_no_candidate() {
    let samples = generate_noise(42, 0.5);
    let frame = AudioFrame::new(&samples, SAMPLE_RATE);

    assert_eq!(
        BasicEstimator::new().detect(&frame).unwrap().reason(),
        Some(NoPitch::NoCandidate)
    );
    assert_eq!(
        ProEstimator::new().detect(&frame).unwrap().reason(),
        Some(NoPitch::NoCandidate)
    );
}

#[test]
fn test_low_confidence_gate() {
    // Noise keeps the best CMND dip around 0.025
    let samples = mix(&generate_sine(220.0, 0.5), &generate_noise(7, 0.1));
    let frame = AudioFrame::new(&samples, SAMPLE_RATE);

    let strict_basic = DetectorConfig {
        confidence_gate: 0.99,
        ..DetectorConfig::basic()
    };
    let result = BasicEstimator::with_config(strict_basic).unwrap().detect(&frame).unwrap();
    assert!(matches!(result.reason(), Some(NoPitch::LowConfidence { .. })));

    let strict_pro = DetectorConfig {
        confidence_gate: 0.99,
        ..DetectorConfig::pro()
    };
    let mut pro = ProEstimator::with_config(strict_pro).unwrap();
    let result = pro.detect(&frame).unwrap();
    assert!(matches!(result.reason(), Some(NoPitch::LowConfidence { .. })));
    assert!(pro.tracker().is_empty());

    // Default gates let the same frame through
    assert!(BasicEstimator::new().detect(&frame).unwrap().is_pitched());
}

#[test]
fn test_fundamental_preferred_over_louder_octave() {
    let samples = mix(&generate_sine(220.0, 0.3), &generate_sine(440.0, 0.5));
    let frame = AudioFrame::new(&samples, SAMPLE_RATE);

    let sample = BasicEstimator::new().detect(&frame).unwrap().into_pitched().unwrap();
    assert!(within_percent(sample.frequency, 220.0, 1.0), "basic {}", sample.frequency);

    let estimate = ProEstimator::new().detect(&frame).unwrap().into_pitched().unwrap();
    assert!(
        within_percent(estimate.sample.frequency, 220.0, 1.0),
        "pro {}",
        estimate.sample.frequency
    );
}

#[test]
fn test_short_frame_is_an_error() {
    let samples = vec![0.1; 1000];
    let frame = AudioFrame::new(&samples, SAMPLE_RATE);
    let expected = PitchError::InputTooShort {
        len: 1000,
        required: 1476,
    };
    assert_eq!(BasicEstimator::new().detect(&frame), Err(expected.clone()));
    let err = ProEstimator::new().detect(&frame).unwrap_err();
    assert!(err.is_invalid_input());
    assert_eq!(err, expected);
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_continuity_resolves_ambiguous_frame_basic() {
    let steady = generate_sine(196.0, 0.5);
    let ambiguous = ambiguous_g3_frame();
    let mut basic = BasicEstimator::new();

    for i in 0..10 {
        let frame = AudioFrame::new(&steady, SAMPLE_RATE).at(i as f64 * 0.04);
        assert!(basic.detect(&frame).unwrap().is_pitched());
    }
    let sample = basic
        .detect(&AudioFrame::new(&ambiguous, SAMPLE_RATE).at(0.4))
        .unwrap()
        .into_pitched()
        .unwrap();
    assert!(within_percent(sample.frequency, 196.0, 1.0), "got {}", sample.frequency);
    assert_eq!(sample.note, PitchClass::G);
    assert_eq!(sample.octave, 3);
    assert_relative_eq!(sample.timestamp, 0.4);
}

#[test]
fn test_continuity_resolves_ambiguous_frame_pro() {
    let steady = generate_sine(196.0, 0.5);
    let ambiguous = ambiguous_g3_frame();
    let mut pro = ProEstimator::new();

    for _ in 0..10 {
        pro.detect(&AudioFrame::new(&steady, SAMPLE_RATE)).unwrap();
    }
    assert_eq!(pro.tracker().len(), 10);

    let estimate = pro
        .detect(&AudioFrame::new(&ambiguous, SAMPLE_RATE))
        .unwrap()
        .into_pitched()
        .unwrap();
    assert!(
        within_percent(estimate.sample.frequency, 196.0, 1.0),
        "got {}",
        estimate.sample.frequency
    );
    let winner = estimate.candidates[0];
    assert!(winner.stability_score > 0.9, "stability {}", winner.stability_score);
    assert!(estimate.candidates[1..].iter().all(|c| c.final_score < winner.final_score));
}

#[test]
fn test_reset_removes_history_bias() {
    let high = generate_sine(392.0, 0.5);
    let ambiguous = ambiguous_g3_frame();
    let frame = AudioFrame::new(&ambiguous, SAMPLE_RATE);

    let fresh = BasicEstimator::new().detect(&frame).unwrap().into_pitched().unwrap();

    let mut basic = BasicEstimator::new();
    for _ in 0..10 {
        basic.detect(&AudioFrame::new(&high, SAMPLE_RATE)).unwrap();
    }
    let biased = basic.detect(&frame).unwrap().into_pitched().unwrap();
    assert!(within_percent(biased.frequency, 392.0, 1.0), "biased {}", biased.frequency);

    basic.reset_tracking();
    assert!(basic.tracker().is_empty());
    let after_reset = basic.detect(&frame).unwrap().into_pitched().unwrap();
    assert_eq!(after_reset.frequency, fresh.frequency);
    assert!(within_percent(after_reset.frequency, 196.0, 1.0));
}

#[test]
fn test_tiers_keep_independent_history() {
    let steady = generate_sine(196.0, 0.5);
    let mut basic = BasicEstimator::new();
    let mut pro = ProEstimator::new();

    for _ in 0..3 {
        let frame = AudioFrame::new(&steady, SAMPLE_RATE);
        basic.detect(&frame).unwrap();
        pro.detect(&frame).unwrap();
    }
    pro.reset_tracking();
    assert!(pro.tracker().is_empty());
    assert_eq!(basic.tracker().len(), 3);
    assert_eq!(basic.mode(), DetectionMode::Basic);
    assert_eq!(pro.mode(), DetectionMode::Pro);
}

#[test]
fn test_voice_profile_breaks_octave_ambiguity() {
    // A2 under its louder octave: both periods dip below the Pro threshold and
    // the spectrum rates both hypotheses as harmonically consistent
    let samples = mix(&generate_sine(110.0, -0.24), &generate_sine(220.0, 0.5));
    let frame = AudioFrame::new(&samples, SAMPLE_RATE);

    // Without a profile the deeper dip wins
    let mut unprofiled = ProEstimator::new();
    let estimate = unprofiled.detect(&frame).unwrap().into_pitched().unwrap();
    assert!(
        within_percent(estimate.sample.frequency, 110.0, 1.0),
        "unprofiled pro {}",
        estimate.sample.frequency
    );
    assert!(estimate.candidates.iter().all(|c| c.range_score == 0.5));
    let winner = &estimate.candidates[0];
    let octave = estimate
        .candidates
        .iter()
        .find(|c| within_percent(c.frequency, 220.0, 2.0))
        .expect("220 Hz should remain a hypothesis");
    assert!(winner.confidence > octave.confidence);
    assert!((winner.harmonic_score - octave.harmonic_score).abs() < 0.05);

    // A tenor profile centred on A3 flips the choice to the upper octave
    let mut pro = ProEstimator::new();
    pro.set_profile(Some(VoiceProfile::new(180.0, 260.0, 220.0, 200)));
    let estimate = pro.detect(&frame).unwrap().into_pitched().unwrap();
    assert!(
        within_percent(estimate.sample.frequency, 220.0, 2.0),
        "profiled pro {}",
        estimate.sample.frequency
    );
    assert_eq!(estimate.sample.note, PitchClass::A);
    assert_eq!(estimate.sample.octave, 3);
    let low = estimate
        .candidates
        .iter()
        .find(|c| within_percent(c.frequency, 110.0, 1.0))
        .expect("110 Hz should remain a hypothesis");
    assert_eq!(low.range_score, 0.0);

    // An untrained profile changes nothing
    let mut untrained = ProEstimator::new();
    untrained.set_profile(Some(VoiceProfile::new(180.0, 260.0, 220.0, 10)));
    let same = untrained.detect(&frame).unwrap().into_pitched().unwrap();
    assert!(within_percent(same.sample.frequency, 110.0, 1.0), "untrained {}", same.sample.frequency);
}

#[test]
fn test_vibrato_over_detected_session() {
    // 11 ms hop through a 5 Hz, +/- 40 cent vibrato around A3
    let hop = 0.011;
    let mut basic = BasicEstimator::new();
    let mut history = Vec::new();
    for i in 0..60 {
        let t = i as f64 * hop;
        let cents = 40.0 * (2.0 * std::f64::consts::PI * 5.0 * t).sin();
        let freq = 220.0 * 2.0_f32.powf(cents as f32 / 1200.0);
        let samples = generate_sine(freq, 0.5);
        if let Some(sample) = basic
            .detect(&AudioFrame::new(&samples, SAMPLE_RATE).at(t))
            .unwrap()
            .into_pitched()
        {
            history.push(sample);
        }
    }
    assert!(history.len() >= 50, "only {} pitched frames", history.len());
    let vibrato = estimate_vibrato(&history, 0.5).unwrap();
    assert!((3.0..=7.0).contains(&vibrato.rate_hz), "rate {}", vibrato.rate_hz);
    assert!(
        (40.0..=70.0).contains(&vibrato.extent_cents),
        "extent {}",
        vibrato.extent_cents
    );
}

// ============================================================================
// Note conversion
// ============================================================================

#[test]
fn test_note_round_trip() {
    for note in PitchClass::ALL {
        for octave in 2..=6 {
            let freq = note_to_frequency(note.name(), octave);
            let info = frequency_to_note(freq).unwrap();
            assert_eq!((info.note, info.octave, info.cents), (note, octave, 0));
        }
    }
    let a4 = frequency_to_note(440.0).unwrap();
    assert_eq!((a4.note, a4.octave, a4.cents), (PitchClass::A, 4, 0));
}
