//! Synthetic sung phrase for exercising both tiers without a microphone.

use std::f64::consts::TAU;

use vocal_core::tuning::note_to_frequency;

/// One sung note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub name: &'static str,
    pub octave: i32,
    pub seconds: f64,
}

const fn note(name: &'static str, octave: i32, seconds: f64) -> Note {
    Note {
        name,
        octave,
        seconds,
    }
}

/// A short G major line ending on a long held tonic.
pub const PHRASE: [Note; 6] = [
    note("G", 3, 0.4),
    note("A", 3, 0.4),
    note("B", 3, 0.4),
    note("D", 4, 0.4),
    note("B", 3, 0.4),
    note("G", 3, 1.5),
];

/// Relative amplitude of harmonics 1..=6, a rough sung "ah".
const HARMONIC_AMPLITUDES: [f64; 6] = [1.0, 0.6, 0.35, 0.2, 0.1, 0.05];
const PEAK_AMPLITUDE: f64 = 0.5;
/// Silence between notes in seconds.
const GAP_SECONDS: f64 = 0.05;

/// Vibrato applied to every note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VibratoShape {
    pub rate_hz: f64,
    pub depth_cents: f64,
}

impl Default for VibratoShape {
    fn default() -> Self {
        Self {
            rate_hz: 5.5,
            depth_cents: 35.0,
        }
    }
}

/// Renders a phrase with continuous phase across each note.
///
/// Each note starts with a short gap of silence; vibrato sweeps the
/// fundamental by `depth_cents` either way.
pub fn render(phrase: &[Note], vibrato: VibratoShape, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f64;
    let norm: f64 = HARMONIC_AMPLITUDES.iter().sum();
    let mut out = Vec::new();

    for n in phrase {
        out.extend(std::iter::repeat_n(0.0, (GAP_SECONDS * rate) as usize));

        let base = note_to_frequency(n.name, n.octave) as f64;
        let len = (n.seconds * rate) as usize;
        let mut phase = 0.0;
        for i in 0..len {
            let t = i as f64 / rate;
            let cents = vibrato.depth_cents * (TAU * vibrato.rate_hz * t).sin();
            let f0 = base * 2.0_f64.powf(cents / 1200.0);
            phase = (phase + TAU * f0 / rate) % TAU;

            let value: f64 = HARMONIC_AMPLITUDES
                .iter()
                .enumerate()
                .map(|(k, a)| a * ((k + 1) as f64 * phase).sin())
                .sum();
            out.push((PEAK_AMPLITUDE * value / norm) as f32);
        }
    }
    out
}
