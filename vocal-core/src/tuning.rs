//! # Musical Tuning Module
//!
//! This module converts between frequencies and musical notes for vocal feedback.
//! It uses twelve-tone equal temperament with A4 = 440 Hz and MIDI note numbering
//! (A4 = 69, C4 = 60).
//!
//! ## Features
//! - Chromatic pitch classes starting at C, with sharp and flat spellings
//! - Frequency to (note, octave, cents) conversion
//! - Note name and octave to frequency conversion
//! - Semitone and cent distances between two frequencies

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PitchError;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI note number of A4.
pub const A4_MIDI: i32 = 69;

/// Chromatic note names, starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the twelve chromatic pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order from C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C (0-11).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Pitch class for a semitone index; wraps negative and large values.
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    /// Canonical (sharp) spelling.
    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.index()]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Spellings accepted by the parser. Sharps are canonical; flats map onto them.
static NOTE_MAP: Lazy<BTreeMap<&'static str, PitchClass>> = Lazy::new(|| {
    let mut map: BTreeMap<&'static str, PitchClass> = NOTE_NAMES
        .iter()
        .zip(PitchClass::ALL)
        .map(|(&name, class)| (name, class))
        .collect();
    for (flat, class) in [
        ("Db", PitchClass::CSharp),
        ("Eb", PitchClass::DSharp),
        ("Gb", PitchClass::FSharp),
        ("Ab", PitchClass::GSharp),
        ("Bb", PitchClass::ASharp),
    ] {
        map.insert(flat, class);
    }
    map
});

impl FromStr for PitchClass {
    type Err = PitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NOTE_MAP
            .get(s.trim())
            .copied()
            .ok_or_else(|| PitchError::InvalidInput(format!("unknown note name '{s}'")))
    }
}

/// A frequency expressed as the nearest equal-tempered note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub note: PitchClass,
    /// Scientific pitch notation octave (C4 is middle C)
    pub octave: i32,
    /// Deviation from the note in cents, always within [-50, 50]
    pub cents: i32,
}

impl fmt::Display for NoteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {:+}c", self.note, self.octave, self.cents)
    }
}

/// Fractional MIDI note number for a frequency.
pub fn frequency_to_midi(freq: f32) -> f64 {
    12.0 * (freq as f64 / A4_FREQUENCY as f64).log2() + A4_MIDI as f64
}

/// Frequency in Hz of a (possibly fractional) MIDI note number.
pub fn midi_to_frequency(midi: f64) -> f32 {
    (A4_FREQUENCY as f64 * 2.0_f64.powf((midi - A4_MIDI as f64) / 12.0)) as f32
}

/// Finds the nearest note to a frequency.
///
/// The fractional note number is rounded to the nearest semitone; the rounding
/// remainder becomes the cent deviation, so `cents` always lies in [-50, 50].
///
/// # Arguments
/// * `freq` - Input frequency in Hz
///
/// # Returns
/// * `Some(NoteInfo)` - Nearest note, its octave and the deviation in cents
/// * `None` - The frequency is zero, negative or not finite
pub fn frequency_to_note(freq: f32) -> Option<NoteInfo> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    let n = frequency_to_midi(freq);
    let nearest = n.round();
    let cents = ((n - nearest) * 100.0).round() as i32;
    let nearest = nearest as i32;

    Some(NoteInfo {
        note: PitchClass::from_index(nearest),
        octave: nearest.div_euclid(12) - 1,
        cents,
    })
}

/// Equal-tempered frequency of a named note.
///
/// # Arguments
/// * `note` - Note name (e.g. "A", "C#", "Bb")
/// * `octave` - Scientific pitch notation octave
///
/// # Returns
/// * Frequency in Hz, or `0.0` when the note name is not recognized
pub fn note_to_frequency(note: &str, octave: i32) -> f32 {
    match note.parse::<PitchClass>() {
        Ok(class) => pitch_class_frequency(class, octave),
        Err(_) => 0.0,
    }
}

/// Equal-tempered frequency of a pitch class in a given octave.
pub fn pitch_class_frequency(note: PitchClass, octave: i32) -> f32 {
    let note_number = (octave + 1) * 12 + note.index() as i32;
    midi_to_frequency(note_number as f64)
}

/// Absolute distance between two frequencies in semitones.
pub fn semitone_distance(a: f32, b: f32) -> f32 {
    (12.0 * (a / b).log2()).abs()
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values are flat.
pub fn cents_between(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
