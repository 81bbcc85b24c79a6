//! # Fast Fourier Transform (FFT) Module
//!
//! This module provides the magnitude spectrum used by the Pro estimator to
//! judge how well a candidate fundamental explains the harmonic content of a
//! frame.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once per analyzer
//! - Hann windowing for reduced spectral leakage
//! - Interpolated magnitude lookup at arbitrary frequencies
//! - Harmonic peak, energy and ratio measurements for a candidate F0

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Default FFT size for spectral scoring.
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Default number of harmonics inspected per candidate.
pub const DEFAULT_NUM_HARMONICS: usize = 6;

/// Applies a Hann window to the input buffer to reduce spectral leakage.
///
/// Uses the symmetric form `0.5 * (1 - cos(2πi / (N - 1)))`.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Reusable forward FFT for magnitude spectra.
///
/// The plan and the scratch buffers are allocated once, so repeated calls to
/// [`SpectralAnalyzer::analyze`] do not reallocate the transform.
pub struct SpectralAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    windowed: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

impl SpectralAnalyzer {
    /// Plans a forward FFT of `fft_size` points.
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self {
            fft_size,
            fft,
            windowed: vec![0.0; fft_size],
            buffer: vec![Complex { re: 0.0, im: 0.0 }; fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Computes the windowed magnitude spectrum of a frame.
    ///
    /// The first `min(frame.len(), fft_size)` samples are Hann-windowed over
    /// their own length and zero-padded up to the FFT size.
    ///
    /// # Arguments
    /// * `frame` - Time-domain samples
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Spectrum` - Magnitudes for bins `0..fft_size / 2`
    pub fn analyze(&mut self, frame: &[f32], sample_rate: u32) -> Spectrum {
        let used = frame.len().min(self.fft_size);

        self.windowed.iter_mut().for_each(|s| *s = 0.0);
        self.windowed[..used].copy_from_slice(&frame[..used]);
        apply_hann_window(&mut self.windowed[..used]);

        for (slot, &sample) in self.buffer.iter_mut().zip(self.windowed.iter()) {
            *slot = Complex { re: sample, im: 0.0 };
        }
        self.fft.process(&mut self.buffer);

        let magnitudes = self
            .buffer
            .iter()
            .take(self.fft_size / 2)
            .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
            .collect();

        Spectrum {
            magnitudes,
            fft_size: self.fft_size,
            sample_rate,
        }
    }
}

/// Magnitude spectrum of one frame, positive frequencies only.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    magnitudes: Vec<f32>,
    fft_size: usize,
    sample_rate: u32,
}

impl Spectrum {
    /// Builds a spectrum from precomputed magnitudes (bins `0..fft_size / 2`).
    pub fn from_magnitudes(magnitudes: Vec<f32>, fft_size: usize, sample_rate: u32) -> Self {
        Self {
            magnitudes,
            fft_size,
            sample_rate,
        }
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Width of one bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Largest bin magnitude in the frame.
    pub fn peak_magnitude(&self) -> f32 {
        self.magnitudes.iter().copied().fold(0.0, f32::max)
    }

    /// Fractional bin index of a frequency.
    fn bin_of(&self, freq: f32) -> f32 {
        freq * self.fft_size as f32 / self.sample_rate as f32
    }

    /// Magnitude at a fractional bin, linearly interpolated.
    fn magnitude_at_bin(&self, bin: f32) -> f32 {
        if !bin.is_finite() || bin < 0.0 {
            return 0.0;
        }
        let lower = bin.floor() as usize;
        let upper = bin.ceil() as usize;
        if upper >= self.magnitudes.len() {
            return 0.0;
        }
        let frac = bin - lower as f32;
        self.magnitudes[lower] * (1.0 - frac) + self.magnitudes[upper] * frac
    }

    /// Magnitude at an arbitrary frequency.
    ///
    /// Maps the frequency to a fractional bin and interpolates linearly
    /// between the neighbouring bins. Returns 0 outside the spectrum.
    pub fn magnitude_at_frequency(&self, freq: f32) -> f32 {
        self.magnitude_at_bin(self.bin_of(freq))
    }

    /// Peak magnitude near each harmonic `n * f0`, for `n` in `1..=num_harmonics`.
    ///
    /// Each harmonic is searched within ±1 bin of its exact position, which
    /// tolerates slight detuning and frame drift. Harmonics at or above the
    /// Nyquist frequency are skipped, so the result can be shorter than
    /// `num_harmonics`.
    ///
    /// # Returns
    /// * `Vec<(harmonic number, peak magnitude)>`
    pub fn harmonic_peaks(&self, f0: f32, num_harmonics: usize) -> Vec<(usize, f32)> {
        if !f0.is_finite() || f0 <= 0.0 {
            return Vec::new();
        }
        let nyquist = self.nyquist();
        (1..=num_harmonics)
            .filter_map(|n| {
                let freq = f0 * n as f32;
                if freq >= nyquist {
                    return None;
                }
                let center = self.bin_of(freq);
                let (lo, hi) = (center - 1.0, center + 1.0);

                // Exact point, both window edges, and every whole bin in between
                let mut peak = self
                    .magnitude_at_bin(center)
                    .max(self.magnitude_at_bin(lo))
                    .max(self.magnitude_at_bin(hi));
                let first = lo.max(0.0).ceil() as usize;
                let last = (hi.floor().max(0.0) as usize).min(self.magnitudes.len().saturating_sub(1));
                for bin in first..=last {
                    if let Some(&m) = self.magnitudes.get(bin) {
                        peak = peak.max(m);
                    }
                }
                Some((n, peak))
            })
            .collect()
    }

    /// Weighted harmonic energy: `Σ peak[n] / n` over the default harmonics.
    ///
    /// Lower harmonics count more, following the natural roll-off of a voiced
    /// harmonic series.
    pub fn harmonic_energy(&self, f0: f32) -> f32 {
        self.harmonic_peaks(f0, DEFAULT_NUM_HARMONICS)
            .iter()
            .map(|&(n, peak)| peak / n as f32)
            .sum()
    }

    /// Fraction of total spectral energy explained by the harmonics of `f0`.
    pub fn harmonic_ratio(&self, f0: f32) -> f32 {
        let total: f32 = self.magnitudes.iter().map(|m| m * m).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let harmonic: f32 = self
            .harmonic_peaks(f0, DEFAULT_NUM_HARMONICS)
            .iter()
            .map(|&(_, peak)| peak * peak)
            .sum();
        harmonic / total
    }
}
