//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! Interleaved input of any channel count is down-mixed to mono and cut into
//! fixed-size frames that are handed to the analysis loop over a channel.

use anyhow::{Context, Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use log::{info, warn};

/// Samples per analysis frame.
pub const FRAME_SIZE: usize = 2048;

/// Preferred capture rate; the device's nearest supported rate is used otherwise.
pub const TARGET_SAMPLE_RATE: u32 = 48000;

/// Starts capture from the default input device.
///
/// # Arguments
/// * `sender` - Channel for mono frames of [`FRAME_SIZE`] samples
///
/// # Returns
/// * `Ok((stream, sample_rate))` - The running stream (keep it alive) and its rate
/// * `Err(e)` - No device or no usable f32 input format
pub fn start_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!(
        "Using audio input device: {}",
        device.name().unwrap_or_else(|_| "<unnamed>".to_string())
    );

    let configs = device
        .supported_input_configs()
        .context("querying input formats")?
        .collect::<Vec<_>>();
    let supported = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = clamp_rate(&supported, TARGET_SAMPLE_RATE);
    let config = supported.with_sample_rate(cpal::SampleRate(rate));
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    info!("Selected sample rate: {rate} Hz, {channels} channel(s)");

    let mut framer = Framer::new(channels, FRAME_SIZE);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for frame in framer.push(data) {
                    // Drop frames rather than block the audio callback
                    let _ = sender.try_send(frame);
                }
            },
            |err| warn!("An error occurred on the audio stream: {err}"),
            None,
        )
        .context("building input stream")?;

    stream.play().context("starting input stream")?;

    Ok((stream, rate))
}

/// Picks the f32 configuration whose rate range lies closest to the target,
/// preferring mono when several are equally close.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let distance = target_rate.abs_diff(clamp_rate(c, target_rate));
            (distance, c.channels())
        })
}

fn clamp_rate(config: &SupportedStreamConfigRange, target_rate: u32) -> u32 {
    target_rate.clamp(config.min_sample_rate().0, config.max_sample_rate().0)
}

/// Turns interleaved callback buffers into mono frames of a fixed length.
#[derive(Debug)]
pub struct Framer {
    channels: usize,
    frame_size: usize,
    buffer: Vec<f32>,
}

impl Framer {
    pub fn new(channels: usize, frame_size: usize) -> Self {
        Self {
            channels: channels.max(1),
            frame_size,
            buffer: Vec::with_capacity(frame_size * 2),
        }
    }

    /// Appends interleaved samples and returns every completed mono frame.
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<Vec<f32>> {
        let channels = self.channels;
        self.buffer.extend(
            interleaved
                .chunks_exact(channels)
                .map(|c| c.iter().sum::<f32>() / channels as f32),
        );

        let mut frames = Vec::new();
        while self.buffer.len() >= self.frame_size {
            frames.push(self.buffer.drain(..self.frame_size).collect());
        }
        frames
    }
}
