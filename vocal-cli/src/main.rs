//! # vocal-cli - Singing pitch feedback on the command line
//!
//! Drives the `vocal-core` estimators from either a synthesized phrase or the
//! default microphone.
//!
//! ## Architecture
//! - **Main Thread**: owns the capture stream and both estimators
//! - **Stdin Thread**: waits for Enter and signals shutdown
//! - **Communication**: crossbeam channels for audio frames and shutdown

mod capture;
mod settings;
mod synth;

use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cpal::traits::StreamTrait;
use log::{info, warn};
use vocal_core::vibrato::DEFAULT_VIBRATO_WINDOW;
use vocal_core::{
    AudioFrame, BasicEstimator, Detection, DetectorConfig, PitchSample, ProEstimator,
    VoiceProfile, estimate_vibrato,
};

use crate::settings::SessionConfig;
use crate::synth::{PHRASE, VibratoShape};

/// Pitched samples kept for live vibrato measurement.
const LIVE_HISTORY: usize = 256;

#[derive(Parser)]
#[command(name = "vocal-cli", about = "Real-time singing pitch detection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both tiers side by side on a synthesized phrase
    Synth {
        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,
        /// Samples per analysis frame
        #[arg(long, default_value_t = capture::FRAME_SIZE)]
        frame: usize,
        /// Samples between frame starts
        #[arg(long, default_value_t = 1024)]
        hop: usize,
        #[command(flatten)]
        files: SettingsFiles,
    },
    /// Analyse the default input device until Enter is pressed
    Live {
        #[arg(long, value_enum, default_value_t = Tier::Pro)]
        tier: Tier,
        #[command(flatten)]
        files: SettingsFiles,
    },
}

#[derive(clap::Args)]
struct SettingsFiles {
    /// Voice profile JSON (min_f0, max_f0, comfortable_f0, sample_count)
    #[arg(long)]
    profile: Option<PathBuf>,
    /// Detector config JSON with optional "basic" and "pro" sections
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Tier {
    Basic,
    Pro,
}

/// One estimator of either tier behind a common per-frame call.
enum Estimator {
    Basic(BasicEstimator),
    Pro(ProEstimator),
}

impl Estimator {
    fn new(tier: Tier, config: &SessionConfig, profile: Option<VoiceProfile>) -> Result<Self> {
        Ok(match tier {
            Tier::Basic => Estimator::Basic(BasicEstimator::with_config(config.basic.clone())?),
            Tier::Pro => {
                let mut pro = ProEstimator::with_config(config.pro.clone())?;
                pro.set_profile(profile);
                Estimator::Pro(pro)
            }
        })
    }

    fn name(&self) -> &'static str {
        match self {
            Estimator::Basic(_) => "basic",
            Estimator::Pro(_) => "pro",
        }
    }

    fn config(&self) -> &DetectorConfig {
        match self {
            Estimator::Basic(e) => e.config(),
            Estimator::Pro(e) => e.config(),
        }
    }

    fn detect(&mut self, frame: &AudioFrame<'_>) -> Result<Option<PitchSample>> {
        let sample = match self {
            Estimator::Basic(e) => e.detect(frame)?.into_pitched(),
            Estimator::Pro(e) => match e.detect(frame)? {
                Detection::Pitched(estimate) => Some(estimate.sample),
                Detection::Unpitched(_) => None,
            },
        };
        Ok(sample)
    }

    fn reset_tracking(&mut self) {
        match self {
            Estimator::Basic(e) => e.reset_tracking(),
            Estimator::Pro(e) => e.reset_tracking(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Synth {
            sample_rate,
            frame,
            hop,
            files,
        } => run_synth(sample_rate, frame, hop, &files),
        Commands::Live { tier, files } => run_live(tier, &files),
    }
}

fn load_settings(files: &SettingsFiles) -> Result<(SessionConfig, Option<VoiceProfile>)> {
    let config = SessionConfig::load(files.config.as_deref())?;
    let profile = settings::load_profile(files.profile.as_deref())?;
    if let Some(p) = &profile {
        info!(
            "Voice profile {:.0}-{:.0} Hz (comfortable {:.0} Hz, {} samples)",
            p.min_f0, p.max_f0, p.comfortable_f0, p.sample_count
        );
    }
    Ok((config, profile))
}

fn format_sample(sample: Option<&PitchSample>) -> String {
    match sample {
        Some(s) => format!(
            "{:>8.2} Hz {:>3}{} {:+3}c",
            s.frequency,
            s.note.name(),
            s.octave,
            s.cents
        ),
        None => format!("{:>20}", "-"),
    }
}

fn run_synth(sample_rate: u32, frame: usize, hop: usize, files: &SettingsFiles) -> Result<()> {
    let (config, profile) = load_settings(files)?;
    anyhow::ensure!(hop > 0, "hop must be at least one sample");

    let mut estimators = [
        Estimator::new(Tier::Basic, &config, profile)?,
        Estimator::new(Tier::Pro, &config, profile)?,
    ];
    for e in &estimators {
        let required = e.config().required_frame_len(sample_rate)?;
        anyhow::ensure!(
            frame >= required,
            "{} tier needs frames of at least {required} samples at {sample_rate} Hz",
            e.name()
        );
    }

    let signal = synth::render(&PHRASE, VibratoShape::default(), sample_rate);
    info!(
        "Synthesized {:.2} s phrase at {sample_rate} Hz",
        signal.len() as f64 / sample_rate as f64
    );
    for e in estimators.iter_mut() {
        e.reset_tracking();
    }

    let mut histories: [Vec<PitchSample>; 2] = [Vec::new(), Vec::new()];
    println!("{:>8} {:>20} {:>20}", "time", "basic", "pro");
    for start in (0..signal.len().saturating_sub(frame - 1)).step_by(hop) {
        let timestamp = start as f64 / sample_rate as f64;
        let audio = AudioFrame::new(&signal[start..start + frame], sample_rate).at(timestamp);

        let mut row = Vec::with_capacity(2);
        for (e, history) in estimators.iter_mut().zip(histories.iter_mut()) {
            let sample = e.detect(&audio)?;
            row.push(format_sample(sample.as_ref()));
            history.extend(sample);
        }
        println!("{timestamp:>7.3}s {} {}", row[0], row[1]);
    }

    for (e, history) in estimators.iter().zip(&histories) {
        match estimate_vibrato(history, DEFAULT_VIBRATO_WINDOW) {
            Some(v) => println!(
                "{} vibrato: {:.1} Hz, {:.0} cents ({} pitched frames)",
                e.name(),
                v.rate_hz,
                v.extent_cents,
                history.len()
            ),
            None => println!("{} vibrato: not enough pitched frames", e.name()),
        }
    }
    Ok(())
}

fn run_live(tier: Tier, files: &SettingsFiles) -> Result<()> {
    let (config, profile) = load_settings(files)?;
    let mut estimator = Estimator::new(tier, &config, profile)?;

    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Vec<f32>>(8);
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

    let (stream, sample_rate) = capture::start_capture(frame_tx).context("starting audio capture")?;
    let required = estimator.config().required_frame_len(sample_rate)?;
    anyhow::ensure!(
        capture::FRAME_SIZE >= required,
        "{sample_rate} Hz capture needs frames of {required} samples"
    );

    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = shutdown_tx.send(());
    });

    info!("Listening with the {} tier, press Enter to stop", estimator.name());
    estimator.reset_tracking();

    let mut history: Vec<PitchSample> = Vec::new();
    let mut pitched = 0usize;
    let mut elapsed = 0.0;
    loop {
        crossbeam_channel::select! {
            recv(frame_rx) -> msg => match msg {
                Ok(samples) => {
                    let frame = AudioFrame::new(&samples, sample_rate).at(elapsed);
                    elapsed += samples.len() as f64 / sample_rate as f64;
                    let sample = estimator.detect(&frame)?;
                    if let Some(s) = sample {
                        pitched += 1;
                        history.push(s);
                        if history.len() > LIVE_HISTORY {
                            history.drain(..history.len() - LIVE_HISTORY);
                        }
                        let line = format!("{} ({:.0}%)", format_sample(Some(&s)), s.confidence * 100.0);
                        match estimate_vibrato(&history, DEFAULT_VIBRATO_WINDOW) {
                            Some(v) if v.extent_cents > 0.0 => {
                                println!("{line}  vibrato {:.1} Hz / {:.0}c", v.rate_hz, v.extent_cents)
                            }
                            _ => println!("{line}"),
                        }
                    }
                }
                Err(_) => {
                    warn!("Audio channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => break,
        }
    }

    if let Err(e) = stream.pause() {
        warn!("Error pausing stream: {e}");
    }
    estimator.reset_tracking();
    info!("Session finished, {pitched} pitched frames");
    Ok(())
}
