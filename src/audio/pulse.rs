//! Inaudible audio pulse emitted while claiming the media session.
//!
//! Some platforms only route media buttons to a process that is actually
//! rendering audio, so every claim ends with a short burst of silence.

use std::time::Duration;
use thiserror::Error;

pub const PULSE_SAMPLE_RATE: u32 = 44_100;
pub const PULSE_DURATION_MS: u64 = 100;

/// Extra time the stream stays open after the last sample
const PULSE_TAIL_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("No output device available")]
    NoOutputDevice,

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}

/// 16-bit mono silence
#[derive(Debug, Clone, PartialEq)]
pub struct SilentPulse {
    sample_rate: u32,
    samples: Vec<i16>,
}

impl Default for SilentPulse {
    fn default() -> Self {
        Self::new(PULSE_SAMPLE_RATE, Duration::from_millis(PULSE_DURATION_MS))
    }
}

impl SilentPulse {
    pub fn new(sample_rate: u32, duration: Duration) -> Self {
        let frames = (sample_rate as u128 * duration.as_millis() / 1000) as usize;
        Self {
            sample_rate,
            samples: vec![0; frames],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.samples.len() as u64 * 1_000_000 / self.sample_rate as u64)
    }

    /// How long a sink keeps the stream open for this pulse
    pub fn hold_time(&self) -> Duration {
        self.duration() + Duration::from_millis(PULSE_TAIL_MS)
    }
}

/// Output for the claim pulse. `play` blocks until the pulse has been rendered.
pub trait PulseSink: Send + Sync {
    fn name(&self) -> &str;

    fn play(&self, pulse: &SilentPulse) -> Result<(), PulseError>;
}

/// Sink for hosts without an audio device; only logs.
pub struct NullSink;

impl PulseSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn play(&self, pulse: &SilentPulse) -> Result<(), PulseError> {
        log::debug!(
            "Silent pulse skipped ({} samples @ {} Hz, no output device)",
            pulse.samples().len(),
            pulse.sample_rate()
        );
        Ok(())
    }
}

/// Renders the pulse on the default output device
#[cfg(feature = "audio-pulse")]
pub struct CpalSink;

#[cfg(feature = "audio-pulse")]
impl CpalSink {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "audio-pulse")]
impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "audio-pulse")]
impl PulseSink for CpalSink {
    fn name(&self) -> &str {
        "cpal"
    }

    fn play(&self, pulse: &SilentPulse) -> Result<(), PulseError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(PulseError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| PulseError::Stream(e.to_string()))?;

        log::debug!(
            "Playing silent pulse on output: sample_rate={}, channels={}",
            config.sample_rate().0,
            config.channels()
        );

        let err_fn = |err| log::warn!("Silent pulse stream error: {}", err);

        // Silence is the midpoint of each format's range
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.config(),
                move |data: &mut [f32], _: &_| data.fill(0.0),
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_output_stream(
                &config.config(),
                move |data: &mut [i16], _: &_| data.fill(0),
                err_fn,
                None,
            ),
            cpal::SampleFormat::U16 => device.build_output_stream(
                &config.config(),
                move |data: &mut [u16], _: &_| data.fill(u16::MAX / 2 + 1),
                err_fn,
                None,
            ),
            other => return Err(PulseError::UnsupportedFormat(format!("{:?}", other))),
        }
        .map_err(|e| PulseError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| PulseError::Stream(e.to_string()))?;
        std::thread::sleep(pulse.hold_time());
        drop(stream);

        Ok(())
    }
}
