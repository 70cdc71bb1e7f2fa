//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! The capture callback chunks incoming samples into fixed-size
//! [`AudioFrame`]s and streams them over a crossbeam channel to the single
//! consumer (the practice session's tick loop).
//!
//! ## Features
//! - Automatic input-device selection with mono f32 preference
//! - Fixed frame chunking via an accumulation buffer
//! - Scoped acquire/release: dropping an [`AudioCapture`] pauses and
//!   releases the stream, including on unwinds

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, info, warn};

/// Number of samples per analysis frame.
///
/// 2048 samples at 44.1 kHz is ~46 ms: enough lag depth for the YIN search
/// down to 30 Hz while keeping per-tick work well inside a tick period.
pub const BUFFER_SIZE: usize = 2048;

/// Target capture sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// One fixed-length window of captured audio.
///
/// Immutable once emitted; the processing tick that receives it is its only
/// owner.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Signed float samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// A running capture stream with its frame channel.
///
/// Exactly one `AudioCapture` exists per practice session. Dropping it
/// pauses the CPAL stream and closes the channel, so a new session can
/// acquire the device cleanly.
pub struct AudioCapture {
    stream: cpal::Stream,
    frames: Receiver<AudioFrame>,
    sample_rate: u32,
}

impl AudioCapture {
    /// Opens the default input device and starts streaming frames.
    ///
    /// Fails (rather than silently proceeding without audio) when no input
    /// device is available or no suitable f32 configuration exists;
    /// surfaced to the caller as a session-start failure.
    pub fn start() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        info!("Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let rate = SAMPLE_RATE.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
        let sample_rate = config.sample_rate().0;
        let config: cpal::StreamConfig = config.into();

        debug!("Selected sample rate: {} Hz", sample_rate);

        let err_fn = |err| warn!("Audio stream error: {err}");

        // Bounded so a stalled consumer drops frames instead of growing the
        // queue; detection gaps are already a normal condition downstream.
        let (sender, frames) = crossbeam_channel::bounded::<AudioFrame>(8);

        // Accumulates callback data until a full frame is available.
        let mut audio_buffer = Vec::with_capacity(BUFFER_SIZE * 2);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                audio_buffer.extend_from_slice(data);

                while audio_buffer.len() >= BUFFER_SIZE {
                    let frame =
                        AudioFrame::new(audio_buffer[..BUFFER_SIZE].to_vec(), sample_rate);
                    // Ignore send failures: channel full or consumer gone.
                    let _ = sender.try_send(frame);
                    audio_buffer.drain(..BUFFER_SIZE);
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;
        info!("Audio capture started");

        Ok(Self {
            stream,
            frames,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the most recent pending frame, discarding older ones.
    ///
    /// The tick loop only ever wants the freshest analysis window; backlog
    /// frames would just add latency.
    pub fn latest_frame(&self) -> Option<AudioFrame> {
        let mut latest = None;
        loop {
            match self.frames.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        latest
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Error pausing capture stream: {e}");
        }
        debug!("Audio capture released");
    }
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Prefers mono 32-bit float with the smallest distance to the target rate.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}
