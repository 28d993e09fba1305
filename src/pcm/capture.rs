//! Microphone capture via CPAL.
//!
//! The device callback thread is the producer: it downmixes each buffer to
//! mono 16-bit PCM and submits windows straight to a [`LevelDispatcher`].

use super::downmix::WindowBatcher;
use crate::level::LevelDispatcher;
use crate::log_debug;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A running input stream feeding a dispatcher. Capture stops on drop.
pub struct MicCapture {
    stream: cpal::Stream,
    device_name: String,
    sample_rate: u32,
    batcher: Arc<Mutex<WindowBatcher>>,
    skipped: Arc<AtomicUsize>,
}

impl MicCapture {
    /// List microphone names so the CLI can expose a selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Open `preferred_device` (or the default input) and start submitting
    /// windows of `window` duration at the device's native rate.
    pub fn start(
        preferred_device: Option<&str>,
        dispatcher: Arc<LevelDispatcher>,
        window: Duration,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());

        let default_config = device.default_input_config()?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let sample_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));
        let frame_samples =
            ((u128::from(sample_rate) * window.as_millis()) / 1000).max(1) as usize;

        log_debug(&format!(
            "Mic capture config: device={device_name} format={format:?} sample_rate={sample_rate}Hz channels={channels} window={frame_samples} samples"
        ));

        let batcher = Arc::new(Mutex::new(WindowBatcher::new(frame_samples)));
        let skipped = Arc::new(AtomicUsize::new(0));
        let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));

        let stream = match format {
            SampleFormat::F32 => {
                let batcher = batcher.clone();
                let skipped = skipped.clone();
                let dispatcher = dispatcher.clone();
                device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| match batcher.try_lock() {
                        Ok(mut pump) => pump.push(&dispatcher, data, channels, |sample| sample),
                        Err(_) => {
                            skipped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let batcher = batcher.clone();
                let skipped = skipped.clone();
                let dispatcher = dispatcher.clone();
                device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| match batcher.try_lock() {
                        Ok(mut pump) => pump.push(&dispatcher, data, channels, |sample| {
                            sample as f32 / 32_768.0
                        }),
                        Err(_) => {
                            skipped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let batcher = batcher.clone();
                let skipped = skipped.clone();
                device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| match batcher.try_lock() {
                        Ok(mut pump) => pump.push(&dispatcher, data, channels, |sample| {
                            (sample as f32 - 32_768.0) / 32_768.0
                        }),
                        Err(_) => {
                            skipped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };

        stream.play()?;
        tracing::debug!(device = %device_name, sample_rate, channels, frame_samples, "mic capture started");

        Ok(Self {
            stream,
            device_name,
            sample_rate,
            batcher,
            skipped,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Windows submitted from the callback so far.
    pub fn windows_submitted(&self) -> usize {
        crate::lock_or_recover(&self.batcher, "mic batcher").submitted()
    }

    /// Callback buffers skipped because the batcher was busy.
    pub fn skipped_buffers(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Pause the stream and release the device.
    pub fn stop(self) {
        if let Err(err) = self.stream.pause() {
            log_debug(&format!("failed to pause audio stream: {err}"));
        }
    }
}
