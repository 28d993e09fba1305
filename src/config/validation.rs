use super::defaults::{
    MAX_CAPTURE_SECONDS, MAX_CHANNEL_CAPACITY, MAX_IDLE_TIMEOUT_MS, MAX_LEVEL_LIMIT,
    MAX_SAMPLE_RATE, MAX_WINDOW_MS, MIN_IDLE_TIMEOUT_MS, MIN_SAMPLE_RATE, MIN_WINDOW_MS,
};
use super::AppConfig;
use crate::level::{DispatcherConfig, LevelBounds, StreamKey, INVALID_STREAM_KEY};
use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the device name.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {}",
                self.sample_rate
            );
        }
        if !(MIN_WINDOW_MS..=MAX_WINDOW_MS).contains(&self.window_ms) {
            bail!(
                "--window-ms must be between {MIN_WINDOW_MS} and {MAX_WINDOW_MS}, got {}",
                self.window_ms
            );
        }
        if !(MIN_IDLE_TIMEOUT_MS..=MAX_IDLE_TIMEOUT_MS).contains(&self.idle_timeout_ms) {
            bail!(
                "--idle-timeout-ms must be between {MIN_IDLE_TIMEOUT_MS} and {MAX_IDLE_TIMEOUT_MS}, got {}",
                self.idle_timeout_ms
            );
        }
        if self.stream_key < INVALID_STREAM_KEY {
            bail!(
                "--stream-key must be {INVALID_STREAM_KEY} (disabled) or non-negative, got {}",
                self.stream_key
            );
        }
        for (flag, value) in [("--min-level", self.min_level), ("--max-level", self.max_level)] {
            if !(0..=MAX_LEVEL_LIMIT).contains(&value) {
                bail!("{flag} must be between 0 and {MAX_LEVEL_LIMIT}, got {value}");
            }
        }
        if self.min_level >= self.max_level {
            bail!(
                "--min-level ({}) must be below --max-level ({})",
                self.min_level,
                self.max_level
            );
        }
        if !(1..=MAX_CHANNEL_CAPACITY).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between 1 and {MAX_CHANNEL_CAPACITY}, got {}",
                self.channel_capacity
            );
        }
        if !(1..=MAX_CAPTURE_SECONDS).contains(&self.seconds) {
            bail!(
                "--seconds must be between 1 and {MAX_CAPTURE_SECONDS}, got {}",
                self.seconds
            );
        }

        #[cfg(not(feature = "mic"))]
        if self.mic || self.list_input_devices {
            bail!("--mic and --list-input-devices require building with the 'mic' feature");
        }

        if self.mic && self.input.is_some() {
            bail!("--mic and --input are mutually exclusive");
        }
        if !self.mic && !self.list_input_devices && self.input.is_none() {
            bail!("one of --input or --mic is required");
        }

        if let Some(device) = &mut self.input_device {
            let trimmed = device.trim().to_string();
            if trimmed.is_empty() || trimmed.len() > 256 || trimmed.chars().any(char::is_control) {
                bail!("--input-device must be 1-256 printable characters");
            }
            *device = trimmed;
        }

        Ok(())
    }

    /// Cache key to register, or `None` when the cache is disabled.
    pub fn cache_key(&self) -> Option<StreamKey> {
        (self.stream_key != INVALID_STREAM_KEY).then_some(self.stream_key)
    }

    /// Snapshot the CLI-controlled dispatcher settings.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            bounds: LevelBounds::new(self.min_level, self.max_level),
        }
    }
}
