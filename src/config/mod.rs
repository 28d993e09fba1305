//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use crate::level::{MAX_LEVEL, MIN_LEVEL};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_CAPTURE_SECONDS, DEFAULT_CHANNEL_CAPACITY, DEFAULT_IDLE_TIMEOUT_MS,
    DEFAULT_SAMPLE_RATE, DEFAULT_WINDOW_MS,
};

/// CLI options for the audiolevel meter.
#[derive(Debug, Parser, Clone)]
#[command(about = "Audiolevel - live PCM level meter", author, version)]
pub struct AppConfig {
    /// Raw 16-bit little-endian mono PCM to meter ("-" reads stdin)
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Sample rate of the input (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Duration of each submitted window (milliseconds)
    #[arg(long = "window-ms", default_value_t = DEFAULT_WINDOW_MS)]
    pub window_ms: u64,

    /// Encoding windows are submitted in
    #[arg(long, value_enum, default_value_t = RepresentationArg::Shorts)]
    pub representation: RepresentationArg,

    /// Stream key for the level cache (-1 disables the cache)
    #[arg(long = "stream-key", default_value_t = -1, allow_negative_numbers = true)]
    pub stream_key: i64,

    /// How long the level worker idles before exiting (milliseconds)
    #[arg(long = "idle-timeout-ms", default_value_t = DEFAULT_IDLE_TIMEOUT_MS)]
    pub idle_timeout_ms: u64,

    /// Lowest reported level
    #[arg(long = "min-level", default_value_t = MIN_LEVEL)]
    pub min_level: i32,

    /// Highest reported level
    #[arg(long = "max-level", default_value_t = MAX_LEVEL)]
    pub max_level: i32,

    /// Pace submissions at the input's real-time rate
    #[arg(long, default_value_t = false)]
    pub realtime: bool,

    /// Print levels and the summary as JSON lines
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Capacity of the channel between the level worker and the printer
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Meter the default (or --input-device) microphone instead of --input
    #[arg(long, default_value_t = false)]
    pub mic: bool,

    /// Microphone capture duration in seconds
    #[arg(long, default_value_t = DEFAULT_CAPTURE_SECONDS)]
    pub seconds: u64,

    /// Preferred audio input device name
    #[arg(long = "input-device")]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "AUDIOLEVEL_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "AUDIOLEVEL_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Enable per-window timing traces
    #[arg(long)]
    pub log_timings: bool,
}

/// Encodings accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RepresentationArg {
    Bytes,
    Shorts,
}

impl AppConfig {
    pub fn logging_enabled(&self) -> bool {
        (self.logs || self.log_timings) && !self.no_logs
    }

    /// Samples per submitted window at the configured rate.
    pub fn window_samples(&self) -> usize {
        ((u64::from(self.sample_rate) * self.window_ms) / 1000).max(1) as usize
    }
}
