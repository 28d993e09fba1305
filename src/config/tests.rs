use super::{AppConfig, RepresentationArg};
use crate::level::{LevelBounds, DEFAULT_IDLE_TIMEOUT};
use clap::Parser;
use std::time::Duration;

fn base_config() -> AppConfig {
    AppConfig::parse_from(["test-app", "--input", "-"])
}

fn parse(args: &[&str]) -> AppConfig {
    let mut argv = vec!["test-app", "--input", "-"];
    argv.extend_from_slice(args);
    AppConfig::parse_from(argv)
}

#[test]
fn defaults_validate() {
    let mut cfg = base_config();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.representation, RepresentationArg::Shorts);
    assert_eq!(cfg.cache_key(), None);
}

#[test]
fn default_window_is_160_samples() {
    let cfg = base_config();
    assert_eq!(cfg.window_samples(), 160);
}

#[test]
fn window_samples_follow_rate_and_duration() {
    let cfg = parse(&["--sample-rate", "48000", "--window-ms", "10"]);
    assert_eq!(cfg.window_samples(), 480);
}

#[test]
fn requires_an_input_source() {
    let mut cfg = AppConfig::parse_from(["test-app"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_sample_rate_out_of_bounds() {
    let mut cfg = parse(&["--sample-rate", "4000"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--sample-rate", "192001"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_sample_rate_bounds() {
    let mut cfg = parse(&["--sample-rate", "8000"]);
    assert!(cfg.validate().is_ok());

    let mut cfg = parse(&["--sample-rate", "192000"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_window_out_of_bounds() {
    let mut cfg = parse(&["--window-ms", "4"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--window-ms", "501"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_idle_timeout_out_of_bounds() {
    let mut cfg = parse(&["--idle-timeout-ms", "0"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--idle-timeout-ms", "600001"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_inverted_level_bounds() {
    let mut cfg = parse(&["--min-level", "50", "--max-level", "50"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--min-level", "60", "--max-level", "20"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_level_above_limit() {
    let mut cfg = parse(&["--max-level", "1001"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn stream_key_enables_cache() {
    let mut cfg = parse(&["--stream-key", "42"]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.cache_key(), Some(42));
}

#[test]
fn rejects_negative_stream_key_other_than_sentinel() {
    let mut cfg = parse(&["--stream-key", "-2"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--stream-key", "-1"]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.cache_key(), None);
}

#[test]
fn rejects_zero_channel_capacity() {
    let mut cfg = parse(&["--channel-capacity", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_mic_with_input() {
    let mut cfg = parse(&["--mic"]);
    assert!(cfg.validate().is_err());
}

#[cfg(not(feature = "mic"))]
#[test]
fn mic_requires_feature() {
    let mut cfg = AppConfig::parse_from(["test-app", "--mic"]);
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("'mic' feature"));
}

#[cfg(feature = "mic")]
#[test]
fn mic_alone_is_a_valid_source() {
    let mut cfg = AppConfig::parse_from(["test-app", "--mic", "--input-device", "  USB Mic  "]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.input_device.as_deref(), Some("USB Mic"));
}

#[test]
fn dispatcher_config_reflects_flags() {
    let cfg = parse(&["--idle-timeout-ms", "250", "--min-level", "10", "--max-level", "90"]);
    let dispatcher = cfg.dispatcher_config();
    assert_eq!(dispatcher.idle_timeout, Duration::from_millis(250));
    assert_eq!(dispatcher.bounds, LevelBounds::new(10, 90));
}

#[test]
fn default_dispatcher_config_matches_library_defaults() {
    let cfg = base_config();
    let dispatcher = cfg.dispatcher_config();
    assert_eq!(dispatcher.idle_timeout, DEFAULT_IDLE_TIMEOUT);
    assert_eq!(dispatcher.bounds, LevelBounds::default());
}

#[test]
fn logging_flags_combine() {
    let mut cfg = base_config();
    cfg.logs = false;
    cfg.log_timings = false;
    assert!(!cfg.logging_enabled());
    cfg.log_timings = true;
    assert!(cfg.logging_enabled());
    cfg.no_logs = true;
    assert!(!cfg.logging_enabled());
}
