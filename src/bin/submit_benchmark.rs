use std::f32::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use audiolevel::config::{DEFAULT_SAMPLE_RATE, DEFAULT_WINDOW_MS};
use audiolevel::level::{
    DispatcherConfig, Level, LevelDispatcher, SampleWindow, SoundPressureLevel,
};
use clap::Parser;

/// Synthetic benchmark for the producer side of level dispatch.
#[derive(Debug, Parser)]
#[command(about = "Measure LevelDispatcher::submit latency with a synthetic tone")]
struct Args {
    /// Human-friendly label recorded in the output metrics
    #[arg(long, default_value = "tone")]
    label: String,

    /// Number of windows to submit
    #[arg(long, default_value_t = 10_000)]
    windows: usize,

    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    #[arg(long = "window-ms", default_value_t = DEFAULT_WINDOW_MS)]
    window_ms: u64,

    /// Tone amplitude in [0, 1]
    #[arg(long, default_value_t = 0.4)]
    amplitude: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    validate(&args)?;
    let window_samples = (u64::from(args.sample_rate) * args.window_ms / 1000).max(1) as usize;
    let tone = synthesize_tone(window_samples, args.sample_rate, args.amplitude);

    let dispatcher = LevelDispatcher::with_config(
        "submit-benchmark",
        DispatcherConfig::default(),
        Arc::new(SoundPressureLevel),
    );
    dispatcher.set_listener(Some(Arc::new(|_level: Level| {})));

    let mut latencies = Vec::with_capacity(args.windows);
    for _ in 0..args.windows {
        let started = Instant::now();
        dispatcher.submit(SampleWindow::shorts(&tone));
        latencies.push(started.elapsed());
    }
    latencies.sort_unstable();
    let stats = dispatcher.stats();

    println!(
        "submit_metrics|label={}|windows={}|window_samples={}|p50_us={}|p99_us={}|max_us={}|coalesced={}|computed={}",
        args.label,
        args.windows,
        window_samples,
        percentile(&latencies, 50).as_micros(),
        percentile(&latencies, 99).as_micros(),
        latencies.last().copied().unwrap_or_default().as_micros(),
        stats.coalesced,
        stats.computed
    );

    Ok(())
}

fn validate(args: &Args) -> Result<()> {
    if args.windows == 0 {
        bail!("--windows must be at least 1");
    }
    if args.sample_rate == 0 || args.window_ms == 0 {
        bail!("--sample-rate and --window-ms must be positive");
    }
    if !(0.0..=1.0).contains(&args.amplitude) {
        bail!("--amplitude must be between 0 and 1, got {}", args.amplitude);
    }
    Ok(())
}

fn synthesize_tone(samples: usize, sample_rate: u32, amplitude: f32) -> Vec<i16> {
    (0..samples)
        .map(|n| {
            let t = n as f32 / sample_rate as f32;
            ((2.0 * PI * 440.0 * t).sin() * amplitude * i16::MAX as f32) as i16
        })
        .collect()
}

fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() - 1) * pct) / 100;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_picks_from_sorted_samples() {
        let samples: Vec<Duration> = (1..=100).map(Duration::from_micros).collect();
        assert_eq!(percentile(&samples, 50), Duration::from_micros(50));
        assert_eq!(percentile(&samples, 99), Duration::from_micros(99));
        assert_eq!(percentile(&[], 50), Duration::ZERO);
    }

    #[test]
    fn tone_respects_amplitude() {
        let tone = synthesize_tone(160, 8_000, 0.5);
        assert_eq!(tone.len(), 160);
        assert!(tone.iter().all(|s| s.unsigned_abs() <= (i16::MAX / 2) as u16 + 1));
    }

    #[test]
    fn zero_windows_rejected() {
        let args = Args::try_parse_from(["submit_benchmark", "--windows", "0"]).unwrap();
        assert!(validate(&args).is_err());
    }

    #[test]
    fn amplitude_out_of_range_rejected() {
        let args = Args::try_parse_from(["submit_benchmark", "--amplitude", "1.5"]).unwrap();
        assert!(validate(&args).is_err());
    }
}
