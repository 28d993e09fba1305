//! Audiolevel entrypoint: meters raw PCM from a file, stdin, or a microphone.
//!
//! The main thread plays the media producer and submits windows to a
//! [`LevelDispatcher`]; its worker pushes levels into a bounded channel that a
//! printer thread drains to stdout.

mod report;

use anyhow::{anyhow, Context, Result};
use audiolevel::config::{AppConfig, RepresentationArg};
use audiolevel::pcm::{decode_s16le, WindowReader};
use audiolevel::telemetry::init_tracing;
use audiolevel::{
    init_logging, log_debug, log_file_path, log_panic, AudioLevelMap, ChannelListener, Level,
    LevelDispatcher, SampleWindow, SoundPressureLevel,
};
use crossbeam_channel::Receiver;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::panic;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::report::{ReportEvent, RunSummary};

/// Upper bound on waiting for the worker to drain the last window.
const FINAL_DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);
const DRAIN_POLL: Duration = Duration::from_millis(2);

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);
    install_panic_hook();
    log_debug("=== Audiolevel Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    #[cfg(feature = "mic")]
    if config.list_input_devices {
        return list_input_devices();
    }

    let dispatcher = Arc::new(LevelDispatcher::with_config(
        format!("audiolevel-{}", config.stream_key),
        config.dispatcher_config(),
        Arc::new(SoundPressureLevel),
    ));
    let (listener, levels) = ChannelListener::bounded(config.channel_capacity);
    let dropped = listener.dropped_counter();
    dispatcher.set_listener(Some(Arc::new(listener)));
    let cache = config.cache_key().map(|key| {
        let map = Arc::new(AudioLevelMap::new());
        dispatcher.set_level_cache(Some(map.clone()), key);
        (map, key)
    });

    let printer = spawn_printer(levels, config.json)?;

    let fed = if config.mic {
        run_mic(&config, &dispatcher)
    } else {
        feed_input(&config, &dispatcher)
    };

    if !wait_for_drain(&dispatcher, FINAL_DELIVERY_TIMEOUT) {
        log_debug("final level not drained before timeout");
    }
    // Closes the level channel once any in-flight delivery lands.
    dispatcher.set_listener(None);
    let stats = dispatcher.stats();
    let cached_level = cache.and_then(|(map, key)| map.level(key));
    drop(dispatcher);

    let delivered = printer
        .join()
        .map_err(|_| anyhow!("level printer thread panicked"))?;
    fed?;

    let summary = RunSummary::new(
        stats,
        delivered,
        dropped.load(Ordering::Relaxed) as u64,
        cached_level,
    );
    tracing::info!(
        windows_submitted = summary.windows_submitted,
        levels_delivered = summary.levels_delivered,
        coalesced = summary.coalesced,
        dropped = summary.dropped,
        workers_spawned = summary.workers_spawned,
        "audiolevel run complete"
    );
    println!("{}", ReportEvent::Summary(summary).render(config.json));
    log_debug("=== Audiolevel Finished ===");
    Ok(())
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        log_panic(info);
        previous(info);
    }));
}

/// Drain delivered levels to stdout until every sender is gone.
fn spawn_printer(levels: Receiver<Level>, json: bool) -> Result<JoinHandle<u64>> {
    thread::Builder::new()
        .name("audiolevel-printer".to_string())
        .spawn(move || {
            let stdout = io::stdout();
            let mut seq = 0u64;
            let mut stdout_open = true;
            for level in levels.iter() {
                // A closed pipe stops output but the channel is still drained.
                if stdout_open {
                    let line = ReportEvent::Level { seq, level }.render(json);
                    stdout_open = writeln!(stdout.lock(), "{line}").is_ok();
                }
                seq += 1;
            }
            seq
        })
        .context("failed to spawn level printer thread")
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

/// Submit every window of the input, optionally paced at the audio rate.
fn feed_input(config: &AppConfig, dispatcher: &LevelDispatcher) -> Result<()> {
    let path = config
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("no --input given"))?;
    let window_samples = config.window_samples();
    let mut reader = WindowReader::new(BufReader::new(open_input(path)?), window_samples);
    let mut shorts = Vec::with_capacity(window_samples);
    let started = Instant::now();
    let mut fed_samples = 0u64;

    while let Some(bytes) = reader.next_window().context("failed to read PCM input")? {
        fed_samples += (bytes.len() / 2) as u64;
        match config.representation {
            RepresentationArg::Bytes => dispatcher.submit(SampleWindow::bytes(bytes)),
            RepresentationArg::Shorts => {
                decode_s16le(bytes, &mut shorts);
                dispatcher.submit(SampleWindow::shorts(&shorts));
            }
        }
        if config.realtime {
            let due = Duration::from_secs_f64(fed_samples as f64 / f64::from(config.sample_rate));
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                thread::sleep(wait);
            }
        }
    }
    log_debug(&format!(
        "input exhausted after {fed_samples} samples from {}",
        path.display()
    ));
    Ok(())
}

fn wait_for_drain(dispatcher: &LevelDispatcher, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let stats = dispatcher.stats();
        if stats.computed + stats.coalesced >= stats.submitted {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(DRAIN_POLL);
    }
}

#[cfg(feature = "mic")]
fn run_mic(config: &AppConfig, dispatcher: &Arc<LevelDispatcher>) -> Result<()> {
    use audiolevel::pcm::MicCapture;

    let capture = MicCapture::start(
        config.input_device.as_deref(),
        Arc::clone(dispatcher),
        Duration::from_millis(config.window_ms),
    )?;
    log_debug(&format!(
        "metering '{}' at {} Hz for {}s",
        capture.device_name(),
        capture.sample_rate(),
        config.seconds
    ));
    thread::sleep(Duration::from_secs(config.seconds));
    log_debug(&format!(
        "mic capture finished: windows={} skipped_buffers={}",
        capture.windows_submitted(),
        capture.skipped_buffers()
    ));
    capture.stop();
    Ok(())
}

#[cfg(not(feature = "mic"))]
fn run_mic(_config: &AppConfig, _dispatcher: &Arc<LevelDispatcher>) -> Result<()> {
    Err(anyhow!("microphone capture requires the 'mic' feature"))
}

#[cfg(feature = "mic")]
fn list_input_devices() -> Result<()> {
    // AUDIOLEVEL_TEST_DEVICES stands in for real hardware in tests.
    let devices = if let Ok(raw) = std::env::var("AUDIOLEVEL_TEST_DEVICES") {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    } else {
        audiolevel::pcm::MicCapture::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}
