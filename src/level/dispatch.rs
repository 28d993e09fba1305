//! Off-thread level metering for a live PCM stream.
//!
//! The media thread calls [`LevelDispatcher::submit`] with every new window.
//! Submission copies the window into a reusable per-encoding slot and wakes a
//! dedicated worker; the worker computes the level and hands it to the
//! registered listener and cache. Nothing here ever waits on the worker.
//!
//! The slots hold one window each, so a burst of submissions collapses into
//! the newest window. The worker is started lazily, exits after an idle
//! period, and is restarted by the next submission or registration. If it is
//! about to exit while a window is still pending it restarts itself under the
//! same lock that marks it gone, so a wake-up can never be lost.

use super::cache::{LevelCache, StreamKey, INVALID_STREAM_KEY};
use super::calculator::{Level, LevelBounds, LevelCalculator, SoundPressureLevel};
use super::listener::LevelListener;
use super::window::{PcmData, PcmSlice, PendingSlot, SampleWindow};
use crate::{lock_or_recover, log_debug};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// How long an idle worker waits for data before exiting.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for a [`LevelDispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub idle_timeout: Duration,
    pub bounds: LevelBounds,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            bounds: LevelBounds::default(),
        }
    }
}

/// Snapshot of dispatcher activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Windows accepted by `submit`.
    pub submitted: u64,
    /// Accepted windows that replaced one the worker had not drained yet.
    pub coalesced: u64,
    /// Levels computed by workers.
    pub computed: u64,
    pub listener_faults: u64,
    pub cache_faults: u64,
    pub workers_spawned: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    coalesced: AtomicU64,
    computed: AtomicU64,
    listener_faults: AtomicU64,
    cache_faults: AtomicU64,
    workers_spawned: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            computed: self.computed.load(Ordering::Relaxed),
            listener_faults: self.listener_faults.load(Ordering::Relaxed),
            cache_faults: self.cache_faults.load(Ordering::Relaxed),
            workers_spawned: self.workers_spawned.load(Ordering::Relaxed),
        }
    }
}

/// Everything guarded by the dispatcher lock.
struct DispatchState {
    bytes: PendingSlot<u8>,
    shorts: PendingSlot<i16>,
    listener: Option<Arc<dyn LevelListener>>,
    cache: Option<Arc<dyn LevelCache>>,
    stream_key: StreamKey,
    /// Generation of the running worker. Cleared only by that worker.
    worker: Option<u64>,
    next_generation: u64,
    closed: bool,
}

impl DispatchState {
    fn new() -> Self {
        Self {
            bytes: PendingSlot::default(),
            shorts: PendingSlot::default(),
            listener: None,
            cache: None,
            stream_key: INVALID_STREAM_KEY,
            worker: None,
            next_generation: 0,
            closed: false,
        }
    }

    fn active_cache(&self) -> Option<(Arc<dyn LevelCache>, StreamKey)> {
        match &self.cache {
            Some(cache) if self.stream_key != INVALID_STREAM_KEY => {
                Some((cache.clone(), self.stream_key))
            }
            _ => None,
        }
    }

    fn has_consumer(&self) -> bool {
        self.listener.is_some() || self.active_cache().is_some()
    }

    fn has_pending(&self) -> bool {
        self.shorts.is_pending() || self.bytes.is_pending()
    }

    fn clear_pending(&mut self) {
        self.bytes.clear();
        self.shorts.clear();
    }

    /// Claim the pending window along with the consumers it is meant for.
    fn take_job(&mut self) -> Option<Job> {
        let window = if let Some((buffer, len)) = self.shorts.take() {
            Window::Shorts(buffer, len)
        } else if let Some((buffer, len)) = self.bytes.take() {
            Window::Bytes(buffer, len)
        } else {
            return None;
        };
        self.clear_pending();
        Some(Job {
            window,
            listener: self.listener.clone(),
            cache: self.active_cache(),
        })
    }
}

enum Window {
    Bytes(Vec<u8>, usize),
    Shorts(Vec<i16>, usize),
}

impl Window {
    fn as_slice(&self) -> PcmSlice<'_> {
        match self {
            Window::Bytes(buffer, len) => PcmSlice::Bytes(&buffer[..*len]),
            Window::Shorts(buffer, len) => PcmSlice::Shorts(&buffer[..*len]),
        }
    }
}

struct Job {
    window: Window,
    listener: Option<Arc<dyn LevelListener>>,
    cache: Option<(Arc<dyn LevelCache>, StreamKey)>,
}

struct Shared {
    name: String,
    config: DispatcherConfig,
    calculator: Arc<dyn LevelCalculator>,
    state: Mutex<DispatchState>,
    wake: Condvar,
    /// Seed for the next calculation. Only workers write it.
    last_level: AtomicI32,
    counters: Counters,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        lock_or_recover(&self.state, "level dispatcher state")
    }

    /// Start a worker if none is running, otherwise wake the running one.
    fn ensure_worker(self: &Arc<Self>, state: &mut DispatchState) {
        if state.closed {
            return;
        }
        if state.worker.is_some() {
            self.wake.notify_all();
            return;
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || shared.run_worker(generation));
        match spawned {
            Ok(_) => {
                state.worker = Some(generation);
                Counters::bump(&self.counters.workers_spawned);
                tracing::debug!(dispatcher = %self.name, generation, "level worker started");
            }
            Err(err) => {
                log_debug(&format!("{}: failed to spawn level worker: {err}", self.name));
            }
        }
    }

    /// React to a listener or cache registration change.
    ///
    /// Only a worker clears its own handle. Without consumers the running
    /// worker is woken and retires at its next loop turn; until then a new
    /// registration reuses it instead of spawning a second one.
    fn consumers_changed(self: &Arc<Self>, state: &mut DispatchState) {
        if !state.has_consumer() {
            self.wake.notify_all();
        } else if state.has_pending() {
            self.ensure_worker(state);
        }
    }

    fn run_worker(self: Arc<Self>, generation: u64) {
        let _exit = WorkerExit {
            shared: &self,
            generation,
        };
        let mut idle_since: Option<Instant> = None;

        loop {
            let job = {
                let mut state = self.lock();
                loop {
                    let retired = state.closed || state.worker != Some(generation);
                    if retired || !state.has_consumer() {
                        return;
                    }
                    if let Some(job) = state.take_job() {
                        break job;
                    }

                    let now = Instant::now();
                    let idle = now.duration_since(*idle_since.get_or_insert(now));
                    if idle >= self.config.idle_timeout {
                        tracing::debug!(dispatcher = %self.name, generation, "level worker idle");
                        return;
                    }
                    let (guard, _) = self
                        .wake
                        .wait_timeout(state, self.config.idle_timeout - idle)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    state = guard;
                }
            };
            idle_since = None;
            self.process(job);
        }
    }

    fn process(&self, job: Job) {
        let previous = self.last_level.load(Ordering::Relaxed);
        let samples = job.window.as_slice();
        let level = self
            .calculator
            .calculate(samples, self.config.bounds, previous);
        Counters::bump(&self.counters.computed);
        tracing::trace!(
            dispatcher = %self.name,
            level,
            previous,
            samples = samples.sample_count(),
            "level computed"
        );

        {
            let mut state = self.lock();
            match job.window {
                Window::Bytes(buffer, _) => state.bytes.give_back(buffer),
                Window::Shorts(buffer, _) => state.shorts.give_back(buffer),
            }
        }

        self.deliver(level, job.listener.as_deref(), job.cache);
        self.last_level.store(level, Ordering::Relaxed);
    }

    /// Hand `level` to the cache, then the listener. A panic in either is
    /// contained so the worker keeps serving the stream.
    fn deliver(
        &self,
        level: Level,
        listener: Option<&dyn LevelListener>,
        cache: Option<(Arc<dyn LevelCache>, StreamKey)>,
    ) {
        if let Some((cache, key)) = cache {
            let result = panic::catch_unwind(AssertUnwindSafe(|| cache.put_level(key, level)));
            if result.is_err() {
                Counters::bump(&self.counters.cache_faults);
                log_debug(&format!(
                    "{}: level cache panicked storing key {key}",
                    self.name
                ));
            }
        }
        if let Some(listener) = listener {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.level_changed(level)));
            if result.is_err() {
                Counters::bump(&self.counters.listener_faults);
                log_debug(&format!("{}: level listener panicked", self.name));
            }
        }
    }
}

/// Runs when a worker leaves its loop, including by unwinding.
struct WorkerExit<'a> {
    shared: &'a Arc<Shared>,
    generation: u64,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        let shared = self.shared;
        let mut state = shared.lock();
        if state.worker == Some(self.generation) {
            state.worker = None;
        }
        tracing::debug!(
            dispatcher = %shared.name,
            generation = self.generation,
            "level worker exited"
        );
        let restart = !state.closed && state.has_consumer() && state.has_pending();
        if state.worker.is_none() && restart {
            log_debug(&format!(
                "{}: level worker exiting with pending data; restarting",
                shared.name
            ));
            shared.ensure_worker(&mut state);
        }
    }
}

fn same_target<T: ?Sized>(current: &Option<Arc<T>>, next: &Option<Arc<T>>) -> bool {
    match (current, next) {
        (None, None) => true,
        (Some(current), Some(next)) => {
            Arc::as_ptr(current) as *const () == Arc::as_ptr(next) as *const ()
        }
        _ => false,
    }
}

/// Computes audio levels for one stream on a dedicated background thread.
///
/// Dropping the dispatcher stops its worker; a computation already in flight
/// still completes and is delivered.
pub struct LevelDispatcher {
    shared: Arc<Shared>,
}

impl LevelDispatcher {
    /// Dispatcher with default bounds, idle timeout, and the SPL calculator.
    /// `name` labels the worker thread.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, DispatcherConfig::default(), Arc::new(SoundPressureLevel))
    }

    pub fn with_config(
        name: impl Into<String>,
        mut config: DispatcherConfig,
        calculator: Arc<dyn LevelCalculator>,
    ) -> Self {
        // Thread names may not contain NUL.
        let name = name.into().replace('\0', "");
        config.bounds = LevelBounds::new(config.bounds.min, config.bounds.max);
        Self {
            shared: Arc::new(Shared {
                name,
                config,
                calculator,
                state: Mutex::new(DispatchState::new()),
                wake: Condvar::new(),
                last_level: AtomicI32::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> DispatcherConfig {
        self.shared.config
    }

    /// Queue a window for measurement, replacing any window not yet drained.
    ///
    /// Returns immediately. Without a listener or an active cache the window
    /// is ignored without being copied. Empty, out-of-range, or float windows
    /// clear whatever was pending.
    pub fn submit(&self, window: SampleWindow<'_>) {
        let shared = &self.shared;
        let mut state = shared.lock();
        if !state.has_consumer() {
            return;
        }
        if window.length == 0 {
            state.clear_pending();
            return;
        }
        if !window.in_bounds() {
            state.clear_pending();
            log_debug(&format!(
                "{}: rejected window offset={} length={} beyond {} samples",
                shared.name,
                window.offset,
                window.length,
                window.data.len()
            ));
            return;
        }

        // Either slot counts: a byte window replaced by a short one is coalesced too.
        let superseded = state.has_pending();
        let range = window.offset..window.offset + window.length;
        match window.data {
            PcmData::Bytes(data) => {
                state.shorts.clear();
                state.bytes.fill(&data[range]);
            }
            PcmData::Shorts(data) => {
                state.bytes.clear();
                state.shorts.fill(&data[range]);
            }
            PcmData::Floats(_) => {
                state.clear_pending();
                return;
            }
        }

        Counters::bump(&shared.counters.submitted);
        if superseded {
            Counters::bump(&shared.counters.coalesced);
        }
        shared.ensure_worker(&mut state);
    }

    /// Register or clear the listener.
    pub fn set_listener(&self, listener: Option<Arc<dyn LevelListener>>) {
        let mut state = self.shared.lock();
        if same_target(&state.listener, &listener) {
            return;
        }
        let previous = std::mem::replace(&mut state.listener, listener);
        self.shared.consumers_changed(&mut state);
        drop(state);
        drop(previous);
    }

    /// Register or clear the cache. A cache with [`INVALID_STREAM_KEY`] is
    /// treated as no cache.
    pub fn set_level_cache(&self, cache: Option<Arc<dyn LevelCache>>, key: StreamKey) {
        let mut state = self.shared.lock();
        if same_target(&state.cache, &cache) && state.stream_key == key {
            return;
        }
        let previous = std::mem::replace(&mut state.cache, cache);
        state.stream_key = key;
        self.shared.consumers_changed(&mut state);
        drop(state);
        drop(previous);
    }

    /// Whether a worker thread is currently expected to be running.
    pub fn worker_active(&self) -> bool {
        self.shared.lock().worker.is_some()
    }

    /// Level produced by the most recent computation (0 before the first).
    pub fn last_level(&self) -> Level {
        self.shared.last_level.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> DispatchStats {
        self.shared.counters.snapshot()
    }

    /// Pending lengths as (bytes, shorts).
    #[cfg(test)]
    pub(crate) fn pending_lengths(&self) -> (usize, usize) {
        let state = self.shared.lock();
        (state.bytes.len, state.shorts.len)
    }

    /// Slot capacities as (bytes, shorts).
    #[cfg(test)]
    pub(crate) fn pending_capacities(&self) -> (usize, usize) {
        let state = self.shared.lock();
        (state.bytes.capacity(), state.shorts.capacity())
    }

    /// Lengths of the buffers currently held by the slots as (bytes, shorts);
    /// `None` while a buffer is lent to the worker.
    #[cfg(test)]
    pub(crate) fn slot_buffer_lens(&self) -> (Option<usize>, Option<usize>) {
        let state = self.shared.lock();
        (
            state.bytes.buffer.as_ref().map(Vec::len),
            state.shorts.buffer.as_ref().map(Vec::len),
        )
    }
}

impl Drop for LevelDispatcher {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.closed = true;
        self.shared.wake.notify_all();
    }
}
