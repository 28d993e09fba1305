use super::calculator::Level;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Receives every level a dispatcher computes.
///
/// Called on the dispatcher's worker thread, so implementations should return
/// quickly; a slow listener only delays its own stream.
pub trait LevelListener: Send + Sync {
    fn level_changed(&self, level: Level);
}

impl<F> LevelListener for F
where
    F: Fn(Level) + Send + Sync,
{
    fn level_changed(&self, level: Level) {
        self(level)
    }
}

/// Listener that forwards levels into a bounded channel without blocking.
///
/// When the receiver falls behind, levels are dropped and counted rather than
/// stalling the worker.
pub struct ChannelListener {
    sender: Sender<Level>,
    dropped: Arc<AtomicUsize>,
}

impl ChannelListener {
    /// Build a listener plus the receiving end of its channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Level>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (Self::new(sender), receiver)
    }

    pub fn new(sender: Sender<Level>) -> Self {
        Self {
            sender,
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Levels discarded because the channel was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shared handle to the drop counter, readable after the listener moves.
    pub fn dropped_counter(&self) -> Arc<AtomicUsize> {
        self.dropped.clone()
    }
}

impl LevelListener for ChannelListener {
    fn level_changed(&self, level: Level) {
        match self.sender.try_send(level) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
