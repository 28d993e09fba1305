//! Audio level metering for live PCM streams.
//!
//! [`LevelDispatcher`] takes sample windows from a latency-sensitive media
//! thread and computes levels on its own worker, delivering each result to a
//! [`LevelListener`] and/or a [`LevelCache`]. Bursts are coalesced: only the
//! newest window is measured.

mod cache;
mod calculator;
mod dispatch;
mod listener;
mod window;

pub use cache::{AudioLevelMap, LevelCache, StreamKey, INVALID_STREAM_KEY};
pub use calculator::{Level, LevelBounds, LevelCalculator, SoundPressureLevel, MAX_LEVEL, MIN_LEVEL};
pub use dispatch::{DispatchStats, DispatcherConfig, LevelDispatcher, DEFAULT_IDLE_TIMEOUT};
pub use listener::{ChannelListener, LevelListener};
pub use window::{PcmData, PcmSlice, Representation, SampleWindow};
