pub mod config;
pub mod level;
mod lock;
mod logging;
pub mod pcm;
pub mod telemetry;

pub(crate) use lock::lock_or_recover;
pub use level::{
    AudioLevelMap, ChannelListener, Level, LevelCache, LevelDispatcher, LevelListener,
    SampleWindow, SoundPressureLevel,
};
pub use logging::{crash_log_path, init_logging, log_debug, log_file_path, log_panic};
