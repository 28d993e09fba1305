pub const DEFAULT_SAMPLE_RATE: u32 = 8_000;
pub const DEFAULT_WINDOW_MS: u64 = 20;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_CAPTURE_SECONDS: u64 = 10;

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 192_000;
pub(super) const MIN_WINDOW_MS: u64 = 5;
pub(super) const MAX_WINDOW_MS: u64 = 500;
pub(super) const MIN_IDLE_TIMEOUT_MS: u64 = 10;
pub(super) const MAX_IDLE_TIMEOUT_MS: u64 = 600_000;
pub(super) const MAX_LEVEL_LIMIT: i32 = 1_000;
pub(super) const MAX_CHANNEL_CAPACITY: usize = 4_096;
pub(super) const MAX_CAPTURE_SECONDS: u64 = 3_600;
