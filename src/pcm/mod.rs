//! PCM sources that feed a [`LevelDispatcher`](crate::level::LevelDispatcher).

#[cfg(feature = "mic")]
mod capture;
mod downmix;
mod reader;

#[cfg(feature = "mic")]
pub use capture::MicCapture;
pub use downmix::{append_downmixed_samples, f32_to_i16, WindowBatcher};
pub use reader::{decode_s16le, WindowReader};
