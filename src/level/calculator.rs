//! Level calculation over a drained sample window.
//!
//! The dispatcher treats the calculator as a pure function: same window,
//! bounds, and previous level in, same level out.

use super::window::PcmSlice;

/// Level reported to listeners and caches.
pub type Level = i32;

/// Lowest level delivered by the default bounds.
pub const MIN_LEVEL: Level = 0;

/// Highest level delivered by the default bounds.
pub const MAX_LEVEL: Level = 127;

/// Sound pressure reference (20 µPa) full-scale samples are measured against.
const REFERENCE_PRESSURE: f64 = 2e-5;

/// Fraction of the level range a meter may fall in one window.
const DECAY_DIVISOR: Level = 8;

/// Inclusive range every computed level is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelBounds {
    pub min: Level,
    pub max: Level,
}

impl LevelBounds {
    pub fn new(min: Level, max: Level) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn clamp(&self, level: Level) -> Level {
        level.clamp(self.min, self.max)
    }

    /// Largest drop allowed between consecutive windows.
    pub fn max_fall(&self) -> Level {
        ((self.max - self.min) / DECAY_DIVISOR).max(1)
    }
}

impl Default for LevelBounds {
    fn default() -> Self {
        Self::new(MIN_LEVEL, MAX_LEVEL)
    }
}

/// Turns a window of samples into a level.
///
/// `previous` is the level computed for the prior window of the same
/// dispatcher and seeds any smoothing. Implementations must not panic and
/// must return a value inside `bounds`.
pub trait LevelCalculator: Send + Sync {
    fn calculate(&self, samples: PcmSlice<'_>, bounds: LevelBounds, previous: Level) -> Level;
}

/// RMS sound pressure level in dB SPL, clamped to the bounds.
///
/// Rises follow the signal immediately; falls are limited to
/// [`LevelBounds::max_fall`] per window so meters decay instead of flickering.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoundPressureLevel;

impl SoundPressureLevel {
    /// Unsmoothed level of `samples`. Silence maps to `bounds.min`.
    pub fn instantaneous(samples: PcmSlice<'_>, bounds: LevelBounds) -> Level {
        let count = samples.sample_count();
        if count == 0 {
            return bounds.min;
        }
        let mut energy = 0.0f64;
        samples.for_each_sample(|sample| {
            let normalized = f64::from(sample) / f64::from(i16::MAX);
            energy += normalized * normalized;
        });
        let rms = (energy / count as f64).sqrt();
        if rms <= 0.0 {
            return bounds.min;
        }
        let db = 20.0 * (rms / REFERENCE_PRESSURE).log10();
        let clamped = db.clamp(f64::from(bounds.min), f64::from(bounds.max));
        bounds.clamp(clamped.round() as Level)
    }
}

impl LevelCalculator for SoundPressureLevel {
    fn calculate(&self, samples: PcmSlice<'_>, bounds: LevelBounds, previous: Level) -> Level {
        let level = Self::instantaneous(samples, bounds);
        let previous = bounds.clamp(previous);
        if level < previous {
            level.max(previous - bounds.max_fall())
        } else {
            level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(amplitude: i16, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn silence_maps_to_floor() {
        let silence = vec![0i16; 160];
        let level =
            SoundPressureLevel.calculate(PcmSlice::Shorts(&silence), LevelBounds::default(), 0);
        assert_eq!(level, MIN_LEVEL);
    }

    #[test]
    fn empty_window_maps_to_floor() {
        let level = SoundPressureLevel.calculate(PcmSlice::Bytes(&[]), LevelBounds::default(), 0);
        assert_eq!(level, MIN_LEVEL);
    }

    #[test]
    fn full_scale_square_wave_is_about_94_db() {
        let samples = tone(i16::MAX, 160);
        let level = SoundPressureLevel::instantaneous(
            PcmSlice::Shorts(&samples),
            LevelBounds::default(),
        );
        assert_eq!(level, 94);
    }

    #[test]
    fn byte_and_short_encodings_agree() {
        let samples = tone(4_000, 160);
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let bounds = LevelBounds::default();
        assert_eq!(
            SoundPressureLevel.calculate(PcmSlice::Shorts(&samples), bounds, 0),
            SoundPressureLevel.calculate(PcmSlice::Bytes(&bytes), bounds, 0)
        );
    }

    #[test]
    fn trailing_odd_byte_is_ignored() {
        let even = [0x10u8, 0x20, 0x30, 0x40];
        let odd = [0x10u8, 0x20, 0x30, 0x40, 0x7f];
        let bounds = LevelBounds::default();
        assert_eq!(
            SoundPressureLevel::instantaneous(PcmSlice::Bytes(&even), bounds),
            SoundPressureLevel::instantaneous(PcmSlice::Bytes(&odd), bounds)
        );
    }

    #[test]
    fn result_stays_inside_narrow_bounds() {
        let samples = tone(i16::MAX, 32);
        let bounds = LevelBounds::new(10, 40);
        let level = SoundPressureLevel.calculate(PcmSlice::Shorts(&samples), bounds, 0);
        assert_eq!(level, 40);
    }

    #[test]
    fn falls_are_rate_limited_by_previous_level() {
        let silence = vec![0i16; 160];
        let bounds = LevelBounds::default();
        let level = SoundPressureLevel.calculate(PcmSlice::Shorts(&silence), bounds, 94);
        assert_eq!(level, 94 - bounds.max_fall());
    }

    #[test]
    fn rises_are_immediate() {
        let samples = tone(i16::MAX, 160);
        let level =
            SoundPressureLevel.calculate(PcmSlice::Shorts(&samples), LevelBounds::default(), 0);
        assert_eq!(level, 94);
    }

    #[test]
    fn bounds_new_orders_arguments() {
        let bounds = LevelBounds::new(127, 0);
        assert_eq!(bounds, LevelBounds::default());
    }
}
