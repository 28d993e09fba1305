use crate::level::{LevelDispatcher, SampleWindow};

/// Downmix multi-channel input to mono while applying the provided converter,
/// so the meter sees one channel regardless of the device layout.
pub fn append_downmixed_samples<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    // Average each interleaved frame.
    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(acc / count as f32);
    }
}

/// Map a normalized sample in [-1, 1] onto 16-bit PCM.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Accumulates mono samples from device callbacks and submits fixed-size
/// windows to a dispatcher. All scratch buffers are reused.
pub struct WindowBatcher {
    frame_samples: usize,
    scratch: Vec<f32>,
    pending: Vec<i16>,
    submitted: usize,
}

impl WindowBatcher {
    pub fn new(frame_samples: usize) -> Self {
        let frame_samples = frame_samples.max(1);
        Self {
            frame_samples,
            scratch: Vec::new(),
            pending: Vec::with_capacity(frame_samples * 2),
            submitted: 0,
        }
    }

    /// Windows submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Samples waiting for a full window.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn push<T, F>(&mut self, dispatcher: &LevelDispatcher, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        append_downmixed_samples(&mut self.scratch, data, channels, convert);
        self.pending.extend(self.scratch.iter().copied().map(f32_to_i16));

        let mut start = 0;
        while self.pending.len() - start >= self.frame_samples {
            let end = start + self.frame_samples;
            dispatcher.submit(SampleWindow::shorts(&self.pending[start..end]));
            self.submitted += 1;
            start = end;
        }
        self.pending.drain(..start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{Level, LevelListener};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    #[test]
    fn mono_input_is_converted_in_place() {
        let mut buf = Vec::new();
        append_downmixed_samples(&mut buf, &[1i16, -2, 3], 1, |s| s as f32);
        assert_eq!(buf, vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn stereo_frames_are_averaged() {
        let mut buf = Vec::new();
        append_downmixed_samples(&mut buf, &[1.0f32, 3.0, -1.0, 1.0], 2, |s| s);
        assert_eq!(buf, vec![2.0, 0.0]);
    }

    #[test]
    fn partial_trailing_frame_is_averaged_over_what_arrived() {
        let mut buf = Vec::new();
        append_downmixed_samples(&mut buf, &[3.0f32, 3.0, 3.0, 6.0], 3, |s| s);
        assert_eq!(buf, vec![3.0, 6.0]);
    }

    #[test]
    fn f32_conversion_clamps_to_pcm_range() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(2.5), i16::MAX);
        assert_eq!(f32_to_i16(-4.0), -i16::MAX);
    }

    #[test]
    fn batcher_submits_whole_windows_and_keeps_the_remainder() {
        let dispatcher = LevelDispatcher::new("batcher-test");
        let levels: Arc<Mutex<Vec<Level>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = levels.clone();
        let listener: Arc<dyn LevelListener> =
            Arc::new(move |level: Level| sink.lock().unwrap().push(level));
        dispatcher.set_listener(Some(listener));

        let mut batcher = WindowBatcher::new(4);
        batcher.push(&dispatcher, &[0i16; 10], 1, |s| s as f32);
        assert_eq!(batcher.submitted(), 2);
        assert_eq!(batcher.buffered(), 2);

        batcher.push(&dispatcher, &[0i16; 4], 2, |s| s as f32);
        assert_eq!(batcher.submitted(), 3);
        assert_eq!(batcher.buffered(), 0);
        assert_eq!(dispatcher.stats().submitted, 3);

        let deadline = Instant::now() + Duration::from_secs(5);
        while levels.lock().unwrap().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(levels.lock().unwrap().iter().all(|&level| level == 0));
        assert!(!levels.lock().unwrap().is_empty());
    }
}
