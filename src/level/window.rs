//! PCM sample windows and the grow-only slots the dispatcher keeps them in.

/// Sample data handed to [`LevelDispatcher::submit`](super::LevelDispatcher::submit).
///
/// `Bytes` holds 16-bit little-endian PCM serialized as bytes. `Floats` is
/// accepted so device callbacks can hand over whatever they have, but it is
/// not measured: submitting it clears any pending window instead.
#[derive(Debug, Clone, Copy)]
pub enum PcmData<'a> {
    Bytes(&'a [u8]),
    Shorts(&'a [i16]),
    Floats(&'a [f32]),
}

impl PcmData<'_> {
    /// Number of elements in the underlying slice.
    pub fn len(&self) -> usize {
        match self {
            PcmData::Bytes(data) => data.len(),
            PcmData::Shorts(data) => data.len(),
            PcmData::Floats(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The two sample encodings the dispatcher buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Byte,
    Short,
}

/// A region of PCM data: `length` elements starting at `offset`.
#[derive(Debug, Clone, Copy)]
pub struct SampleWindow<'a> {
    pub data: PcmData<'a>,
    pub offset: usize,
    pub length: usize,
}

impl<'a> SampleWindow<'a> {
    pub fn new(data: PcmData<'a>, offset: usize, length: usize) -> Self {
        Self {
            data,
            offset,
            length,
        }
    }

    /// Window covering all of `data`.
    pub fn whole(data: PcmData<'a>) -> Self {
        Self::new(data, 0, data.len())
    }

    pub fn bytes(data: &'a [u8]) -> Self {
        Self::whole(PcmData::Bytes(data))
    }

    pub fn shorts(data: &'a [i16]) -> Self {
        Self::whole(PcmData::Shorts(data))
    }

    /// Returns `false` when `offset..offset + length` falls outside the data.
    pub(crate) fn in_bounds(&self) -> bool {
        self.offset
            .checked_add(self.length)
            .is_some_and(|end| end <= self.data.len())
    }
}

/// Borrowed view of a drained window, as handed to a calculator.
#[derive(Debug, Clone, Copy)]
pub enum PcmSlice<'a> {
    Bytes(&'a [u8]),
    Shorts(&'a [i16]),
}

impl PcmSlice<'_> {
    /// Number of 16-bit samples in the view.
    pub fn sample_count(&self) -> usize {
        match self {
            PcmSlice::Bytes(data) => data.len() / 2,
            PcmSlice::Shorts(data) => data.len(),
        }
    }

    pub fn representation(&self) -> Representation {
        match self {
            PcmSlice::Bytes(_) => Representation::Byte,
            PcmSlice::Shorts(_) => Representation::Short,
        }
    }

    /// Visit every sample as a signed 16-bit value. A trailing odd byte is skipped.
    pub fn for_each_sample<F>(&self, mut visit: F)
    where
        F: FnMut(i16),
    {
        match self {
            PcmSlice::Bytes(data) => data
                .chunks_exact(2)
                .for_each(|pair| visit(i16::from_le_bytes([pair[0], pair[1]]))),
            PcmSlice::Shorts(data) => data.iter().copied().for_each(visit),
        }
    }
}

/// One pending window per representation.
///
/// `buffer` is `None` while the worker has borrowed it for a computation.
/// `len` is the logical length of pending data. `capacity` is the largest
/// buffer ever allocated here; replacements are never smaller.
#[derive(Debug)]
pub(crate) struct PendingSlot<T> {
    pub(crate) buffer: Option<Vec<T>>,
    pub(crate) len: usize,
    capacity: usize,
}

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        Self {
            buffer: None,
            len: 0,
            capacity: 0,
        }
    }
}

impl<T: Copy + Default> PendingSlot<T> {
    /// Copy `src` in as the pending window, growing the buffer if it is too small.
    pub(crate) fn fill(&mut self, src: &[T]) {
        let buffer = match self.buffer.take() {
            Some(buffer) if buffer.len() >= src.len() => buffer,
            _ => {
                self.capacity = self.capacity.max(src.len());
                vec![T::default(); self.capacity]
            }
        };
        let buffer = self.buffer.insert(buffer);
        buffer[..src.len()].copy_from_slice(src);
        self.len = src.len();
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.len > 0 && self.buffer.is_some()
    }

    /// Lend the pending buffer out, leaving the slot empty.
    pub(crate) fn take(&mut self) -> Option<(Vec<T>, usize)> {
        if !self.is_pending() {
            return None;
        }
        let len = std::mem::take(&mut self.len);
        self.buffer.take().map(|buffer| (buffer, len))
    }

    /// Hand a borrowed buffer back unless a fresher one has taken its place.
    /// Buffers smaller than the high-water mark are dropped.
    pub(crate) fn give_back(&mut self, buffer: Vec<T>) {
        if self.buffer.is_none() && buffer.len() >= self.capacity {
            self.buffer = Some(buffer);
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_reuses_buffer_that_fits() {
        let mut slot = PendingSlot::<i16>::default();
        slot.fill(&[1, 2, 3, 4]);
        slot.fill(&[5, 6]);
        assert_eq!(slot.len, 2);
        assert_eq!(slot.buffer.as_ref().map(Vec::len), Some(4));
        assert_eq!(slot.capacity(), 4);
    }

    #[test]
    fn replacement_buffer_is_never_smaller_than_high_water_mark() {
        let mut slot = PendingSlot::<i16>::default();
        slot.fill(&[0; 8]);
        let (lent, len) = slot.take().expect("pending window");
        assert_eq!(len, 8);

        slot.fill(&[1; 3]);
        assert_eq!(slot.buffer.as_ref().map(Vec::len), Some(8));

        // The slot already holds a fresher buffer.
        slot.give_back(lent);
        assert_eq!(slot.len, 3);
        assert_eq!(slot.buffer.as_ref().map(Vec::len), Some(8));
    }

    #[test]
    fn give_back_drops_undersized_buffers() {
        let mut slot = PendingSlot::<u8>::default();
        slot.fill(&[0; 16]);
        let (lent, _) = slot.take().expect("pending window");
        slot.give_back(vec![0; 4]);
        assert!(slot.buffer.is_none());
        slot.give_back(lent);
        assert_eq!(slot.buffer.as_ref().map(Vec::len), Some(16));
        assert!(!slot.is_pending());
    }

    #[test]
    fn out_of_range_regions_are_detected() {
        let data = [0i16; 10];
        assert!(SampleWindow::new(PcmData::Shorts(&data), 2, 8).in_bounds());
        assert!(!SampleWindow::new(PcmData::Shorts(&data), 3, 8).in_bounds());
        assert!(!SampleWindow::new(PcmData::Shorts(&data), usize::MAX, 2).in_bounds());
    }
}
