use std::io::{self, ErrorKind, Read};

const BYTES_PER_SAMPLE: usize = 2;

/// Splits a raw 16-bit little-endian PCM stream into fixed-size windows.
///
/// One byte buffer is reused for every window, so steady-state reads do not
/// allocate.
pub struct WindowReader<R> {
    reader: R,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: Read> WindowReader<R> {
    pub fn new(reader: R, samples_per_window: usize) -> Self {
        Self {
            reader,
            buf: vec![0; samples_per_window.max(1) * BYTES_PER_SAMPLE],
            finished: false,
        }
    }

    /// Bytes in a full window.
    pub fn window_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Read the next window. The final window may be short; its length is
    /// rounded down to whole samples. Returns `None` once the stream is done.
    pub fn next_window(&mut self) -> io::Result<Option<&[u8]>> {
        if self.finished {
            return Ok(None);
        }
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => {
                    self.finished = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        let usable = filled - filled % BYTES_PER_SAMPLE;
        if usable == 0 {
            self.finished = true;
            return Ok(None);
        }
        Ok(Some(&self.buf[..usable]))
    }
}

/// Decode s16le bytes into `out`, replacing its contents. A trailing odd byte
/// is dropped.
pub fn decode_s16le(bytes: &[u8], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
}
