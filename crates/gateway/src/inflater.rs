use flate2::{Decompress, FlushDecompress};

use crate::error::{GatewayError, Result};

/// Every complete zlib-stream message ends with a sync flush marker
const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xff, 0xff];
const CHUNK: usize = 32 * 1024;
/// Compressed bytes held while waiting for a message to complete
const MAX_BUFFERED: usize = 8 * 1024 * 1024;

/// Connection-scoped zlib-stream decoder.
///
/// Binary frames are buffered until one ends with [`ZLIB_SUFFIX`], then the
/// buffer is inflated with a context shared by every message of the
/// connection. Call [`Inflater::reset`] before reusing it for a new socket.
pub struct Inflater {
    decompress: Decompress,
    buffer: Vec<u8>,
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            decompress: Decompress::new(true),
            buffer: Vec::new(),
        }
    }

    /// Feed one binary frame. Returns the inflated message once complete.
    pub fn push(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.buffer.len() + frame.len() > MAX_BUFFERED {
            let buffered = self.buffer.len() + frame.len();
            self.buffer.clear();
            return Err(GatewayError::Inflate(format!(
                "{buffered} compressed bytes without a message boundary"
            )));
        }
        self.buffer.extend_from_slice(frame);
        if !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let input = std::mem::take(&mut self.buffer);
        let mut output = Vec::with_capacity((input.len() * 4).max(CHUNK));
        let start_in = self.decompress.total_in();
        let mut consumed = 0usize;

        loop {
            if output.len() == output.capacity() {
                output.reserve(CHUNK);
            }
            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();
            self.decompress
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Sync)
                .map_err(|e| GatewayError::Inflate(e.to_string()))?;
            consumed = (self.decompress.total_in() - start_in) as usize;

            let progressed = self.decompress.total_in() != before_in
                || self.decompress.total_out() != before_out;
            if consumed >= input.len() && (output.len() < output.capacity() || !progressed) {
                break;
            }
            if !progressed {
                return Err(GatewayError::Inflate(format!(
                    "stalled after {consumed} of {} bytes",
                    input.len()
                )));
            }
        }

        Ok(Some(output))
    }

    /// Drop buffered input and start a fresh zlib context
    pub fn reset(&mut self) {
        self.decompress.reset(true);
        self.buffer.clear();
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}
