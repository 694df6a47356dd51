use crate::codec::{CodecError, ExchangeCodec};
use crate::model::{Request, Response};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Writes exchanges under consecutive sequence numbers starting at 1.
///
/// The number is taken before the files are written, so concurrent
/// exchanges never share one, but a reader may briefly see a later
/// sequence on disk before an earlier one.
#[derive(Debug)]
pub struct ExchangeRecorder {
    codec: ExchangeCodec,
    sequence: AtomicU32,
}

impl ExchangeRecorder {
    pub fn new(codec: ExchangeCodec) -> Self {
        Self::with_start_sequence(codec, 1)
    }

    /// Continue numbering at `first`, e.g. to append to an existing recording.
    pub fn with_start_sequence(codec: ExchangeCodec, first: u32) -> Self {
        Self {
            codec,
            sequence: AtomicU32::new(first.saturating_sub(1)),
        }
    }

    /// Recorder that appends after the exchanges already in the directory.
    pub fn appending(codec: ExchangeCodec) -> Self {
        let mut next = 1;
        while codec.has_request(next) {
            next += 1;
        }
        Self::with_start_sequence(codec, next)
    }

    pub fn codec(&self) -> &ExchangeCodec {
        &self.codec
    }

    /// Highest sequence number handed out so far (0 when nothing was recorded).
    pub fn last_sequence(&self) -> u32 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Persist one exchange and return its sequence number.
    pub fn record(&self, request: &Request, response: &Response) -> Result<u32, CodecError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.codec.write_exchange(sequence, request, response)?;
        debug!("Recorded exchange #{}", sequence);
        Ok(sequence)
    }
}
