//! Buffer management for process output

mod ansi;
mod shared;

pub use ansi::{strip_ansi, AnsiStripper};
pub(crate) use shared::SharedBuffer;

use crate::result::ExpectError;
use bytes::{Buf, BytesMut};
use std::io;

/// Initial capacity of the byte storage, independent of the retention limit
const INITIAL_CAPACITY: usize = 4096;

/// Whether more output can still arrive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// The reader is still running
    Open,
    /// The process closed its output
    Eof,
    /// Reading failed; the reader has stopped
    Failed {
        /// Kind of the underlying error
        kind: io::ErrorKind,
        /// Message of the underlying error
        message: String,
    },
    /// An append was rejected because the retention limit was reached
    Overflowed,
}

impl StreamStatus {
    /// Whether this status is terminal (no more output will be appended)
    pub fn is_closed(&self) -> bool {
        !matches!(self, StreamStatus::Open)
    }
}

/// Borrowed view of the unconsumed output
#[derive(Debug)]
pub struct Snapshot<'a> {
    /// Unconsumed bytes
    pub bytes: &'a [u8],
    /// Absolute stream offset of `bytes[0]`
    pub offset: usize,
    /// Stream status at the time of the snapshot
    pub status: &'a StreamStatus,
}

/// Accumulates process output not yet consumed by a match.
///
/// Bytes are only ever appended at the tail and only ever discarded from the
/// head, through [`Buffer::advance`]. The consumed offset counts every byte
/// discarded so far and never moves backwards.
#[derive(Debug)]
pub struct Buffer {
    data: BytesMut,
    consumed: usize,
    max_size: usize,
    stripper: Option<AnsiStripper>,
    status: StreamStatus,
}

impl Buffer {
    /// Create a buffer retaining at most `max_size` unconsumed bytes
    pub fn new(max_size: usize, strip_ansi: bool) -> Self {
        Self {
            data: BytesMut::with_capacity(max_size.min(INITIAL_CAPACITY)),
            consumed: 0,
            max_size,
            stripper: strip_ansi.then(AnsiStripper::new),
            status: StreamStatus::Open,
        }
    }

    /// Append data to the tail of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::BufferOverflow`] if the unconsumed bytes would
    /// exceed the retention limit. Nothing is appended in that case.
    pub fn append(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        let stripped;
        let data = match self.stripper.as_mut() {
            Some(stripper) => {
                stripped = stripper.strip(data);
                &stripped[..]
            }
            None => data,
        };

        if data.is_empty() {
            return Ok(());
        }

        if self.data.len() + data.len() > self.max_size {
            return Err(ExpectError::BufferOverflow {
                limit: self.max_size,
            });
        }

        self.data.extend_from_slice(data);
        Ok(())
    }

    /// Permanently discard the first `n` unconsumed bytes.
    ///
    /// `n` is clamped to the number of unconsumed bytes.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data.advance(n);
        self.consumed += n;
    }

    /// View of the unconsumed output
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            bytes: &self.data,
            offset: self.consumed,
            status: &self.status,
        }
    }

    /// Unconsumed bytes
    pub fn unconsumed(&self) -> &[u8] {
        &self.data
    }

    /// Number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether there are no unconsumed bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Absolute offset of the first unconsumed byte
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Total number of bytes ever appended
    pub fn total(&self) -> usize {
        self.consumed + self.data.len()
    }

    /// Current stream status
    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    /// Record that no more output will arrive.
    ///
    /// The first terminal status wins; later calls are ignored.
    pub fn close(&mut self, status: StreamStatus) {
        if !self.status.is_closed() {
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_buffer() {
        let buffer = Buffer::new(1024, false);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.consumed(), 0);
        assert_eq!(buffer.status(), &StreamStatus::Open);
    }

    #[test]
    fn test_multiple_appends() {
        let mut buffer = Buffer::new(1024, false);
        buffer.append(b"Hello ").unwrap();
        buffer.append(b"World").unwrap();
        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.unconsumed(), b"Hello World");
    }

    #[test]
    fn test_advance() {
        let mut buffer = Buffer::new(1024, false);
        buffer.append(b"Hello World").unwrap();
        buffer.advance(6);

        assert_eq!(buffer.unconsumed(), b"World");
        assert_eq!(buffer.consumed(), 6);
        assert_eq!(buffer.total(), 11);

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.bytes, b"World");
        assert_eq!(snapshot.offset, 6);
    }

    #[test]
    fn test_advance_is_clamped() {
        let mut buffer = Buffer::new(1024, false);
        buffer.append(b"abc").unwrap();
        buffer.advance(10);
        assert!(buffer.is_empty());
        assert_eq!(buffer.consumed(), 3);
    }

    #[test]
    fn test_overflow_rejects_append() {
        let mut buffer = Buffer::new(8, false);
        buffer.append(b"12345").unwrap();

        let err = buffer.append(b"6789").unwrap_err();
        assert!(matches!(err, ExpectError::BufferOverflow { limit: 8 }));
        // Nothing from the rejected chunk was kept.
        assert_eq!(buffer.unconsumed(), b"12345");
    }

    #[test]
    fn test_limit_applies_to_unconsumed_bytes_only() {
        let mut buffer = Buffer::new(8, false);
        buffer.append(b"12345678").unwrap();
        buffer.advance(8);
        buffer.append(b"abcdefgh").unwrap();
        assert_eq!(buffer.total(), 16);
    }

    #[test]
    fn test_close_first_status_wins() {
        let mut buffer = Buffer::new(16, false);
        buffer.close(StreamStatus::Eof);
        buffer.close(StreamStatus::Overflowed);
        assert_eq!(buffer.status(), &StreamStatus::Eof);
        assert!(buffer.status().is_closed());
    }

    #[test]
    fn test_strip_ansi_enabled() {
        let mut buffer = Buffer::new(1024, true);
        buffer.append(b"Hello \x1b[31mRed\x1b[0m World").unwrap();
        assert_eq!(buffer.unconsumed(), b"Hello Red World");
    }

    #[test]
    fn test_strip_ansi_disabled() {
        let mut buffer = Buffer::new(1024, false);
        let data = b"Hello \x1b[31mRed\x1b[0m World";
        buffer.append(data).unwrap();
        assert_eq!(buffer.unconsumed(), data);
    }

    #[test]
    fn test_empty_append() {
        let mut buffer = Buffer::new(1024, false);
        buffer.append(b"").unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_binary_data() {
        let mut buffer = Buffer::new(1024, false);
        buffer.append(&[0xFF, 0x00, 0xFD]).unwrap();
        assert_eq!(buffer.unconsumed(), &[0xFF, 0x00, 0xFD]);
    }

    proptest! {
        // Consumed bytes followed by retained bytes always reproduce the
        // input exactly, and the consumed offset never goes backwards.
        #[test]
        fn prop_order_preserved(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 0..16),
            advances in proptest::collection::vec(0usize..48, 0..16),
        ) {
            let mut buffer = Buffer::new(usize::MAX, false);
            let mut input = Vec::new();
            let mut consumed = Vec::new();
            let mut last_offset = 0;

            for (i, chunk) in chunks.iter().enumerate() {
                buffer.append(chunk).unwrap();
                input.extend_from_slice(chunk);

                if let Some(&n) = advances.get(i) {
                    let n = n.min(buffer.len());
                    consumed.extend_from_slice(&buffer.unconsumed()[..n]);
                    buffer.advance(n);
                }

                prop_assert!(buffer.consumed() >= last_offset);
                last_offset = buffer.consumed();
            }

            consumed.extend_from_slice(buffer.unconsumed());
            prop_assert_eq!(consumed, input);
            prop_assert_eq!(buffer.consumed() + buffer.len(), buffer.total());
        }
    }
}
