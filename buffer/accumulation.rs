// Accumulation buffer: FIFO of received-but-unconsumed bytes
use bytes::{Bytes, BytesMut};

/// Ordered byte queue that absorbs backend deliveries and hands out
/// exact-size or bounded-size slices from the head.
///
/// Bytes are appended at the tail and consumed from the head only, so
/// whatever a backend over-delivers stays queued, in order, for the next read.
#[derive(Debug, Default)]
pub struct AccumulationBuffer {
    pending: BytesMut,
}

impl AccumulationBuffer {
    pub fn new() -> Self {
        AccumulationBuffer {
            pending: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        AccumulationBuffer {
            pending: BytesMut::with_capacity(capacity),
        }
    }

    /// Append bytes at the tail.
    pub fn write(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Remove and return exactly `n` bytes from the head.
    ///
    /// Returns `None` and leaves the buffer untouched when fewer than `n`
    /// bytes are buffered; callers check `len()` first.
    pub fn read_exact(&mut self, n: usize) -> Option<Bytes> {
        if n > self.pending.len() {
            return None;
        }
        Some(self.pending.split_to(n).freeze())
    }

    /// Remove and return `min(n, len())` bytes from the head.
    pub fn read_up_to(&mut self, n: usize) -> Bytes {
        let take = n.min(self.pending.len());
        self.pending.split_to(take).freeze()
    }

    /// Look at the first `n` bytes without consuming them.
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        self.pending.get(..n)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_read_consumes_from_head() {
        let mut buffer = AccumulationBuffer::new();
        buffer.write(b"hello");
        buffer.write(b" world");

        assert_eq!(buffer.len(), 11);
        assert_eq!(&buffer.read_exact(5).unwrap()[..], b"hello");
        assert_eq!(buffer.len(), 6);
        assert_eq!(&buffer.read_exact(6).unwrap()[..], b" world");
        assert!(buffer.is_empty());
    }

    #[test]
    fn exact_read_past_end_leaves_buffer_intact() {
        let mut buffer = AccumulationBuffer::new();
        buffer.write(b"abc");

        assert!(buffer.read_exact(4).is_none());
        assert_eq!(buffer.len(), 3);
        assert_eq!(&buffer.read_exact(3).unwrap()[..], b"abc");
    }

    #[test]
    fn bounded_read_returns_what_is_there() {
        let mut buffer = AccumulationBuffer::new();
        assert!(buffer.read_up_to(8).is_empty());

        buffer.write(b"abc");
        assert_eq!(&buffer.read_up_to(8)[..], b"abc");
        assert!(buffer.is_empty());

        buffer.write(b"abcdef");
        assert_eq!(&buffer.read_up_to(2)[..], b"ab");
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut buffer = AccumulationBuffer::with_capacity(16);
        buffer.write(&[0, 4, b't']);

        assert_eq!(buffer.peek(2), Some(&[0u8, 4][..]));
        assert_eq!(buffer.peek(4), None);
        assert_eq!(buffer.len(), 3);
    }

    proptest! {
        // Whatever the write and read split, bytes come out in arrival order.
        #[test]
        fn preserves_order_across_splits(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..16),
            reads in prop::collection::vec(1usize..24, 1..32),
        ) {
            let mut buffer = AccumulationBuffer::new();
            let expected: Vec<u8> = chunks.concat();
            for chunk in &chunks {
                buffer.write(chunk);
            }

            let mut out = Vec::new();
            for n in reads {
                if let Some(bytes) = buffer.read_exact(n) {
                    out.extend_from_slice(&bytes);
                } else {
                    out.extend_from_slice(&buffer.read_up_to(n));
                }
            }
            out.extend_from_slice(&buffer.read_up_to(usize::MAX));

            prop_assert_eq!(out, expected);
            prop_assert!(buffer.is_empty());
        }
    }
}
