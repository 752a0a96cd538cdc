use std::collections::VecDeque;

const INITIAL_CAPACITY: usize = 0x10000;

/// Growable FIFO of bytes waiting to be sent.
///
/// The drain side looks at [`chunks`](Self::chunks) and reports how much went
/// out through [`commit`](Self::commit); it never touches the layout.
#[derive(Debug)]
pub struct WriteQueue {
    buf: VecDeque<u8>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self { buf: VecDeque::with_capacity(INITIAL_CAPACITY) }
    }

    /// Copies `bytes` to the tail.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Queued bytes as at most two contiguous slices, oldest first.
    pub fn chunks(&self) -> (&[u8], &[u8]) {
        self.buf.as_slices()
    }

    /// Drops the first `n` bytes, which have been sent.
    pub fn commit(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}
