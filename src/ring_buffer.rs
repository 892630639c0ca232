//! Ordered byte queue backing a connection's receive buffer.

use std::collections::VecDeque;

/// Unbounded FIFO of bytes. Capacity is bounded by receive-window
/// accounting, not here.
#[derive(Debug, Default)]
pub struct RingBuffer {
    bytes: VecDeque<u8>,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self { bytes: VecDeque::new() }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.bytes.extend(data);
    }

    /// Move up to `buf.len()` bytes out of the queue.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.bytes.len());
        for (dst, src) in buf.iter_mut().zip(self.bytes.drain(..n)) {
            *dst = src;
        }
        n
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
