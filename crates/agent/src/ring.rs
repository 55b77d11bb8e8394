//! Bounded append-only byte buffer with FIFO eviction, backing the
//! [`crate::output_delegate::OutputDelegate`] buffer slot while a PTY's
//! output has no attached sink.

use std::collections::VecDeque;

/// A bounded, chunked byte buffer. Writes are appended as whole chunks;
/// whenever the running total exceeds `capacity`, whole chunks are evicted
/// from the front until it no longer does, with one exception: a single
/// write larger than `capacity` is clamped to its own trailing `capacity`
/// bytes rather than evicting everything else first.
#[derive(Debug, Default)]
pub struct RingBuffer {
    chunks: VecDeque<Vec<u8>>,
    total_size: usize,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { chunks: VecDeque::new(), total_size: 0, capacity }
    }

    /// Append `data`, evicting the oldest chunks as needed to respect
    /// `capacity`.
    pub fn write(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        self.chunks.push_back(data.to_vec());
        self.total_size += data.len();

        while self.total_size > self.capacity && self.chunks.len() > 1 {
            // Loop condition just checked `len() > 1`, so `pop_front` can't be empty here.
            #[allow(clippy::expect_used)]
            let oldest = self.chunks.pop_front().expect("checked len > 1");
            self.total_size -= oldest.len();
        }

        // Only one chunk remains and it alone still exceeds capacity:
        // clamp it to its own tail rather than evicting it entirely.
        if self.total_size > self.capacity {
            if let Some(chunk) = self.chunks.front_mut() {
                let keep_from = chunk.len() - self.capacity;
                chunk.drain(..keep_from);
                self.total_size = chunk.len();
            }
        }
    }

    /// Return the full buffered contents and reset the buffer to empty.
    pub fn drain(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size);
        for chunk in self.chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        self.total_size = 0;
        out
    }

    pub fn len(&self) -> usize {
        self.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
