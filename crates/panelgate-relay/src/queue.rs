//! Bounded holding area for client frames sent before the node is ready.

use std::collections::VecDeque;

use panelgate_transport::Frame;

/// FIFO of frames waiting for the outbound connection.
///
/// Lossy under pressure: pushing into a full queue evicts the oldest
/// frame so the client's event delivery never blocks.
#[derive(Debug)]
pub struct PendingQueue {
    frames: VecDeque<Frame>,
    capacity: usize,
    evicted: u64,
}

impl PendingQueue {
    /// Creates a queue holding at most `capacity` frames (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            evicted: 0,
        }
    }

    /// Appends `frame`, returning the frame evicted to make room, if any.
    pub fn push(&mut self, frame: Frame) -> Option<Frame> {
        let evicted = if self.frames.len() >= self.capacity {
            self.evicted += 1;
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    /// Removes and yields every queued frame, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Frame> + '_ {
        self.frames.drain(..)
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total frames dropped because the queue was full.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
