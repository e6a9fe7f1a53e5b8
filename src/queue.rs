//! Playback jitter buffer.
//!
//! Decoded and resampled samples are appended at the tail as packets arrive;
//! the playback device drains fixed blocks from the head on its own cadence.
//! A pull is all-or-nothing: either the full requested block in FIFO order or
//! a block of silence with the queue left untouched.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// FIFO of interleaved f32 samples awaiting playback.
pub struct PlaybackQueue {
    buf: VecDeque<f32>,
    /// Maximum buffered samples; 0 disables the cap.
    capacity: usize,
    /// Interleave unit; overflow drops are aligned to this so channels never
    /// shift against each other.
    channels: usize,
    dropped: u64,
}

impl PlaybackQueue {
    pub fn new(capacity: usize, channels: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity.min(1 << 20)),
            capacity,
            channels: channels.max(1),
            dropped: 0,
        }
    }

    /// Append samples at the tail. When the cap is exceeded the oldest
    /// samples are dropped; the caller is never failed or blocked.
    pub fn push(&mut self, samples: &[f32]) {
        self.buf.extend(samples.iter().copied());
        if self.capacity > 0 && self.buf.len() > self.capacity {
            let mut excess = self.buf.len() - self.capacity;
            excess = excess.div_ceil(self.channels) * self.channels;
            self.buf.drain(..excess);
            self.dropped += excess as u64;
            log::warn!(
                "playback queue overflow: dropped {} oldest samples ({} total)",
                excess,
                self.dropped
            );
        }
    }

    /// Fill `out` from the head, or with silence on underrun.
    ///
    /// Returns `true` when real audio was delivered. On underrun the queue is
    /// left untouched; no partial block is ever served.
    pub fn read_or_silence(&mut self, out: &mut [f32]) -> bool {
        if self.buf.len() < out.len() {
            out.fill(0.0);
            return false;
        }
        for slot in out.iter_mut() {
            // Cannot fail: length was checked above.
            *slot = self.buf.pop_front().unwrap_or(0.0);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Total samples evicted by overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Lock the queue without ever panicking on the audio path. A poisoned mutex
/// only means a writer panicked mid-push; the sample FIFO itself is still
/// structurally sound.
pub(crate) fn lock_queue(queue: &Mutex<PlaybackQueue>) -> MutexGuard<'_, PlaybackQueue> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
