use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// How much of the queue a consumer discards after copying a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Copy the oldest N samples and clear everything.
    #[default]
    DiscardAll,
    /// Copy the oldest N samples and discard `floor(len / N) * N`,
    /// keeping the partial window for the next frame.
    WholeWindows,
}

struct Channels {
    i: VecDeque<f32>,
    q: VecDeque<f32>,
    dropped: u64,
}

/// Bounded I/Q sample queue shared by one producer and one consumer.
///
/// Both channels always hold the same number of samples. When a push would
/// exceed `capacity`, the oldest samples are dropped and counted.
pub struct SampleQueue {
    inner: Mutex<Channels>,
    capacity: usize,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Channels {
                i: VecDeque::new(),
                q: VecDeque::new(),
                dropped: 0,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Channels> {
        // A panicking holder cannot leave the channels out of step
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append samples in arrival order. Returns how many old samples were dropped.
    pub fn push(&self, i: &[f32], q: &[f32]) -> usize {
        let n = i.len().min(q.len());
        let mut ch = self.lock();
        ch.i.extend(&i[..n]);
        ch.q.extend(&q[..n]);

        let overflow = ch.i.len().saturating_sub(self.capacity);
        if overflow > 0 {
            ch.i.drain(..overflow);
            ch.q.drain(..overflow);
            ch.dropped += overflow as u64;
        }
        overflow
    }

    pub fn clear(&self) {
        let mut ch = self.lock();
        ch.i.clear();
        ch.q.clear();
    }

    pub fn len(&self) -> usize {
        let ch = self.lock();
        ch.i.len().min(ch.q.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples dropped on overflow since creation
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Copy the oldest `n` samples into `out_i`/`out_q` and discard per `policy`.
    ///
    /// Returns false and leaves the outputs untouched when fewer than `n`
    /// samples are queued or the outputs are shorter than `n`.
    pub fn drain_window(
        &self,
        n: usize,
        policy: DrainPolicy,
        out_i: &mut [f32],
        out_q: &mut [f32],
    ) -> bool {
        if n == 0 || out_i.len() < n || out_q.len() < n {
            return false;
        }

        let mut ch = self.lock();
        let len = ch.i.len().min(ch.q.len());
        if len < n {
            return false;
        }

        for (dst, src) in out_i[..n].iter_mut().zip(ch.i.iter()) {
            *dst = *src;
        }
        for (dst, src) in out_q[..n].iter_mut().zip(ch.q.iter()) {
            *dst = *src;
        }

        match policy {
            DrainPolicy::DiscardAll => {
                ch.i.clear();
                ch.q.clear();
            }
            DrainPolicy::WholeWindows => {
                let discard = (len / n) * n;
                ch.i.drain(..discard);
                ch.q.drain(..discard);
            }
        }
        true
    }

    /// Copy of everything queued, oldest first.
    pub fn snapshot(&self) -> (Vec<f32>, Vec<f32>) {
        let ch = self.lock();
        (ch.i.iter().copied().collect(), ch.q.iter().copied().collect())
    }
}
