//! Progress channel (C8): a typed event stream consumed by the CLI or
//! tests, with a bounded queue that selectively drops only `TransferBytes`
//! events on overflow so summary correctness (Calculate/Skip/NotFound) is
//! preserved and the most recent transfer sample is always the one kept.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_RATE_WINDOW: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    Calculate { desc: String },
    TransferBytes { file: String, done: u64, total: u64, overall_done: u64, overall_total: u64 },
    Skip { file: String },
    NotFound { file: String },
}

struct Shared {
    queue: Mutex<VecDeque<ProgressEvent>>,
    not_empty: Condvar,
    capacity: usize,
    sender_count: AtomicUsize,
}

/// Producer side: pushes into a bounded queue. On overflow, evicts the
/// oldest queued `TransferBytes` event to make room — Calculate/Skip/
/// NotFound are never evicted, and if none is queued to evict, an
/// incoming `TransferBytes` is dropped rather than growing the queue.
pub struct ProgressSender {
    shared: Arc<Shared>,
}

impl ProgressSender {
    pub fn send(&self, event: ProgressEvent) {
        let mut queue = self.shared.queue.lock().unwrap();
        if queue.len() >= self.shared.capacity {
            match queue.iter().position(|e| matches!(e, ProgressEvent::TransferBytes { .. })) {
                Some(pos) => {
                    queue.remove(pos);
                }
                None if matches!(event, ProgressEvent::TransferBytes { .. }) => return,
                None => {}
            }
        }
        queue.push_back(event);
        self.shared.not_empty.notify_one();
    }
}

impl Clone for ProgressSender {
    fn clone(&self) -> Self {
        self.shared.sender_count.fetch_add(1, Ordering::SeqCst);
        Self { shared: self.shared.clone() }
    }
}

impl Drop for ProgressSender {
    fn drop(&mut self) {
        if self.shared.sender_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _queue = self.shared.queue.lock().unwrap();
            self.shared.not_empty.notify_all();
        }
    }
}

pub struct ProgressReceiver {
    shared: Arc<Shared>,
}

impl ProgressReceiver {
    pub fn try_recv(&self) -> Option<ProgressEvent> {
        self.shared.queue.lock().unwrap().pop_front()
    }

    pub fn recv(&self) -> Option<ProgressEvent> {
        let mut queue = self.shared.queue.lock().unwrap();
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            if self.shared.sender_count.load(Ordering::SeqCst) == 0 {
                return None;
            }
            queue = self.shared.not_empty.wait(queue).unwrap();
        }
    }
}

/// Creates a bounded progress channel pair with the given queue capacity.
pub fn channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::new()),
        not_empty: Condvar::new(),
        capacity,
        sender_count: AtomicUsize::new(1),
    });
    (ProgressSender { shared: shared.clone() }, ProgressReceiver { shared })
}

/// Sampling-timer throughput/ETA tracker: snapshots cumulative bytes done
/// at a fixed cadence and reports a moving average rate over the last K
/// samples plus `remaining_bytes / rate` as the ETA.
pub struct ThroughputTracker {
    window: usize,
    samples: std::collections::VecDeque<(Instant, u64)>,
    last_sample_at: Instant,
    interval: Duration,
}

impl ThroughputTracker {
    pub fn new(window: usize, interval: Duration) -> Self {
        Self {
            window,
            samples: std::collections::VecDeque::new(),
            last_sample_at: Instant::now(),
            interval,
        }
    }

    /// Records a new cumulative-bytes-done reading if the sample interval
    /// has elapsed; returns whether a sample was taken.
    pub fn maybe_sample(&mut self, now: Instant, overall_done: u64) -> bool {
        if now.duration_since(self.last_sample_at) < self.interval {
            return false;
        }
        self.last_sample_at = now;
        self.samples.push_back((now, overall_done));
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
        true
    }

    /// Bytes/sec moving average over the retained samples, or `None` if
    /// fewer than two samples have been taken yet.
    pub fn rate(&self) -> Option<f64> {
        let (first_t, first_b) = *self.samples.front()?;
        let (last_t, last_b) = *self.samples.back()?;
        if first_t == last_t {
            return None;
        }
        let elapsed = last_t.duration_since(first_t).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        Some((last_b.saturating_sub(first_b)) as f64 / elapsed)
    }

    /// ETA in seconds for `remaining_bytes` at the current rate.
    pub fn eta_seconds(&self, remaining_bytes: u64) -> Option<f64> {
        let rate = self.rate()?;
        if rate <= 0.0 {
            return None;
        }
        Some(remaining_bytes as f64 / rate)
    }
}
