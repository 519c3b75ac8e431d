//! Bounded waits on monitor events (perimeter breach, tap)

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Perimeter breach record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerimeterEvent {
    pub channel: u8,
    /// Seconds since the unix epoch
    pub timestamp: u64,
}

/// Tap detected by the accelerometer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapEvent {
    pub timestamp: u64,
}

/// Queue of pending events with a timed wait
#[derive(Debug)]
pub struct EventChannel<T> {
    pending: Mutex<VecDeque<T>>,
    signal: Condvar,
}

impl<T: Clone> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            signal: Condvar::new(),
        }
    }

    pub fn notify(&self, event: T) {
        self.pending.lock().push_back(event);
        self.signal.notify_all();
    }

    /// Wait until at least one event is pending; a zero timeout polls
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while pending.is_empty() {
            if timeout.is_zero() || self.signal.wait_until(&mut pending, deadline).timed_out() {
                return !pending.is_empty();
            }
        }
        true
    }

    /// Wait for an event and take it off the queue
    pub fn wait_take(&self, timeout: Duration) -> Option<T> {
        if !self.wait(timeout) {
            return None;
        }
        self.pending.lock().pop_front()
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.pending.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.pending.lock().clear();
    }
}

impl<T: Clone> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_timeout_polls() {
        let channel: EventChannel<TapEvent> = EventChannel::new();
        let started = Instant::now();
        assert!(!channel.wait(Duration::ZERO));
        assert!(started.elapsed() < Duration::from_millis(50));

        channel.notify(TapEvent { timestamp: 1 });
        assert!(channel.wait(Duration::ZERO));
    }

    #[test]
    fn test_wait_times_out() {
        let channel: EventChannel<TapEvent> = EventChannel::new();
        let started = Instant::now();
        assert!(!channel.wait(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_wakes_on_notify() {
        let channel = Arc::new(EventChannel::new());
        let sender = Arc::clone(&channel);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.notify(PerimeterEvent {
                channel: 1,
                timestamp: 7,
            });
        });
        assert!(channel.wait(Duration::from_secs(5)));
        handle.join().unwrap();
        assert_eq!(channel.snapshot().len(), 1);
    }

    #[test]
    fn test_take_and_clear() {
        let channel = EventChannel::new();
        channel.notify(TapEvent { timestamp: 1 });
        channel.notify(TapEvent { timestamp: 2 });
        assert_eq!(
            channel.wait_take(Duration::ZERO),
            Some(TapEvent { timestamp: 1 })
        );
        channel.clear();
        assert!(channel.snapshot().is_empty());
        assert_eq!(channel.wait_take(Duration::ZERO), None);
    }
}
