//! Latest-frame handoff between the capture thread and the main loop.
//!
//! The slot holds at most one frame. Publishing replaces it; reading clones
//! the `Arc`, so the lock is never held for longer than a pointer swap.
//! Readers may miss intermediate frames and may see the same frame twice.

use super::Frame;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct SlotState {
    frame: Option<Arc<Frame>>,
    generation: u64,
}

/// Mutex-guarded single-frame slot with publish notification.
#[derive(Default)]
pub struct SharedFrameSlot {
    state: Mutex<SlotState>,
    published: Condvar,
}

impl SharedFrameSlot {
    /// Creates an empty slot at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    // Slot state is plain data; a poisoned guard still holds a whole value.
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the slot contents with `frame` and wakes waiting readers.
    pub fn publish(&self, frame: Frame) {
        let frame = Arc::new(frame);
        let previous = {
            let mut state = self.lock();
            state.generation += 1;
            state.frame.replace(frame)
        };
        self.published.notify_all();
        // The old frame may be the last reference; free it outside the lock.
        drop(previous);
    }

    /// Returns the most recently published frame, or `None` before the first publish.
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.lock().frame.clone()
    }

    /// Returns true once a frame has been published.
    pub fn is_valid(&self) -> bool {
        self.lock().frame.is_some()
    }

    /// Number of publishes so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Waits up to `timeout` for a frame published after generation `seen`.
    ///
    /// Returns the new generation and frame, or `None` on timeout.
    pub fn wait_newer(&self, seen: u64, timeout: Duration) -> Option<(u64, Arc<Frame>)> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.generation > seen {
                if let Some(frame) = &state.frame {
                    return Some((state.generation, Arc::clone(frame)));
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .published
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl std::fmt::Debug for SharedFrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SharedFrameSlot")
            .field("generation", &state.generation)
            .field("frame", &state.frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::thread;

    fn frame(sequence: u64) -> Frame {
        Frame::new(RgbImage::new(4, 4), sequence)
    }

    #[test]
    fn test_empty_before_publish() {
        let slot = SharedFrameSlot::new();
        assert!(slot.read().is_none());
        assert!(!slot.is_valid());
        assert_eq!(slot.generation(), 0);
    }

    #[test]
    fn test_read_returns_latest_until_next_publish() {
        let slot = SharedFrameSlot::new();
        slot.publish(frame(1));

        let first = slot.read().unwrap();
        let again = slot.read().unwrap();
        assert_eq!(first.sequence(), 1);
        assert!(Arc::ptr_eq(&first, &again));

        slot.publish(frame(2));
        assert_eq!(slot.read().unwrap().sequence(), 2);
        assert_eq!(slot.generation(), 2);
    }

    #[test]
    fn test_publish_releases_replaced_frame() {
        let slot = SharedFrameSlot::new();
        slot.publish(frame(1));

        let held = slot.read().unwrap();
        let weak = Arc::downgrade(&held);
        assert_eq!(Arc::strong_count(&held), 2);

        slot.publish(frame(2));
        assert_eq!(Arc::strong_count(&held), 1);
        assert_eq!(held.sequence(), 1);

        drop(held);
        assert!(weak.upgrade().is_none());
        assert_eq!(slot.read().unwrap().sequence(), 2);
    }

    #[test]
    fn test_wait_newer_times_out_without_publish() {
        let slot = SharedFrameSlot::new();
        slot.publish(frame(1));

        assert!(slot.wait_newer(1, Duration::from_millis(5)).is_none());
        let (generation, latest) = slot.wait_newer(0, Duration::from_millis(5)).unwrap();
        assert_eq!(generation, 1);
        assert_eq!(latest.sequence(), 1);
    }

    #[test]
    fn test_wait_newer_wakes_on_publish() {
        let slot = Arc::new(SharedFrameSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                slot.publish(frame(9));
            })
        };

        let (generation, latest) = slot.wait_newer(0, Duration::from_secs(5)).unwrap();
        assert_eq!(generation, 1);
        assert_eq!(latest.sequence(), 9);
        producer.join().unwrap();
    }

    #[test]
    fn test_concurrent_publish_never_tears() {
        let slot = Arc::new(SharedFrameSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for seq in 1..=500u64 {
                    let value = (seq % 256) as u8;
                    let image = RgbImage::from_pixel(8, 8, image::Rgb([value; 3]));
                    slot.publish(Frame::new(image, seq));
                }
            })
        };

        let mut last = 0;
        while last < 500 {
            if let Some(frame) = slot.read() {
                let expected = (frame.sequence() % 256) as u8;
                assert!(frame.pixels().iter().all(|&p| p == expected));
                assert!(frame.sequence() >= last);
                last = frame.sequence();
            }
        }
        producer.join().unwrap();
    }
}
