//! Bounded per-stream outbound queue with drop-oldest overflow
//!
//! Enqueue order equals delivery order, and exactly one drain owns the queue
//! at a time: the push that finds the queue idle claims the drain, and the
//! pop that empties it releases the claim. The overflow warning is one-shot
//! per episode and re-arms only on a full drain.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;

#[derive(Debug)]
pub struct FrameQueue {
    capacity: usize,
    state: Mutex<QueueState>,
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<Bytes>,
    draining: bool,
    dropped: u64,
    warned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// The push transitioned the queue from idle to owned; the caller must
    /// start a drain task.
    pub start_drain: bool,
    /// The push began a new overflow episode; the caller should warn once.
    pub overflow_warning: bool,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn push(&self, frame: Bytes) -> PushOutcome {
        let mut state = self.state.lock().expect("frame queue mutex poisoned");

        let mut overflow_warning = false;
        if state.frames.len() == self.capacity {
            state.frames.pop_front();
            state.dropped += 1;
            if !state.warned {
                state.warned = true;
                overflow_warning = true;
            }
        }
        state.frames.push_back(frame);

        let start_drain = !state.draining;
        state.draining = true;

        PushOutcome {
            start_drain,
            overflow_warning,
        }
    }

    /// Take the next frame in FIFO order. Returning `None` marks the queue
    /// idle and re-arms the overflow warning (a full drain ends the episode).
    pub fn pop(&self) -> Option<Bytes> {
        let mut state = self.state.lock().expect("frame queue mutex poisoned");
        match state.frames.pop_front() {
            Some(frame) => Some(frame),
            None => {
                state.draining = false;
                state.warned = false;
                None
            }
        }
    }

    pub fn clear(&self) {
        self.state
            .lock()
            .expect("frame queue mutex poisoned")
            .frames
            .clear();
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("frame queue mutex poisoned")
            .frames
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.state
            .lock()
            .expect("frame queue mutex poisoned")
            .dropped
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::FrameQueue;

    fn frame(tag: usize) -> Bytes {
        Bytes::from(format!("frame-{tag}"))
    }

    #[test]
    fn overflow_drops_oldest_first() {
        let capacity = 4;
        let extra = 3;
        let queue = FrameQueue::new(capacity);

        for tag in 0..capacity + extra {
            queue.push(frame(tag));
        }

        assert_eq!(queue.len(), capacity);
        assert_eq!(queue.dropped(), extra as u64);

        // The survivors are the newest `capacity` frames, oldest first.
        for tag in extra..capacity + extra {
            assert_eq!(queue.pop(), Some(frame(tag)));
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn first_push_claims_the_drain() {
        let queue = FrameQueue::new(8);

        assert!(queue.push(frame(0)).start_drain);
        assert!(!queue.push(frame(1)).start_drain);

        queue.pop();
        queue.pop();
        assert_eq!(queue.pop(), None);

        // Fully drained: the next push claims the drain again.
        assert!(queue.push(frame(2)).start_drain);
    }

    #[test]
    fn warns_once_per_overflow_episode() {
        let queue = FrameQueue::new(1);
        queue.push(frame(0));

        assert!(queue.push(frame(1)).overflow_warning);
        assert!(!queue.push(frame(2)).overflow_warning);

        // Drain fully; the warning re-arms.
        queue.pop();
        assert_eq!(queue.pop(), None);

        queue.push(frame(3));
        assert!(queue.push(frame(4)).overflow_warning);
    }

    #[test]
    fn partial_drain_does_not_rearm_warning() {
        let queue = FrameQueue::new(2);
        queue.push(frame(0));
        queue.push(frame(1));
        assert!(queue.push(frame(2)).overflow_warning);

        queue.pop();

        // Still mid-episode: a fresh overflow stays silent.
        queue.push(frame(3));
        assert!(!queue.push(frame(4)).overflow_warning);
    }
}
