use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use vocalis_foundation::AudioError;

use crate::PcmFrame;

/// Outcome of a bounded dequeue. Close is an explicit variant, never an
/// overloaded null.
#[derive(Debug)]
pub enum Dequeued {
    Frame(PcmFrame),
    TimedOut,
    Closed,
}

#[derive(Default)]
struct QueueState {
    frames: VecDeque<PcmFrame>,
    paused: bool,
    closed: bool,
    /// True while a dequeued frame is being written to the device.
    in_flight: bool,
}

/// Thread-safe unbounded FIFO of playback frames.
///
/// Producers enqueue from any thread; a single worker dequeues. Waiting is a
/// condition-variable wait that wakes on enqueue, resume, interrupt, and
/// close, never fixed-interval polling. Backpressure is intentionally
/// absent: the producer is a network stream, not a tight loop.
pub struct PlaybackQueue {
    state: Mutex<QueueState>,
    /// Signals dequeue waiters.
    items: Condvar,
    /// Signals wait_idle waiters.
    idle: Condvar,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            items: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    /// Append a frame. Fails only after `close`.
    pub fn enqueue(&self, frame: PcmFrame) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(AudioError::QueueClosed);
        }
        state.frames.push_back(frame);
        drop(state);
        self.items.notify_one();
        Ok(())
    }

    /// Block up to `timeout` for the next frame. While paused, frames are
    /// retained and the call times out instead of delivering.
    pub fn dequeue(&self, timeout: Duration) -> Dequeued {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if !state.paused {
                if let Some(frame) = state.frames.pop_front() {
                    state.in_flight = true;
                    return Dequeued::Frame(frame);
                }
                if state.closed {
                    return Dequeued::Closed;
                }
            }

            if self.items.wait_until(&mut state, deadline).timed_out() {
                return Dequeued::TimedOut;
            }
        }
    }

    /// The worker calls this after the dequeued frame has been written (or
    /// its write failed), releasing wait_idle waiters.
    pub fn mark_played(&self) {
        let mut state = self.state.lock();
        state.in_flight = false;
        if state.frames.is_empty() {
            drop(state);
            self.idle.notify_all();
        }
    }

    /// Atomically discard all queued frames. The frame already handed to the
    /// device finishes on its own, so interruption latency is bounded by one
    /// frame duration, not zero. The queue stays open and can be refilled.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        let dropped = state.frames.len();
        state.frames.clear();
        let idle_now = !state.in_flight;
        drop(state);
        if dropped > 0 {
            tracing::debug!("interrupt discarded {} queued frames", dropped);
        }
        if idle_now {
            self.idle.notify_all();
        }
    }

    /// Terminal: wakes a blocked dequeue and refuses further enqueues.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.items.notify_all();
        self.idle.notify_all();
    }

    /// Gate dequeue without dropping buffered frames.
    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        state.paused = false;
        drop(state);
        self.items.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Busy means backlog as well as the frame currently mid-write.
    pub fn is_busy(&self) -> bool {
        let state = self.state.lock();
        state.in_flight || !state.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().frames.is_empty()
    }

    /// Block until the queue is drained and nothing is mid-write.
    pub fn wait_idle(&self) {
        let mut state = self.state.lock();
        while state.in_flight || !state.frames.is_empty() {
            self.idle.wait(&mut state);
        }
    }

    /// Bounded variant of `wait_idle`; true if idle was reached.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.in_flight || !state.frames.is_empty() {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return !state.in_flight && state.frames.is_empty();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(seq: u64) -> PcmFrame {
        PcmFrame {
            bytes: vec![seq as u8; 8],
            seq,
        }
    }

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn fifo_order_is_preserved() {
        let queue = PlaybackQueue::new();
        for i in 0..10 {
            queue.enqueue(frame(i)).unwrap();
        }
        for i in 0..10 {
            match queue.dequeue(SHORT) {
                Dequeued::Frame(f) => {
                    assert_eq!(f.seq, i);
                    queue.mark_played();
                }
                other => panic!("expected frame {i}, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_queue_times_out() {
        let queue = PlaybackQueue::new();
        assert!(matches!(queue.dequeue(SHORT), Dequeued::TimedOut));
    }

    #[test]
    fn interrupt_clears_and_is_idempotent() {
        let queue = PlaybackQueue::new();
        queue.enqueue(frame(0)).unwrap();
        queue.enqueue(frame(1)).unwrap();

        queue.interrupt();
        assert!(queue.is_empty());

        // Again on an already-empty queue: no error, still empty.
        queue.interrupt();
        queue.interrupt();
        assert!(queue.is_empty());
        assert!(!queue.is_closed());

        // Refillable immediately.
        queue.enqueue(frame(2)).unwrap();
        assert!(matches!(queue.dequeue(SHORT), Dequeued::Frame(f) if f.seq == 2));
    }

    #[test]
    fn close_wakes_dequeue_and_rejects_enqueue() {
        let queue = Arc::new(PlaybackQueue::new());
        let q = queue.clone();
        let waiter = std::thread::spawn(move || q.dequeue(Duration::from_secs(10)));

        std::thread::sleep(Duration::from_millis(50));
        queue.close();

        assert!(matches!(waiter.join().unwrap(), Dequeued::Closed));
        assert!(matches!(
            queue.enqueue(frame(0)),
            Err(AudioError::QueueClosed)
        ));
    }

    #[test]
    fn close_drains_pending_frames_first() {
        let queue = PlaybackQueue::new();
        queue.enqueue(frame(0)).unwrap();
        queue.close();

        assert!(matches!(queue.dequeue(SHORT), Dequeued::Frame(f) if f.seq == 0));
        queue.mark_played();
        assert!(matches!(queue.dequeue(SHORT), Dequeued::Closed));
    }

    #[test]
    fn paused_queue_retains_frames() {
        let queue = PlaybackQueue::new();
        queue.pause();
        for i in 0..5 {
            queue.enqueue(frame(i)).unwrap();
        }

        assert!(matches!(queue.dequeue(SHORT), Dequeued::TimedOut));
        assert_eq!(queue.len(), 5);

        queue.resume();
        for i in 0..5 {
            assert!(matches!(queue.dequeue(SHORT), Dequeued::Frame(f) if f.seq == i));
            queue.mark_played();
        }
    }

    #[test]
    fn resume_wakes_blocked_dequeue() {
        let queue = Arc::new(PlaybackQueue::new());
        queue.pause();
        queue.enqueue(frame(7)).unwrap();

        let q = queue.clone();
        let waiter = std::thread::spawn(move || q.dequeue(Duration::from_secs(10)));

        std::thread::sleep(Duration::from_millis(50));
        queue.resume();

        assert!(matches!(waiter.join().unwrap(), Dequeued::Frame(f) if f.seq == 7));
    }

    #[test]
    fn wait_idle_blocks_until_in_flight_completes() {
        let queue = Arc::new(PlaybackQueue::new());
        queue.enqueue(frame(0)).unwrap();
        assert!(matches!(queue.dequeue(SHORT), Dequeued::Frame(_)));

        // Queue is empty but the frame is mid-write.
        assert!(!queue.wait_idle_timeout(SHORT));
        assert!(queue.is_busy());

        let q = queue.clone();
        let waiter = std::thread::spawn(move || q.wait_idle());
        std::thread::sleep(Duration::from_millis(50));
        queue.mark_played();
        waiter.join().unwrap();
        assert!(!queue.is_busy());
    }

    #[test]
    fn enqueue_wakes_blocked_dequeue() {
        let queue = Arc::new(PlaybackQueue::new());
        let q = queue.clone();
        let waiter = std::thread::spawn(move || q.dequeue(Duration::from_secs(10)));

        std::thread::sleep(Duration::from_millis(50));
        queue.enqueue(frame(3)).unwrap();

        assert!(matches!(waiter.join().unwrap(), Dequeued::Frame(f) if f.seq == 3));
    }
}
