//! Per-question countdown timers.
//!
//! The engine arms a timer with a generation number; a firing only counts if
//! its generation is still the armed one, so late or duplicate firings are
//! ignored.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Notification that the timer armed with `generation` ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
}

/// Schedules countdowns on behalf of the session engine.
pub trait TimerScheduler: Send + Sync {
    fn schedule(&self, generation: u64, duration: Duration);
    /// Best-effort; a firing that races the cancel is fenced out anyway.
    fn cancel(&self, generation: u64);
}

/// Timers backed by tokio tasks. Firings arrive on the returned receiver.
pub struct TokioTimer {
    tx: mpsc::UnboundedSender<TimerFired>,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl TokioTimer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timer = Self {
            tx,
            tasks: Mutex::new(HashMap::new()),
        };
        (timer, rx)
    }
}

impl TimerScheduler for TokioTimer {
    fn schedule(&self, generation: u64, duration: Duration) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(generation, "no runtime, question timer not started");
            return;
        };
        let tx = self.tx.clone();
        let task = handle.spawn(async move {
            tokio::time::sleep(duration).await;
            // Receiver gone means nobody is listening any more
            let _ = tx.send(TimerFired { generation });
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, t| !t.is_finished());
        tasks.insert(generation, task);
    }

    fn cancel(&self, generation: u64) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = tasks.remove(&generation) {
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in tasks.drain() {
            task.abort();
        }
    }
}

/// A scheduler that never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTimer;

impl TimerScheduler for NoopTimer {
    fn schedule(&self, _: u64, _: Duration) {}
    fn cancel(&self, _: u64) {}
}

/// Records schedule/cancel calls; tests fire timers by hand.
#[derive(Debug, Default)]
pub struct ManualTimer {
    calls: Mutex<ManualTimerCalls>,
}

#[derive(Debug, Default, Clone)]
pub struct ManualTimerCalls {
    pub scheduled: Vec<(u64, Duration)>,
    pub cancelled: Vec<u64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> ManualTimerCalls {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recently scheduled timer that has not been cancelled.
    pub fn pending(&self) -> Option<TimerFired> {
        let calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls
            .scheduled
            .iter()
            .rev()
            .map(|(generation, _)| *generation)
            .find(|g| !calls.cancelled.contains(g))
            .map(|generation| TimerFired { generation })
    }
}

impl TimerScheduler for ManualTimer {
    fn schedule(&self, generation: u64, duration: Duration) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.scheduled.push((generation, duration));
    }

    fn cancel(&self, generation: u64) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.cancelled.push(generation);
    }
}

/// Generation counter guarding timer firings.
#[derive(Debug, Default, Clone)]
pub struct TimerFence {
    generation: u64,
    armed: Option<u64>,
}

impl TimerFence {
    /// Arm a new generation, superseding any previous one.
    pub fn arm(&mut self) -> u64 {
        self.generation += 1;
        self.armed = Some(self.generation);
        self.generation
    }

    /// Disarm, returning the generation that was armed.
    pub fn disarm(&mut self) -> Option<u64> {
        self.armed.take()
    }

    pub fn armed(&self) -> Option<u64> {
        self.armed
    }

    /// Accept a firing if it belongs to the armed generation. Accepting
    /// disarms the fence, so the same firing is never accepted twice.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        if self.armed == Some(fired.generation) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_rejects_stale_and_duplicate_firings() {
        let mut fence = TimerFence::default();
        let first = fence.arm();
        let second = fence.arm();
        assert!(!fence.accept(TimerFired { generation: first }));
        assert!(fence.accept(TimerFired { generation: second }));
        assert!(!fence.accept(TimerFired { generation: second }));
        assert_eq!(fence.armed(), None);
    }

    #[test]
    fn disarmed_fence_accepts_nothing() {
        let mut fence = TimerFence::default();
        let generation = fence.arm();
        assert_eq!(fence.disarm(), Some(generation));
        assert!(!fence.accept(TimerFired { generation }));
    }

    #[test]
    fn manual_timer_tracks_pending() {
        let timer = ManualTimer::new();
        timer.schedule(1, Duration::from_secs(30));
        timer.schedule(2, Duration::from_secs(30));
        timer.cancel(2);
        assert_eq!(timer.pending(), Some(TimerFired { generation: 1 }));
        timer.cancel(1);
        assert_eq!(timer.pending(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timer_fires_after_duration() {
        let (timer, mut rx) = TokioTimer::new();
        timer.schedule(7, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(rx.try_recv().is_err());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, TimerFired { generation: 7 });
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_tokio_timer_stays_quiet() {
        let (timer, mut rx) = TokioTimer::new();
        timer.schedule(1, Duration::from_secs(5));
        timer.schedule(2, Duration::from_secs(10));
        timer.cancel(1);

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.generation, 2);
        assert!(rx.try_recv().is_err());
    }
}
