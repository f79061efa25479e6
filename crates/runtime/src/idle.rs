//! Deferred background work with cancellation.
//!
//! Hosts differ in whether they expose native idle-period callbacks. The
//! choice is made once at startup through [`select_idle_scheduler`]; every
//! caller afterwards goes through the [`IdleScheduler`] trait.
//!
//! Properties shared by both implementations:
//! - Tasks run in scheduling order.
//! - A canceled task never runs.
//! - Nothing runs outside [`IdleScheduler::poll`], so the host's frame or
//!   timer callback decides when work happens.

use foundation::time::Time;
use tracing::debug;

pub type IdleTask = Box<dyn FnOnce() + Send>;

/// Handle returned by [`IdleScheduler::schedule`], used to cancel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdleHandle(pub u64);

/// One host callback worth of scheduling input.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HostTick {
    pub now: Time,
    /// Remaining idle time reported by a native idle callback, if any.
    pub idle_remaining_ms: Option<f64>,
}

impl HostTick {
    pub fn timer(now: Time) -> Self {
        Self {
            now,
            idle_remaining_ms: None,
        }
    }

    pub fn idle(now: Time, remaining_ms: f64) -> Self {
        Self {
            now,
            idle_remaining_ms: Some(remaining_ms),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct HostCapabilities {
    pub native_idle_callback: bool,
}

pub trait IdleScheduler: Send {
    fn schedule(&mut self, now: Time, task: IdleTask) -> IdleHandle;
    /// Returns `true` if the task was still pending.
    fn cancel(&mut self, handle: IdleHandle) -> bool;
    /// Runs whatever is due for this tick; returns how many tasks ran.
    fn poll(&mut self, tick: HostTick) -> usize;
    fn pending(&self) -> usize;
}

struct Pending {
    handle: IdleHandle,
    scheduled_at: Time,
    task: IdleTask,
}

#[derive(Default)]
struct PendingQueue {
    next_id: u64,
    items: Vec<Pending>,
}

impl PendingQueue {
    fn push(&mut self, now: Time, task: IdleTask) -> IdleHandle {
        let handle = IdleHandle(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.items.push(Pending {
            handle,
            scheduled_at: now,
            task,
        });
        handle
    }

    fn cancel(&mut self, handle: IdleHandle) -> bool {
        let before = self.items.len();
        self.items.retain(|p| p.handle != handle);
        before != self.items.len()
    }

    /// Removes (in order) and runs every pending task accepted by `due`.
    fn run_where(&mut self, mut due: impl FnMut(&Pending) -> bool) -> usize {
        let (ready, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.items).into_iter().partition(|p| due(p));
        self.items = waiting;
        let ran = ready.len();
        for p in ready {
            (p.task)();
        }
        ran
    }
}

/// Runs tasks during host-reported idle periods.
///
/// A task that has waited longer than `timeout_s` runs on the next poll even
/// without idle time, mirroring the timeout option of native idle callbacks.
pub struct NativeIdleScheduler {
    queue: PendingQueue,
    timeout_s: f64,
}

impl NativeIdleScheduler {
    pub fn new(timeout_s: f64) -> Self {
        Self {
            queue: PendingQueue::default(),
            timeout_s,
        }
    }
}

impl IdleScheduler for NativeIdleScheduler {
    fn schedule(&mut self, now: Time, task: IdleTask) -> IdleHandle {
        self.queue.push(now, task)
    }

    fn cancel(&mut self, handle: IdleHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn poll(&mut self, tick: HostTick) -> usize {
        let has_idle = tick.idle_remaining_ms.is_some_and(|ms| ms > 0.0);
        let timeout_s = self.timeout_s;
        self.queue
            .run_where(|p| has_idle || tick.now.since(p.scheduled_at) >= timeout_s)
    }

    fn pending(&self) -> usize {
        self.queue.items.len()
    }
}

/// Fallback for hosts without idle callbacks: run after a fixed delay.
pub struct DelayScheduler {
    queue: PendingQueue,
    delay_s: f64,
}

impl DelayScheduler {
    pub fn new(delay_s: f64) -> Self {
        Self {
            queue: PendingQueue::default(),
            delay_s,
        }
    }
}

impl IdleScheduler for DelayScheduler {
    fn schedule(&mut self, now: Time, task: IdleTask) -> IdleHandle {
        self.queue.push(now, task)
    }

    fn cancel(&mut self, handle: IdleHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn poll(&mut self, tick: HostTick) -> usize {
        let delay_s = self.delay_s;
        self.queue
            .run_where(|p| tick.now.since(p.scheduled_at) >= delay_s)
    }

    fn pending(&self) -> usize {
        self.queue.items.len()
    }
}

pub const IDLE_TIMEOUT_S: f64 = 2.0;
pub const FALLBACK_DELAY_S: f64 = 0.2;

pub fn select_idle_scheduler(caps: HostCapabilities) -> Box<dyn IdleScheduler> {
    if caps.native_idle_callback {
        debug!("using native idle scheduling");
        Box::new(NativeIdleScheduler::new(IDLE_TIMEOUT_S))
    } else {
        debug!("native idle callbacks unavailable, using fixed-delay fallback");
        Box::new(DelayScheduler::new(FALLBACK_DELAY_S))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{
        DelayScheduler, HostCapabilities, HostTick, IdleScheduler, NativeIdleScheduler,
        select_idle_scheduler,
    };
    use foundation::time::Time;

    fn counter_task(counter: &Arc<AtomicUsize>) -> super::IdleTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn native_runs_on_idle_time() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut s = NativeIdleScheduler::new(2.0);
        s.schedule(Time(0.0), counter_task(&hits));

        assert_eq!(s.poll(HostTick::timer(Time(0.1))), 0);
        assert_eq!(s.poll(HostTick::idle(Time(0.2), 12.0)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn native_runs_after_timeout_without_idle() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut s = NativeIdleScheduler::new(2.0);
        s.schedule(Time(0.0), counter_task(&hits));
        assert_eq!(s.poll(HostTick::idle(Time(1.0), 0.0)), 0);
        assert_eq!(s.poll(HostTick::timer(Time(2.0))), 1);
    }

    #[test]
    fn delay_runs_after_fixed_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut s = DelayScheduler::new(0.2);
        s.schedule(Time(1.0), counter_task(&hits));
        assert_eq!(s.poll(HostTick::timer(Time(1.1))), 0);
        assert_eq!(s.poll(HostTick::timer(Time(1.25))), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn canceled_task_never_runs() {
        for caps in [
            HostCapabilities {
                native_idle_callback: true,
            },
            HostCapabilities {
                native_idle_callback: false,
            },
        ] {
            let hits = Arc::new(AtomicUsize::new(0));
            let mut s = select_idle_scheduler(caps);
            let a = s.schedule(Time(0.0), counter_task(&hits));
            s.schedule(Time(0.0), counter_task(&hits));
            assert!(s.cancel(a));
            assert!(!s.cancel(a));

            s.poll(HostTick::idle(Time(10.0), 50.0));
            assert_eq!(hits.load(Ordering::SeqCst), 1);
            assert_eq!(s.pending(), 0);
        }
    }
}
