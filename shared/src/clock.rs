//! Clock and timer abstraction
//!
//! Backoff sleeps and deferred activation both go through [`Clock`] so tests can
//! swap wall-clock time for [`ManualClock`] and get exactly reproducible timing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Callback fired when a scheduled timer elapses
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Time source capable of suspending and of scheduling cancellable callbacks
#[mockall::automock]
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant according to this clock
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);

    /// Run `callback` once after `delay` unless the returned handle is cancelled first
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Handle to a scheduled callback
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<tokio::task::AbortHandle>,
}

impl TimerHandle {
    /// Handle that is not backed by a task; cancellation only flips the flag
    pub fn detached() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    fn with_flag(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled, task: None }
    }

    /// Cancel the timer. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Wall-clock implementation backed by `tokio::time`.
///
/// Honours paused tokio time, so `tokio::time::advance` drives it in tests.
/// `schedule` spawns a task and must be called from within a Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl TokioClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                callback();
            }
        });

        TimerHandle {
            cancelled,
            task: Some(task.abort_handle()),
        }
    }
}

struct PendingTimer {
    deadline: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    callback: TimerCallback,
}

struct ManualState {
    origin: Instant,
    elapsed: Duration,
    next_seq: u64,
    timers: Vec<PendingTimer>,
    sleeps: Vec<Duration>,
}

/// Virtual clock for deterministic tests.
///
/// Time only moves through [`ManualClock::advance`] or [`Clock::sleep`]; a sleep
/// records its duration and advances virtual time immediately.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                next_seq: 0,
                timers: Vec::new(),
                sleeps: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Virtual time elapsed since construction
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Move virtual time forward, firing due timers in deadline order.
    ///
    /// Callbacks run without the clock's lock held, so they may schedule further
    /// timers; those fire too if they fall inside the advanced window.
    pub fn advance(&self, duration: Duration) {
        let target = self.lock().elapsed + duration;

        loop {
            let due = {
                let mut state = self.lock();
                state.timers.retain(|timer| !timer.cancelled.load(Ordering::SeqCst));
                let next = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.deadline <= target)
                    .min_by_key(|(_, timer)| (timer.deadline, timer.seq))
                    .map(|(index, _)| index);

                next.map(|index| {
                    let timer = state.timers.remove(index);
                    if timer.deadline > state.elapsed {
                        state.elapsed = timer.deadline;
                    }
                    timer
                })
            };

            match due {
                Some(timer) => {
                    if !timer.cancelled.load(Ordering::SeqCst) {
                        (timer.callback)();
                    }
                }
                None => break,
            }
        }

        self.lock().elapsed = target;
    }

    /// Every duration passed to `sleep`, in call order
    pub fn recorded_sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Number of scheduled timers that have neither fired nor been cancelled
    pub fn pending_timers(&self) -> usize {
        self.lock()
            .timers
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let state = self.lock();
        state.origin + state.elapsed
    }

    async fn sleep(&self, duration: Duration) {
        self.lock().sleeps.push(duration);
        self.advance(duration);
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = state.elapsed + delay;
        state.timers.push(PendingTimer {
            deadline,
            seq,
            cancelled: cancelled.clone(),
            callback,
        });

        TimerHandle::with_flag(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_callback(counter: &Arc<AtomicUsize>) -> TimerCallback {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_manual_clock_fires_due_timers_only() {
        let clock = ManualClock::new();
        let fired = Arc::new(AtomicUsize::new(0));

        clock.schedule(Duration::from_millis(50), counter_callback(&fired));
        clock.advance(Duration::from_millis(49));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(clock.pending_timers(), 1);

        clock.advance(Duration::from_millis(1));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(clock.pending_timers(), 0);
        assert_eq!(clock.elapsed(), Duration::from_millis(50));
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let clock = ManualClock::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = clock.schedule(Duration::from_millis(10), counter_callback(&fired));
        handle.cancel();
        handle.cancel();
        clock.advance(Duration::from_secs(1));

        assert!(handle.is_cancelled());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let clock = ManualClock::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, delay) in [("late", 30u64), ("early", 10), ("middle", 20)] {
            let order = order.clone();
            clock.schedule(
                Duration::from_millis(delay),
                Box::new(move || order.lock().unwrap().push(label)),
            );
        }
        clock.advance(Duration::from_millis(100));

        assert_eq!(*order.lock().unwrap(), vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_manual_sleep_records_and_advances() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.sleep(Duration::from_millis(100)).await;
        clock.sleep(Duration::from_millis(200)).await;

        assert_eq!(
            clock.recorded_sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert_eq!(clock.now() - start, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_schedule_and_cancel() {
        let clock = TokioClock::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let kept = clock.schedule(Duration::from_millis(50), counter_callback(&fired));
        let dropped = clock.schedule(Duration::from_millis(50), counter_callback(&fired));
        dropped.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!kept.is_cancelled());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
