//! One-shot and repeating delayed actions on the single simulation thread.
//!
//! Multi-step sequences (cast, travel, impact, next phase) are chains of tasks rather
//! than blocking calls. Each task carries the [`Guard`] of the scene that scheduled it
//! plus its own cancellation flag; the scheduler checks both before invoking it, so a
//! task left behind by a torn-down scene is dropped instead of run.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::constants::MAX_TUNING_DURATION;
use crate::lifecycle::Guard;

/// Repeating tasks never fire more often than this, so one `advance` always terminates.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Converts floating-point seconds to a delay. Negative and NaN become zero, values
/// too large for a `Duration` saturate to `Duration::MAX`.
pub fn delay_from_secs(seconds: f32) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(seconds).unwrap_or(Duration::MAX)
}

struct Task {
    label: &'static str,
    guard: Guard,
    cancelled: Rc<Cell<bool>>,
    interval: Option<Duration>,
    action: Box<dyn FnMut()>,
}

struct Queue {
    now: Duration,
    next_id: u64,
    /// Keyed by due time, then insertion order, so ties run in the order they were scheduled.
    tasks: BTreeMap<(Duration, u64), Task>,
}

/// Cancellation handle for a scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    cancelled: Rc<Cell<bool>>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Prevents the task from running again. Cancelling twice is harmless.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// A handle to the shared task queue. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler {
    queue: Rc<RefCell<Queue>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("Scheduler")
            .field("now", &queue.now)
            .field("queued", &queue.tasks.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(Queue {
                now: Duration::ZERO,
                next_id: 0,
                tasks: BTreeMap::new(),
            })),
        }
    }

    /// Current scheduler time, i.e. the sum of every `advance` so far.
    pub fn now(&self) -> Duration {
        self.queue.borrow().now
    }

    /// Runs `action` once, `delay` from now, if `guard` is still alive by then.
    pub fn after<F>(&self, delay: Duration, guard: Guard, label: &'static str, action: F) -> TaskHandle
    where
        F: FnOnce() + 'static,
    {
        let mut action = Some(action);
        self.insert(delay, None, guard, label, move || {
            if let Some(action) = action.take() {
                action();
            }
        })
    }

    /// Runs `action` every `interval` until cancelled or until `guard` dies.
    pub fn every<F>(&self, interval: Duration, guard: Guard, label: &'static str, action: F) -> TaskHandle
    where
        F: FnMut() + 'static,
    {
        let interval = interval.max(MIN_INTERVAL);
        self.insert(interval, Some(interval), guard, label, action)
    }

    fn insert<F>(&self, delay: Duration, interval: Option<Duration>, guard: Guard, label: &'static str, action: F) -> TaskHandle
    where
        F: FnMut() + 'static,
    {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        let due = queue.now.saturating_add(delay);
        let cancelled = Rc::new(Cell::new(false));
        queue.tasks.insert(
            (due, id),
            Task {
                label,
                guard,
                cancelled: Rc::clone(&cancelled),
                interval,
                action: Box::new(action),
            },
        );
        trace!(id, label, due = ?due, "Task scheduled");
        TaskHandle { id, cancelled }
    }

    /// Advances time by `dt`, running every task that falls due, in due-time order.
    ///
    /// Tasks scheduled by a running task are eligible in the same call if they fall due
    /// before the new time. Returns how many tasks ran.
    pub fn advance(&self, dt: Duration) -> usize {
        let target = self.now().saturating_add(dt);
        let mut ran = 0;

        loop {
            let entry = {
                let mut queue = self.queue.borrow_mut();
                let due_now = queue.tasks.first_key_value().is_some_and(|(&(due, _), _)| due <= target);
                if due_now {
                    queue.tasks.pop_first()
                } else {
                    None
                }
            };
            let Some(((due, id), mut task)) = entry else {
                break;
            };

            self.queue.borrow_mut().now = due;

            if task.cancelled.get() {
                trace!(id, label = task.label, "Skipping cancelled task");
                continue;
            }
            if !task.guard.is_alive() {
                debug!(id, label = task.label, "Dropping task whose owner was torn down");
                continue;
            }

            // The queue is not borrowed here, so the action may schedule more work.
            (task.action)();
            ran += 1;

            if let Some(interval) = task.interval {
                if !task.cancelled.get() && task.guard.is_alive() {
                    match due.checked_add(interval) {
                        Some(next) => {
                            self.queue.borrow_mut().tasks.insert((next, id), task);
                        }
                        None => debug!(id, label = task.label, "Repeating task ran out of time range, dropping it"),
                    }
                }
            }
        }

        self.queue.borrow_mut().now = target;
        ran
    }

    /// Convenience for hosts that track frame time as floating-point seconds.
    ///
    /// Non-finite frame times are ignored and a single step never exceeds
    /// [`MAX_TUNING_DURATION`].
    pub fn advance_secs(&self, seconds: f32) -> usize {
        if !seconds.is_finite() {
            warn!(seconds, "Ignoring non-finite frame time");
            return 0;
        }
        self.advance(delay_from_secs(seconds.min(MAX_TUNING_DURATION)))
    }

    /// Number of queued tasks that could still run.
    pub fn pending(&self) -> usize {
        self.queue
            .borrow()
            .tasks
            .values()
            .filter(|task| !task.cancelled.get() && task.guard.is_alive())
            .count()
    }

    /// Drops cancelled tasks and tasks whose owner is gone. Returns how many were removed.
    pub fn purge(&self) -> usize {
        let mut queue = self.queue.borrow_mut();
        let before = queue.tasks.len();
        queue.tasks.retain(|_, task| !task.cancelled.get() && task.guard.is_alive());
        before - queue.tasks.len()
    }
}

/// The cancellable tasks owned by one scene.
#[derive(Debug, Default)]
pub struct TaskSet {
    handles: Vec<TaskHandle>,
}

impl TaskSet {
    pub fn track(&mut self, handle: TaskHandle) {
        // Forget handles that already ran or were cancelled so the set does not grow unbounded.
        self.handles.retain(|handle| !handle.is_cancelled() && Rc::strong_count(&handle.cancelled) > 1);
        self.handles.push(handle);
    }

    /// Cancels every tracked task. Returns how many were still queued.
    pub fn cancel_all(&mut self) -> usize {
        let live = self
            .handles
            .iter()
            .filter(|handle| !handle.is_cancelled() && Rc::strong_count(&handle.cancelled) > 1)
            .count();
        for handle in self.handles.drain(..) {
            handle.cancel();
        }
        live
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
