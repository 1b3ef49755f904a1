//! Cancellable scheduled tasks keyed by connection id.
//!
//! Time is always passed in by the caller, so the server loop decides when a
//! task is due and tests can step the clock without sleeping.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Task {
    due: Instant,
    period: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct TaskScheduler {
    tasks: HashMap<u32, Task>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires once at `due`. Replaces any task already held for `id`.
    pub fn schedule_once(&mut self, id: u32, due: Instant) {
        self.tasks.insert(id, Task { due, period: None });
    }

    /// Fires every `period`, first at `start + period`.
    pub fn schedule_every(&mut self, id: u32, start: Instant, period: Duration) {
        self.tasks.insert(
            id,
            Task {
                due: start + period,
                period: Some(period),
            },
        );
    }

    /// Returns true if a task was pending.
    pub fn cancel(&mut self, id: u32) -> bool {
        self.tasks.remove(&id).is_some()
    }

    pub fn is_pending(&self, id: u32) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Collects every task due at `now`, sorted by id.
    ///
    /// One-shot tasks are removed. Repeating tasks fire at most once per call
    /// and are rescheduled one period after `now` if they fell behind.
    pub fn due(&mut self, now: Instant) -> Vec<u32> {
        let mut fired = Vec::new();

        self.tasks.retain(|id, task| {
            if task.due > now {
                return true;
            }
            fired.push(*id);
            match task.period {
                Some(period) => {
                    task.due += period;
                    if task.due <= now {
                        task.due = now + period;
                    }
                    true
                }
                None => false,
            }
        });

        fired.sort_unstable();
        fired
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
