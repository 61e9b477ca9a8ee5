//! Timers for continuous execution.
//!
//! The tree never sleeps or spawns threads. It arms a periodic timer on a
//! [`Scheduler`] and asks it, through [`crate::BehaviorTree::pump`], how many
//! times the timer has fired since it last looked.

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

pub trait Scheduler {
    /// Starts a periodic timer firing every `interval`.
    fn arm(&mut self, interval: Duration) -> TimerId;

    /// Cancels a timer. Unknown ids are ignored.
    fn disarm(&mut self, timer: TimerId);

    /// Number of firings of `timer` that are due, consuming them.
    fn poll(&mut self, timer: TimerId) -> u32;
}

#[derive(Debug, Default)]
struct ManualState {
    next_id: u64,
    /// Armed timers with their interval and pending firings
    timers: HashMap<TimerId, (Duration, u32)>,
}

/// A scheduler whose timers fire only when told to.
///
/// Clones share the same timers, so a test can keep one handle and give the
/// other to the tree.
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler(Rc<RefCell<ManualState>>);

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires every armed timer once.
    pub fn fire(&self) {
        self.fire_n(1);
    }

    pub fn fire_n(&self, n: u32) {
        for (_, pending) in self.0.borrow_mut().timers.values_mut() {
            *pending += n;
        }
    }

    pub fn armed(&self) -> usize {
        self.0.borrow().timers.len()
    }

    /// Interval of the only armed timer, if exactly one is armed.
    pub fn interval(&self) -> Option<Duration> {
        let state = self.0.borrow();
        let mut timers = state.timers.values();
        match (timers.next(), timers.next()) {
            (Some((interval, _)), None) => Some(*interval),
            _ => None,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&mut self, interval: Duration) -> TimerId {
        let mut state = self.0.borrow_mut();
        let id = TimerId(state.next_id);
        state.next_id += 1;
        state.timers.insert(id, (interval, 0));
        id
    }

    fn disarm(&mut self, timer: TimerId) {
        self.0.borrow_mut().timers.remove(&timer);
    }

    fn poll(&mut self, timer: TimerId) -> u32 {
        self.0
            .borrow_mut()
            .timers
            .get_mut(&timer)
            .map_or(0, |(_, pending)| std::mem::take(pending))
    }
}

/// Wall clock scheduler. Firings that were missed between two polls are
/// reported all at once.
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    next_id: u64,
    timers: HashMap<TimerId, (Duration, Instant)>,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for IntervalScheduler {
    fn arm(&mut self, interval: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(id, (interval, Instant::now()));
        id
    }

    fn disarm(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
    }

    fn poll(&mut self, timer: TimerId) -> u32 {
        let Some((interval, last)) = self.timers.get_mut(&timer) else {
            return 0;
        };
        if interval.is_zero() {
            return 0;
        }
        let elapsed = last.elapsed();
        let due = (elapsed.as_nanos() / interval.as_nanos()).min(u32::MAX as u128) as u32;
        *last += *interval * due;
        due
    }
}
