//! Explicit timer handles for the session event loop
//!
//! Every periodic or delayed behaviour of the overlay (clock refresh, loading
//! progress, queue countdown, music fades, vote countdown) is a timer owned by
//! a single [`TimerSet`]. Timers are started when a state is entered and
//! cancelled when it is left. A cancelled timer is removed immediately, so it
//! can never fire afterwards, even when it was already due inside the same
//! [`TimerSet::pop_due`] batch.

use log::debug;
use std::collections::BTreeMap;

/// Opaque handle returned when a timer is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// What a timer drives when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Clock,
    LoadingProgress,
    ConnectGate,
    QueuePosition,
    QueueWait,
    Music,
    VoteCountdown,
}

#[derive(Debug, Clone)]
struct Timer {
    kind: TimerKind,
    due_ms: u64,
    period_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct TimerSet {
    timers: BTreeMap<TimerId, Timer>,
    next_id: u64,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a timer that fires every `period_ms`, first at `now_ms + period_ms`.
    pub fn start_interval(&mut self, kind: TimerKind, now_ms: u64, period_ms: u64) -> TimerId {
        assert!(period_ms > 0, "interval timers need a non-zero period");
        self.insert(kind, now_ms + period_ms, Some(period_ms))
    }

    /// Starts a timer that fires once at `now_ms + delay_ms`.
    pub fn start_once(&mut self, kind: TimerKind, now_ms: u64, delay_ms: u64) -> TimerId {
        self.insert(kind, now_ms + delay_ms, None)
    }

    fn insert(&mut self, kind: TimerKind, due_ms: u64, period_ms: Option<u64>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        debug!("Timer {:?} started for {:?}, due at {}ms", id, kind, due_ms);
        self.timers.insert(
            id,
            Timer {
                kind,
                due_ms,
                period_ms,
            },
        );
        id
    }

    /// Removes a timer. Returns false if the handle was not active.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let removed = self.timers.remove(&id);
        if let Some(timer) = &removed {
            debug!("Timer {:?} for {:?} cancelled", id, timer.kind);
        }
        removed.is_some()
    }

    /// Cancels the timer held in `slot`, leaving the slot empty.
    ///
    /// A handle that is no longer active means two owners believed they held
    /// the same timer, which is a bug in the caller.
    pub fn cancel_slot(&mut self, slot: &mut Option<TimerId>) {
        if let Some(id) = slot.take() {
            let removed = self.cancel(id);
            debug_assert!(removed, "timer {:?} was not active when cancelled", id);
        }
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Returns the earliest timer due at or before `until_ms`.
    ///
    /// Periodic timers are rescheduled one period later, one-shot timers are
    /// removed. Ties on the due time resolve in start order.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(TimerId, TimerKind, u64)> {
        let (id, due_ms) = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.due_ms <= until_ms)
            .min_by_key(|(id, timer)| (timer.due_ms, **id))
            .map(|(id, timer)| (*id, timer.due_ms))?;

        let timer = self.timers.get_mut(&id)?;
        let kind = timer.kind;
        if let Some(period) = timer.period_ms {
            timer.due_ms += period;
        } else {
            self.timers.remove(&id);
        }

        Some((id, kind, due_ms))
    }

    /// Time of the next firing, if any timer is active
    pub fn next_due(&self) -> Option<u64> {
        self.timers.values().map(|timer| timer.due_ms).min()
    }
}
