use std::time::Duration;

use tokio::time::Instant;

use crate::actor::messages::WatchEvent;

/// Far-future sleep used while nothing is armed.
const IDLE_SLEEP: Duration = Duration::from_secs(86400);

/// Pending state of the coalescer.
#[derive(Debug)]
pub(super) enum Pending {
    Idle,
    Armed { deadline: Instant, event: WatchEvent },
}

/// Pure debouncer: owned by the detector task, never shared.
///
/// Every qualifying event replaces the pending one and pushes the deadline
/// out to `now + window`. When the deadline passes with no newer event the
/// last event is handed off exactly once.
#[derive(Debug)]
pub(super) struct Debouncer {
    window: Duration,
    pub(super) pending: Pending,
}

impl Debouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Pending::Idle,
        }
    }

    /// Arm (or re-arm) with `event`. Last write wins.
    pub(super) fn arm(&mut self, event: WatchEvent, now: Instant) {
        if let Pending::Armed { event: prev, .. } = &self.pending {
            crate::debug!("watch"; "debounce reset: {} replaces {}", event.path.display(), prev.path.display());
        }
        self.pending = Pending::Armed {
            deadline: now + self.window,
            event,
        };
    }

    pub(super) fn is_armed(&self) -> bool {
        matches!(self.pending, Pending::Armed { .. })
    }

    pub(super) fn deadline(&self) -> Option<Instant> {
        match &self.pending {
            Pending::Armed { deadline, .. } => Some(*deadline),
            Pending::Idle => None,
        }
    }

    /// Instant to sleep until; far in the future while idle.
    pub(super) fn sleep_deadline(&self, now: Instant) -> Instant {
        self.deadline().unwrap_or(now + IDLE_SLEEP)
    }

    /// Take the pending event if its deadline has passed, returning to idle.
    pub(super) fn take_if_due(&mut self, now: Instant) -> Option<WatchEvent> {
        match self.deadline() {
            Some(deadline) if deadline <= now => {}
            _ => return None,
        }

        match std::mem::replace(&mut self.pending, Pending::Idle) {
            Pending::Armed { event, .. } => Some(event),
            Pending::Idle => None,
        }
    }
}
