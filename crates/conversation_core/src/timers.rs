//! Scoped timer bookkeeping, thinking-delay jitter, and a virtual clock for deterministic runs.
//!
//! The engine never sleeps. It records timer requests here and a driver (the tokio runtime or
//! [`VirtualClock`]) hands them back through `StepEngine::fire` once they are due. Step-scoped
//! timers are released whenever Position or the active lane changes, so a late wake-up finds
//! nothing to claim.

use std::{collections::HashMap, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::domain::{CounterpartDecision, TimerId};

use crate::engine::StepEngine;

const IDLE_FIRE_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Thinking,
    Waiting,
    UserLine,
    /// Scheduled by the invite rule at `origin`; survives step changes.
    InvitesSent { origin: usize },
    CounterpartReply(CounterpartDecision),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub id: TimerId,
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerScope {
    Step,
    Run,
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    kind: TimerKind,
    scope: TimerScope,
}

#[derive(Debug, Default)]
pub struct TimerBook {
    next_id: u64,
    pending: HashMap<TimerId, PendingTimer>,
    scheduled: Vec<TimerRequest>,
}

impl TimerBook {
    pub fn schedule_step(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        self.schedule(kind, TimerScope::Step, delay)
    }

    pub fn schedule_run(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        self.schedule(kind, TimerScope::Run, delay)
    }

    fn schedule(&mut self, kind: TimerKind, scope: TimerScope, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert(id, PendingTimer { kind, scope });
        self.scheduled.push(TimerRequest { id, delay });
        id
    }

    /// Drops every step-scoped timer. Returns how many were live.
    pub fn release_step(&mut self) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, timer| timer.scope != TimerScope::Step);
        let pending = &self.pending;
        self.scheduled.retain(|request| pending.contains_key(&request.id));
        before - self.pending.len()
    }

    pub fn release_all(&mut self) -> usize {
        let released = self.pending.len();
        self.pending.clear();
        self.scheduled.clear();
        released
    }

    /// Removes and returns the timer if it is still owned.
    pub fn claim(&mut self, id: TimerId) -> Option<TimerKind> {
        self.pending.remove(&id).map(|timer| timer.kind)
    }

    pub fn take_scheduled(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.scheduled)
    }

    pub fn is_live(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.pending.len()
    }
}

/// Source of the random component added to thinking delays.
pub trait JitterSource: Send {
    fn thinking_jitter(&mut self, bound: Duration) -> Duration;
}

pub struct NoJitter;

impl JitterSource for NoJitter {
    fn thinking_jitter(&mut self, _bound: Duration) -> Duration {
        Duration::ZERO
    }
}

pub struct SeededJitter {
    rng: StdRng,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl JitterSource for SeededJitter {
    fn thinking_jitter(&mut self, bound: Duration) -> Duration {
        let bound_ms = bound.as_millis() as u64;
        if bound_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.gen_range(0..bound_ms))
    }
}

/// Deterministic driver: keeps its own notion of "now" and fires engine timers in due order.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Duration,
    seq: u64,
    queue: Vec<(Duration, u64, TimerId)>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn enqueue(&mut self, engine: &mut StepEngine) {
        for request in engine.take_scheduled() {
            self.seq += 1;
            self.queue.push((self.now + request.delay, self.seq, request.id));
        }
    }

    fn pop_due(&mut self, deadline: Option<Duration>) -> Option<(Duration, TimerId)> {
        let (index, &(due, _, id)) = self
            .queue
            .iter()
            .enumerate()
            .min_by_key(|(_, (due, seq, _))| (*due, *seq))?;
        if deadline.is_some_and(|deadline| due > deadline) {
            return None;
        }
        self.queue.swap_remove(index);
        Some((due, id))
    }

    /// Moves time forward by `by`, firing every timer that falls due on the way. Returns the
    /// number of timers the engine accepted.
    pub fn advance(&mut self, engine: &mut StepEngine, by: Duration) -> usize {
        let deadline = self.now + by;
        let mut fired = 0;
        loop {
            self.enqueue(engine);
            let Some((due, id)) = self.pop_due(Some(deadline)) else {
                break;
            };
            self.now = due;
            if engine.fire(id) {
                fired += 1;
            }
        }
        self.now = deadline;
        fired
    }

    /// Fires timers until none are left, i.e. the engine waits on outside input.
    pub fn run_until_idle(&mut self, engine: &mut StepEngine) -> usize {
        let mut fired = 0;
        for _ in 0..IDLE_FIRE_LIMIT {
            self.enqueue(engine);
            let Some((due, id)) = self.pop_due(None) else {
                break;
            };
            self.now = self.now.max(due);
            if engine.fire(id) {
                fired += 1;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_step_keeps_run_scoped_timers() {
        let mut book = TimerBook::default();
        let thinking = book.schedule_step(TimerKind::Thinking, Duration::from_millis(10));
        let invites = book.schedule_run(
            TimerKind::InvitesSent { origin: 3 },
            Duration::from_millis(2000),
        );

        assert_eq!(book.release_step(), 1);
        assert!(!book.is_live(thinking));
        assert!(book.is_live(invites));
        assert_eq!(
            book.take_scheduled()
                .into_iter()
                .map(|request| request.id)
                .collect::<Vec<_>>(),
            vec![invites]
        );
        assert_eq!(book.claim(thinking), None);
        assert_eq!(
            book.claim(invites),
            Some(TimerKind::InvitesSent { origin: 3 })
        );
        assert_eq!(book.live_count(), 0);
    }

    #[test]
    fn seeded_jitter_is_reproducible_and_bounded() {
        let bound = Duration::from_millis(1000);
        let mut a = SeededJitter::new(7);
        let mut b = SeededJitter::new(7);
        for _ in 0..32 {
            let left = a.thinking_jitter(bound);
            assert_eq!(left, b.thinking_jitter(bound));
            assert!(left < bound);
        }
        assert_eq!(a.thinking_jitter(Duration::ZERO), Duration::ZERO);
    }
}
