//! Deterministic event scheduler
//!
//! A `BinaryHeap` with reversed ordering acts as a min-heap keyed by
//! `(time, phase, seq)`:
//!
//! - `time`: simulated dispatch time
//! - `phase`: fixed rank per event kind, so that at one instant stops run
//!   before starts (half-open activity intervals) and emissions run last
//! - `seq`: strictly increasing insertion counter
//!
//! Two runs that schedule the same events in the same order always dispatch
//! them in the same order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use icens_core::{SimTime, SubscriberId};
use thiserror::Error;

/// Errors raised by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Cannot schedule event at {requested} when current time is {current}")]
    NonCausal { requested: SimTime, current: SimTime },
}

/// Everything that can happen in a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimEvent {
    /// Subscriber reaches its stop time
    SubscriberStop(SubscriberId),
    /// Producer reaches its stop time
    ProducerStop,
    /// Producer reaches its start time
    ProducerStart,
    /// Subscriber reaches its start time
    SubscriberStart(SubscriberId),
    /// Periodic subscription interest retransmission
    SubscriptionRefresh(SubscriberId),
    /// A producer emission slot; stale once the generation moves on
    Emission { generation: u64 },
}

impl SimEvent {
    /// Tie-break rank among events at the same instant
    pub fn phase(&self) -> u8 {
        match self {
            SimEvent::SubscriberStop(_) => 0,
            SimEvent::ProducerStop => 1,
            SimEvent::ProducerStart => 2,
            SimEvent::SubscriberStart(_) => 3,
            SimEvent::SubscriptionRefresh(_) => 4,
            SimEvent::Emission { .. } => 5,
        }
    }
}

impl std::fmt::Display for SimEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimEvent::SubscriberStop(id) => write!(f, "Stop({})", id),
            SimEvent::ProducerStop => write!(f, "ProducerStop"),
            SimEvent::ProducerStart => write!(f, "ProducerStart"),
            SimEvent::SubscriberStart(id) => write!(f, "Start({})", id),
            SimEvent::SubscriptionRefresh(id) => write!(f, "Refresh({})", id),
            SimEvent::Emission { generation } => write!(f, "Emit(g{})", generation),
        }
    }
}

/// An event placed on the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub seq: u64,
    pub at: SimTime,
    pub event: SimEvent,
}

impl ScheduledEvent {
    fn key(&self) -> (SimTime, u8, u64) {
        (self.at, self.event.phase(), self.seq)
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-clock discrete-event scheduler
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
    now: SimTime,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time (time of the last dispatched event)
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` at `at`; returns its sequence number
    pub fn schedule(&mut self, at: SimTime, event: SimEvent) -> Result<u64, SchedulerError> {
        if at < self.now {
            return Err(SchedulerError::NonCausal {
                requested: at,
                current: self.now,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledEvent { seq, at, event });
        Ok(seq)
    }

    /// Time of the next event, if any
    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|e| e.at)
    }

    /// Pop the next event and advance the clock to it
    pub fn pop_next(&mut self) -> Option<ScheduledEvent> {
        let event = self.queue.pop()?;
        debug_assert!(event.at >= self.now, "time went backward");
        self.now = event.at;
        Some(event)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drain all events in dispatch order without advancing the clock
    #[cfg(test)]
    fn drain_ordered(&mut self) -> Vec<ScheduledEvent> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.queue.pop() {
            events.push(e);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(id: u32) -> SubscriberId {
        SubscriberId::new(id)
    }

    #[test]
    fn test_time_ordering() {
        let mut sched = Scheduler::new();
        sched.schedule(SimTime::from_secs(8), SimEvent::SubscriberStart(s(3))).unwrap();
        sched.schedule(SimTime::from_secs(1), SimEvent::SubscriberStart(s(1))).unwrap();
        sched.schedule(SimTime::from_secs(5), SimEvent::SubscriberStart(s(2))).unwrap();

        let times: Vec<SimTime> = sched.drain_ordered().into_iter().map(|e| e.at).collect();
        assert_eq!(
            times,
            vec![SimTime::from_secs(1), SimTime::from_secs(5), SimTime::from_secs(8)]
        );
    }

    #[test]
    fn test_fifo_within_same_phase() {
        let mut sched = Scheduler::new();
        let at = SimTime::from_secs(12);
        sched.schedule(at, SimEvent::SubscriberStart(s(5))).unwrap();
        sched.schedule(at, SimEvent::SubscriberStart(s(4))).unwrap();

        let events = sched.drain_ordered();
        assert_eq!(events[0].event, SimEvent::SubscriberStart(s(5)));
        assert_eq!(events[1].event, SimEvent::SubscriberStart(s(4)));
    }

    #[test]
    fn test_stops_run_before_starts_at_same_instant() {
        let mut sched = Scheduler::new();
        let at = SimTime::from_secs(5);
        sched.schedule(at, SimEvent::Emission { generation: 1 }).unwrap();
        sched.schedule(at, SimEvent::SubscriberStart(s(2))).unwrap();
        sched.schedule(at, SimEvent::ProducerStart).unwrap();
        sched.schedule(at, SimEvent::SubscriberStop(s(1))).unwrap();
        sched.schedule(at, SimEvent::ProducerStop).unwrap();

        let order: Vec<SimEvent> = sched.drain_ordered().into_iter().map(|e| e.event).collect();
        assert_eq!(
            order,
            vec![
                SimEvent::SubscriberStop(s(1)),
                SimEvent::ProducerStop,
                SimEvent::ProducerStart,
                SimEvent::SubscriberStart(s(2)),
                SimEvent::Emission { generation: 1 },
            ]
        );
    }

    #[test]
    fn test_pop_advances_clock_and_rejects_past() {
        let mut sched = Scheduler::new();
        sched.schedule(SimTime::from_secs(3), SimEvent::ProducerStart).unwrap();
        let event = sched.pop_next().unwrap();
        assert_eq!(event.at, SimTime::from_secs(3));
        assert_eq!(sched.now(), SimTime::from_secs(3));

        let err = sched.schedule(SimTime::from_secs(2), SimEvent::ProducerStop).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::NonCausal {
                requested: SimTime::from_secs(2),
                current: SimTime::from_secs(3),
            }
        );
        // Scheduling at the current instant is allowed
        assert!(sched.schedule(SimTime::from_secs(3), SimEvent::ProducerStop).is_ok());
    }

    #[test]
    fn test_determinism_across_runs() {
        fn build() -> Vec<ScheduledEvent> {
            let mut sched = Scheduler::new();
            sched.schedule(SimTime::from_secs(5), SimEvent::SubscriberStart(s(1))).unwrap();
            sched.schedule(SimTime::from_secs(3), SimEvent::ProducerStart).unwrap();
            sched.schedule(SimTime::from_secs(5), SimEvent::SubscriberStop(s(2))).unwrap();
            sched.schedule(SimTime::from_secs(1), SimEvent::Emission { generation: 0 }).unwrap();
            sched.drain_ordered()
        }

        assert_eq!(build(), build());
    }
}
