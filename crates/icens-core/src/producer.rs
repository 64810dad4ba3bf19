//! Producer emission-frequency state machine
//!
//! The producer decides *when* and *how fast* to publish; building and
//! sending the content is left to an [`EmissionSink`](crate::sink::EmissionSink).
//!
//! ## States
//!
//! - `Idle`: not started, stopped, or unsubscribed with
//!   `emit_when_unsubscribed` disabled. No emission is scheduled.
//! - `Emitting(f)`: one emission is pending at `next_emission`.
//!
//! A rate change never triggers a catch-up burst: the next emission is
//! placed one new period after the change. Outstanding emissions from
//! before a reschedule are invalidated by bumping `generation`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::FrequencyError;
use crate::identity::SubscriberId;
use crate::policy::{MaxRatePolicy, RateDecision, RatePolicy};
use crate::registry::{RegistryObserver, RegistrySnapshot};
use crate::time::SimTime;
use crate::types::{DataPayload, Frequency, Topic};

/// Static producer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerSettings {
    pub topic: Topic,
    /// Rate used while no subscriber is active
    pub baseline: Frequency,
    /// Size in bytes of each emitted payload
    pub payload_size: u32,
    /// Keep publishing at the baseline while nobody is subscribed
    pub emit_when_unsubscribed: bool,
}

impl ProducerSettings {
    pub fn new(topic: Topic, baseline: Frequency) -> Self {
        Self {
            topic,
            baseline,
            payload_size: 1024,
            emit_when_unsubscribed: true,
        }
    }
}

/// Observable producer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducerState {
    Idle,
    Emitting(Frequency),
}

/// A pending emission slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionSlot {
    pub at: SimTime,
    pub generation: u64,
}

/// Result of re-evaluating the negotiation policy
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerUpdate {
    pub previous: Frequency,
    pub current: Frequency,
    pub driver: Option<SubscriberId>,
    /// New emission slot to schedule, if the schedule changed
    pub reschedule: Option<EmissionSlot>,
    /// Set when the policy returned an unusable rate and the baseline was used
    pub error: Option<FrequencyError>,
}

impl ProducerUpdate {
    pub fn rate_changed(&self) -> bool {
        self.previous != self.current
    }
}

/// One emission the producer wants sent now
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub payload: DataPayload,
    pub frequency: Frequency,
    pub next: EmissionSlot,
}

/// Publishes on one topic at a rate derived from the active subscribers
#[derive(Debug)]
pub struct Producer {
    settings: ProducerSettings,
    policy: Box<dyn RatePolicy>,
    effective: Frequency,
    driver: Option<SubscriberId>,
    started: bool,
    has_subscribers: bool,
    generation: u64,
    next_emission: Option<SimTime>,
    sequence: u64,
    errors: Vec<FrequencyError>,
}

impl Producer {
    /// Create an idle producer using [`MaxRatePolicy`]
    pub fn new(settings: ProducerSettings) -> Self {
        Self::with_policy(settings, Box::new(MaxRatePolicy))
    }

    pub fn with_policy(settings: ProducerSettings, policy: Box<dyn RatePolicy>) -> Self {
        let effective = settings.baseline;
        Self {
            settings,
            policy,
            effective,
            driver: None,
            started: false,
            has_subscribers: false,
            generation: 0,
            next_emission: None,
            sequence: 0,
            errors: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ProducerSettings {
        &self.settings
    }

    pub fn topic(&self) -> &Topic {
        &self.settings.topic
    }

    pub fn baseline(&self) -> Frequency {
        self.settings.baseline
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Rate currently in force (the baseline while nobody is subscribed)
    pub fn effective_frequency(&self) -> Frequency {
        self.effective
    }

    /// Subscriber whose demand set the current rate
    pub fn driver(&self) -> Option<SubscriberId> {
        self.driver
    }

    pub fn state(&self) -> ProducerState {
        if self.is_emitting() {
            ProducerState::Emitting(self.effective)
        } else {
            ProducerState::Idle
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn next_emission(&self) -> Option<SimTime> {
        self.next_emission
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of emissions handed out so far
    pub fn emitted(&self) -> u64 {
        self.sequence
    }

    /// Invalid-frequency conditions seen so far
    pub fn errors(&self) -> &[FrequencyError] {
        &self.errors
    }

    fn is_emitting(&self) -> bool {
        self.started && (self.has_subscribers || self.settings.emit_when_unsubscribed)
    }

    /// Start publishing, negotiating against the current active set
    pub fn start(&mut self, now: SimTime, snapshot: &RegistrySnapshot) -> ProducerUpdate {
        if self.started {
            warn!(topic = %self.settings.topic, "producer already started");
        }
        let was_emitting = self.is_emitting();
        self.started = true;
        info!(topic = %self.settings.topic, time = %now, policy = self.policy.name(), "producer started");
        self.renegotiate(now, snapshot, was_emitting)
    }

    /// Stop publishing; any pending emission becomes stale
    pub fn stop(&mut self, now: SimTime) {
        self.started = false;
        self.invalidate_schedule();
        info!(topic = %self.settings.topic, time = %now, emitted = self.sequence, "producer stopped");
    }

    /// Bind the producer to the current time so it can observe a registry
    pub fn at(&mut self, now: SimTime) -> ProducerAt<'_> {
        ProducerAt { producer: self, now }
    }

    /// Re-run the policy against `snapshot` at time `now`
    pub fn evaluate(&mut self, now: SimTime, snapshot: &RegistrySnapshot) -> ProducerUpdate {
        let was_emitting = self.is_emitting();
        self.renegotiate(now, snapshot, was_emitting)
    }

    /// Apply the policy; `was_emitting` is the state before the triggering
    /// change, so a fresh start always gets its first slot
    fn renegotiate(
        &mut self,
        now: SimTime,
        snapshot: &RegistrySnapshot,
        was_emitting: bool,
    ) -> ProducerUpdate {
        let previous = self.effective;

        let decision = self.policy.decide(snapshot, self.settings.baseline);
        let (current, driver, error) = self.validate(decision);

        self.has_subscribers = !snapshot.is_empty();
        self.effective = current;
        self.driver = driver;

        let now_emitting = self.is_emitting();
        let mut reschedule = None;
        if now_emitting && (!was_emitting || previous != current) {
            reschedule = self.schedule_from(now);
        } else if !now_emitting && was_emitting {
            self.invalidate_schedule();
        }

        if previous != current {
            info!(
                topic = %self.settings.topic,
                time = %now,
                from = previous.hz(),
                to = current.hz(),
                driver = ?driver,
                active = snapshot.len(),
                "effective frequency changed"
            );
        } else {
            debug!(
                topic = %self.settings.topic,
                time = %now,
                hz = current.hz(),
                active = snapshot.len(),
                "effective frequency unchanged"
            );
        }

        ProducerUpdate {
            previous,
            current,
            driver,
            reschedule,
            error,
        }
    }

    /// Handle a due emission slot
    ///
    /// Returns `None` for stale slots (superseded generation, stopped or
    /// idle producer).
    pub fn on_emission_due(&mut self, now: SimTime, generation: u64) -> Option<Emission> {
        if generation != self.generation || !self.is_emitting() || self.next_emission != Some(now) {
            return None;
        }

        let payload = DataPayload {
            sequence: self.sequence,
            size: self.settings.payload_size,
        };
        self.sequence += 1;

        let next = match now.after_period(self.effective) {
            Ok(at) => at,
            Err(e) => {
                self.record_error(e);
                self.invalidate_schedule();
                return None;
            }
        };
        self.next_emission = Some(next);

        Some(Emission {
            payload,
            frequency: self.effective,
            next: EmissionSlot {
                at: next,
                generation: self.generation,
            },
        })
    }

    fn validate(
        &mut self,
        decision: RateDecision,
    ) -> (Frequency, Option<SubscriberId>, Option<FrequencyError>) {
        match Frequency::new(decision.hz) {
            Ok(frequency) => (frequency, decision.driver, None),
            Err(e) => {
                warn!(
                    topic = %self.settings.topic,
                    policy = self.policy.name(),
                    hz = decision.hz,
                    baseline = self.settings.baseline.hz(),
                    "policy returned an invalid frequency, falling back to baseline"
                );
                self.errors.push(e.clone());
                (self.settings.baseline, None, Some(e))
            }
        }
    }

    fn schedule_from(&mut self, now: SimTime) -> Option<EmissionSlot> {
        self.generation += 1;
        match now.after_period(self.effective) {
            Ok(at) => {
                self.next_emission = Some(at);
                Some(EmissionSlot {
                    at,
                    generation: self.generation,
                })
            }
            Err(e) => {
                self.record_error(e);
                self.next_emission = None;
                None
            }
        }
    }

    fn invalidate_schedule(&mut self) {
        self.generation += 1;
        self.next_emission = None;
    }

    fn record_error(&mut self, error: FrequencyError) {
        warn!(topic = %self.settings.topic, %error, "cannot schedule next emission");
        self.errors.push(error);
    }
}

/// A producer bound to a point in time, usable as a [`RegistryObserver`]
pub struct ProducerAt<'a> {
    producer: &'a mut Producer,
    now: SimTime,
}

impl RegistryObserver for ProducerAt<'_> {
    type Output = ProducerUpdate;

    fn on_membership_change(&mut self, snapshot: &RegistrySnapshot) -> ProducerUpdate {
        self.producer.evaluate(self.now, snapshot)
    }
}
