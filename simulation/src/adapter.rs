//! Scheduler-facing lifecycle adapter
//!
//! Turns subscriber start/stop signals into registry `join`/`leave` calls,
//! with the producer observing each change at the current simulated time.
//! No rate decisions are made here.

use std::collections::BTreeMap;

use icens_core::{
    IcensError, IdentityError, Producer, ProducerUpdate, RateEvent, RateEventKind, SimTime,
    Subscriber, SubscriberId, SubscriberRegistry,
};
use tracing::{info, trace};

/// Connects subscriber lifecycle signals to the registry
#[derive(Debug, Default)]
pub struct LifecycleAdapter {
    known: BTreeMap<SubscriberId, Subscriber>,
    registry: SubscriberRegistry,
    refreshes: BTreeMap<SubscriberId, u64>,
}

impl LifecycleAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber so later signals for its id can be resolved
    pub fn register(&mut self, subscriber: Subscriber) {
        self.known.insert(subscriber.id, subscriber);
    }

    pub fn known(&self, id: SubscriberId) -> Option<&Subscriber> {
        self.known.get(&id)
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// A subscriber started sending subscriptions
    pub fn notify_subscriber_active(
        &mut self,
        id: SubscriberId,
        now: SimTime,
        producer: &mut Producer,
    ) -> Result<ProducerUpdate, IcensError> {
        let subscriber = self
            .known
            .get(&id)
            .cloned()
            .ok_or(IdentityError::UnknownSubscriber(id))?;

        info!(
            subscriber = %id,
            node = %subscriber.node,
            rate = subscriber.desired_rate.hz(),
            mode = %subscriber.mode,
            time = %now,
            "subscriber joined"
        );
        Ok(self.registry.join(subscriber, &mut producer.at(now))?)
    }

    /// A subscriber stopped
    pub fn notify_subscriber_inactive(
        &mut self,
        id: SubscriberId,
        now: SimTime,
        producer: &mut Producer,
    ) -> Result<ProducerUpdate, IcensError> {
        let (subscriber, update) = self.registry.leave(id, &mut producer.at(now))?;
        info!(subscriber = %id, node = %subscriber.node, time = %now, "subscriber left");
        Ok(update)
    }

    /// Apply a recorded join/leave event
    pub fn apply(
        &mut self,
        event: RateEvent,
        producer: &mut Producer,
    ) -> Result<ProducerUpdate, IcensError> {
        match event.kind {
            RateEventKind::Join => self.notify_subscriber_active(event.subscriber, event.time, producer),
            RateEventKind::Leave => {
                self.notify_subscriber_inactive(event.subscriber, event.time, producer)
            }
        }
    }

    /// Periodic subscription retransmission
    ///
    /// Returns `true` when the subscriber is active and the refresh counts as
    /// a keep-alive. A refresh never joins an inactive subscriber.
    pub fn refresh(&mut self, id: SubscriberId, now: SimTime) -> bool {
        if !self.registry.contains(id) {
            trace!(subscriber = %id, time = %now, "refresh for inactive subscriber ignored");
            return false;
        }
        *self.refreshes.entry(id).or_insert(0) += 1;
        trace!(subscriber = %id, time = %now, "subscription refreshed");
        true
    }

    pub fn refresh_count(&self, id: SubscriberId) -> u64 {
        self.refreshes.get(&id).copied().unwrap_or(0)
    }
}
