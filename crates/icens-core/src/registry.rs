//! Active subscriber registry
//!
//! Holds exactly the subscribers whose activity interval contains the
//! current simulated time. The registry itself is time-free: callers decide
//! when to `join` and `leave`. Every successful mutation notifies a
//! [`RegistryObserver`] synchronously, before the call returns, with the
//! post-mutation snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;
use crate::identity::SubscriberId;
use crate::subscriber::Subscriber;

/// Receives membership changes from a [`SubscriberRegistry`]
///
/// Called exactly once per successful mutation. Never called when a
/// mutation fails.
pub trait RegistryObserver {
    /// What the observer reports back to the caller of `join`/`leave`
    type Output;

    fn on_membership_change(&mut self, snapshot: &RegistrySnapshot) -> Self::Output;
}

/// An observer that ignores notifications
impl RegistryObserver for () {
    type Output = ();

    fn on_membership_change(&mut self, _snapshot: &RegistrySnapshot) {}
}

/// A registry member together with its join position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSubscriber {
    pub subscriber: Subscriber,
    /// Monotonic join counter, unique per registry
    pub join_seq: u64,
}

/// Point-in-time view of the active set, ordered by join sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    members: Vec<ActiveSubscriber>,
}

impl RegistrySnapshot {
    pub fn members(&self) -> &[ActiveSubscriber] {
        &self.members
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &Subscriber> {
        self.members.iter().map(|m| &m.subscriber)
    }

    pub fn ids(&self) -> Vec<SubscriberId> {
        self.subscribers().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<Subscriber> for RegistrySnapshot {
    /// Build a snapshot directly, in iteration order (mainly for policy tests)
    fn from_iter<T: IntoIterator<Item = Subscriber>>(iter: T) -> Self {
        let members = iter
            .into_iter()
            .enumerate()
            .map(|(i, subscriber)| ActiveSubscriber {
                subscriber,
                join_seq: i as u64,
            })
            .collect();
        Self { members }
    }
}

/// The set of currently active subscribers for one topic
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    active: BTreeMap<SubscriberId, ActiveSubscriber>,
    next_join_seq: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `subscriber` as active and notify `observer`
    pub fn join<O>(
        &mut self,
        subscriber: Subscriber,
        observer: &mut O,
    ) -> Result<O::Output, RegistryError>
    where
        O: RegistryObserver + ?Sized,
    {
        let id = subscriber.id;
        if self.active.contains_key(&id) {
            return Err(RegistryError::DuplicateActiveSubscriber(id));
        }

        let join_seq = self.next_join_seq;
        self.next_join_seq += 1;
        self.active.insert(id, ActiveSubscriber { subscriber, join_seq });
        debug!(subscriber = %id, join_seq, active = self.active.len(), "registry join");

        Ok(observer.on_membership_change(&self.snapshot()))
    }

    /// Remove `id` and notify `observer`; returns the removed subscriber with
    /// the observer's output
    pub fn leave<O>(
        &mut self,
        id: SubscriberId,
        observer: &mut O,
    ) -> Result<(Subscriber, O::Output), RegistryError>
    where
        O: RegistryObserver + ?Sized,
    {
        let removed = self
            .active
            .remove(&id)
            .ok_or(RegistryError::UnknownActiveSubscriber(id))?;
        debug!(subscriber = %id, active = self.active.len(), "registry leave");

        let output = observer.on_membership_change(&self.snapshot());
        Ok((removed.subscriber, output))
    }

    /// Current active set in join order. No side effects.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut members: Vec<ActiveSubscriber> = self.active.values().cloned().collect();
        members.sort_by_key(|m| m.join_seq);
        RegistrySnapshot { members }
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn get(&self, id: SubscriberId) -> Option<&Subscriber> {
        self.active.get(&id).map(|m| &m.subscriber)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
