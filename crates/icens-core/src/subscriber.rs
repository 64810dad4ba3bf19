//! Subscriber model
//!
//! A subscriber is one demand source on a topic. It is created at scenario
//! setup with a fixed half-open activity interval and is never reactivated.

use serde::{Deserialize, Serialize};

use crate::identity::{NodeId, SubscriberId};
use crate::time::SimTime;
use crate::types::{Frequency, SubscriptionMode};

/// Half-open interval `[start, stop)` during which an application is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveInterval {
    start: SimTime,
    stop: SimTime,
}

impl ActiveInterval {
    /// Returns `None` unless `start < stop`
    pub fn new(start: SimTime, stop: SimTime) -> Option<Self> {
        (start < stop).then_some(Self { start, stop })
    }

    pub fn start(&self) -> SimTime {
        self.start
    }

    pub fn stop(&self) -> SimTime {
        self.stop
    }

    /// `start <= at < stop`
    pub fn contains(&self, at: SimTime) -> bool {
        self.start <= at && at < self.stop
    }
}

/// A subscriber instance and its declared demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    /// Host node; several subscribers may share one
    pub node: NodeId,
    /// Packets per second this subscriber asks for
    pub desired_rate: Frequency,
    pub mode: SubscriptionMode,
    pub interval: ActiveInterval,
}

impl Subscriber {
    pub fn new(
        id: SubscriberId,
        node: NodeId,
        desired_rate: Frequency,
        mode: SubscriptionMode,
        interval: ActiveInterval,
    ) -> Self {
        Self {
            id,
            node,
            desired_rate,
            mode,
            interval,
        }
    }

    /// Whether the subscriber should be in the registry at `at`
    pub fn is_active_at(&self, at: SimTime) -> bool {
        self.interval.contains(at)
    }
}
