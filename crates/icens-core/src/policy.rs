//! Rate negotiation
//!
//! Maps a registry snapshot to the frequency the producer should publish at.
//! Policies are pure: the same snapshot and baseline always give the same
//! decision, and the decision never depends on join order.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::identity::SubscriberId;
use crate::registry::RegistrySnapshot;
use crate::types::Frequency;

/// Outcome of a policy evaluation
///
/// `hz` is left unvalidated so that a misbehaving policy can be detected by
/// the producer instead of being masked here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateDecision {
    /// Requested publish rate in packets per second
    pub hz: f64,
    /// Subscriber whose demand set the rate; `None` when the baseline applies
    pub driver: Option<SubscriberId>,
}

impl RateDecision {
    pub fn baseline(baseline: Frequency) -> Self {
        Self {
            hz: baseline.hz(),
            driver: None,
        }
    }
}

/// A pure mapping from active subscribers to a publish rate
pub trait RatePolicy: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    fn decide(&self, snapshot: &RegistrySnapshot, baseline: Frequency) -> RateDecision;
}

/// Serve the most demanding currently active subscriber
///
/// Soft and hard subscriptions count the same. Among subscribers tied at the
/// maximum rate the lowest id is reported as the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxRatePolicy;

impl RatePolicy for MaxRatePolicy {
    fn name(&self) -> &'static str {
        "max-rate"
    }

    fn decide(&self, snapshot: &RegistrySnapshot, baseline: Frequency) -> RateDecision {
        snapshot
            .subscribers()
            .max_by_key(|s| (s.desired_rate, Reverse(s.id)))
            .map(|s| RateDecision {
                hz: s.desired_rate.hz(),
                driver: Some(s.id),
            })
            .unwrap_or_else(|| RateDecision::baseline(baseline))
    }
}
