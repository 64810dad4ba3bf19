//! Rate events
//!
//! The ordered sequence of join/leave records is the sole driver of
//! producer state changes. Same-time events are legal.

use serde::{Deserialize, Serialize};

use crate::identity::SubscriberId;
use crate::time::SimTime;

/// Kind of membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateEventKind {
    Join,
    Leave,
}

impl std::fmt::Display for RateEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateEventKind::Join => write!(f, "join"),
            RateEventKind::Leave => write!(f, "leave"),
        }
    }
}

/// One membership change at a point in simulated time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateEvent {
    pub time: SimTime,
    pub subscriber: SubscriberId,
    pub kind: RateEventKind,
}

impl RateEvent {
    pub fn join(time: SimTime, subscriber: SubscriberId) -> Self {
        Self {
            time,
            subscriber,
            kind: RateEventKind::Join,
        }
    }

    pub fn leave(time: SimTime, subscriber: SubscriberId) -> Self {
        Self {
            time,
            subscriber,
            kind: RateEventKind::Leave,
        }
    }
}

impl std::fmt::Display for RateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} {}", self.time, self.subscriber, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let event = RateEvent::join(SimTime::from_secs(5), SubscriberId::new(2));
        assert_eq!(event.to_string(), "[5.000s] S2 join");
    }

    #[test]
    fn test_serde_kind_lowercase() {
        let json = serde_json::to_string(&RateEventKind::Leave).unwrap();
        assert_eq!(json, "\"leave\"");
    }
}
