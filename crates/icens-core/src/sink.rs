//! Emission collaborator
//!
//! The transport that actually delivers data is outside this crate. The
//! producer only needs a way to hand off one unit of content at the time it
//! decided on; [`EmissionSink`] is that seam.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::TransportError;
use crate::identity::NodeId;
use crate::time::SimTime;
use crate::types::{DataPayload, Frequency, Topic};

/// Sends one unit of published content
pub trait EmissionSink {
    fn emit_once(
        &mut self,
        now: SimTime,
        from: NodeId,
        topic: &Topic,
        payload: DataPayload,
        frequency: Frequency,
    ) -> Result<(), TransportError>;
}

/// A single recorded emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub time: SimTime,
    pub from: NodeId,
    pub topic: Topic,
    pub payload: DataPayload,
    /// Rate in force when the emission was made
    pub frequency: Frequency,
}

/// In-memory sink that records every emission
///
/// Optionally restricted to one topic, in which case emissions on any other
/// topic are rejected with [`TransportError::UnknownTopic`].
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    topic: Option<Topic>,
    records: Vec<EmissionRecord>,
    per_node: BTreeMap<NodeId, u64>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept emissions on `topic`
    pub fn for_topic(topic: Topic) -> Self {
        Self {
            topic: Some(topic),
            ..Self::default()
        }
    }

    pub fn records(&self) -> &[EmissionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Emission count per sending node
    pub fn counts_by_node(&self) -> &BTreeMap<NodeId, u64> {
        &self.per_node
    }

    /// Emission times within `[from, to)`
    pub fn times_between(&self, from: SimTime, to: SimTime) -> Vec<SimTime> {
        self.records
            .iter()
            .map(|r| r.time)
            .filter(|t| *t >= from && *t < to)
            .collect()
    }
}

impl EmissionSink for RecordingSink {
    fn emit_once(
        &mut self,
        now: SimTime,
        from: NodeId,
        topic: &Topic,
        payload: DataPayload,
        frequency: Frequency,
    ) -> Result<(), TransportError> {
        if let Some(served) = &self.topic {
            if served != topic {
                return Err(TransportError::UnknownTopic(topic.to_string()));
            }
        }

        trace!(time = %now, node = %from, topic = %topic, seq = payload.sequence, "emit");
        *self.per_node.entry(from).or_insert(0) += 1;
        self.records.push(EmissionRecord {
            time: now,
            from,
            topic: topic.clone(),
            payload,
            frequency,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic::new("/icens/powerlevel").unwrap()
    }

    fn payload(sequence: u64) -> DataPayload {
        DataPayload { sequence, size: 1024 }
    }

    #[test]
    fn test_records_emissions_and_counts() {
        let mut sink = RecordingSink::new();
        let rate = Frequency::new(1.0).unwrap();
        sink.emit_once(SimTime::from_secs(1), NodeId::new(0), &topic(), payload(0), rate).unwrap();
        sink.emit_once(SimTime::from_secs(2), NodeId::new(0), &topic(), payload(1), rate).unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.counts_by_node().get(&NodeId::new(0)), Some(&2));
        assert_eq!(
            sink.times_between(SimTime::ZERO, SimTime::from_secs(2)),
            vec![SimTime::from_secs(1)]
        );
    }

    #[test]
    fn test_topic_restriction() {
        let mut sink = RecordingSink::for_topic(topic());
        let other = Topic::new("/icens/other").unwrap();
        let rate = Frequency::new(1.0).unwrap();

        let err = sink.emit_once(SimTime::ZERO, NodeId::new(0), &other, payload(0), rate).unwrap_err();
        assert_eq!(err, TransportError::UnknownTopic("/icens/other".into()));
        assert!(sink.is_empty());
    }
}
