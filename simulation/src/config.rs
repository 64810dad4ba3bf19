//! Scenario configuration
//!
//! One explicit struct per entity (topology, producer, subscriber), loaded
//! from JSON. Times are seconds; rates are packets per second. Everything is
//! checked by [`ScenarioConfig::validate`] before a simulation is built, and
//! converted into the typed core values there.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use icens_core::{
    ActiveInterval, Frequency, FrequencyError, IdentityError, NodeId, ProducerSettings, SimTime,
    Subscriber, SubscriberId, SubscriptionMode, Topic,
};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::topology::{ForwardingStrategy, LinkConfig, Topology};

/// Topic used by the built-in scenarios
pub const DEFAULT_TOPIC: &str = "/icens/powerlevel";

/// Errors raised while loading or validating a scenario
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Topology must contain at least one node")]
    NoNodes,

    #[error("Link {a} <-> {b} is invalid for a topology of {nodes} nodes")]
    InvalidLink { a: u32, b: u32, nodes: u32 },

    #[error("{what} refers to node {node}, but the topology has {nodes} nodes")]
    UnknownNode { what: String, node: u32, nodes: u32 },

    #[error("{what}: invalid time {value}")]
    InvalidTime { what: String, value: f64 },

    #[error("{what}: start {start} must be before stop {stop}")]
    InvalidInterval { what: String, start: f64, stop: f64 },

    #[error("{what}: {source}")]
    InvalidRate {
        what: String,
        #[source]
        source: FrequencyError,
    },

    #[error(transparent)]
    InvalidTopic(#[from] IdentityError),

    #[error("Subscriber {subscriber} uses topic {found}, but the producer publishes {expected}")]
    TopicMismatch {
        subscriber: SubscriberId,
        expected: String,
        found: String,
    },

    #[error("Subscriber id {0} is used more than once")]
    DuplicateSubscriber(SubscriberId),

    #[error("Unknown scenario preset: {0}")]
    UnknownPreset(String),
}

/// Point-to-point topology description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Number of nodes; nodes are numbered `0..nodes`
    pub nodes: u32,
    /// Undirected links as `[a, b]` pairs
    pub links: Vec<(u32, u32)>,
    /// Attributes applied to every link
    #[serde(default)]
    pub link_defaults: LinkConfig,
}

/// Forwarding strategy choice for a prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub prefix: String,
    pub strategy: ForwardingStrategy,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            prefix: "/prefix".to_string(),
            strategy: ForwardingStrategy::BestRoute,
        }
    }
}

/// The spontaneous producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub node: u32,
    pub topic: String,
    /// Baseline publish frequency, used while nobody is subscribed
    pub frequency: f64,
    #[serde(default = "default_payload_size")]
    pub payload_size: u32,
    #[serde(default)]
    pub start: f64,
    pub stop: f64,
    #[serde(default = "default_true")]
    pub emit_when_unsubscribed: bool,
}

/// One subscriber application instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberConfig {
    pub id: u32,
    pub node: u32,
    pub topic: String,
    /// Desired data rate in packets per second
    pub data_rate: f64,
    /// `"soft"`/`"hard"` or the numeric attribute form (1/2)
    #[serde(default, deserialize_with = "mode_from_name_or_code")]
    pub subscription: SubscriptionMode,
    /// Subscription interest retransmission period in seconds
    #[serde(default = "default_tx_timer")]
    pub tx_timer: f64,
    #[serde(default)]
    pub start: f64,
    pub stop: f64,
}

/// A complete scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    /// No event after this time is processed
    #[serde(default = "default_stop_time")]
    pub stop_time: f64,
    pub topology: TopologyConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    pub producer: ProducerConfig,
    #[serde(default)]
    pub subscribers: Vec<SubscriberConfig>,
}

/// Subscriber after validation
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberPlan {
    pub subscriber: Subscriber,
    /// Refresh period in nanoseconds
    pub tx_timer_nanos: u64,
}

/// Producer after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerPlan {
    pub node: NodeId,
    pub settings: ProducerSettings,
    pub interval: ActiveInterval,
}

/// Everything a simulation needs, fully typed
#[derive(Debug, Clone)]
pub struct ScenarioPlan {
    pub name: String,
    pub stop_time: SimTime,
    pub topology: Topology,
    pub strategy: StrategyConfig,
    pub producer: ProducerPlan,
    pub subscribers: Vec<SubscriberPlan>,
}

fn default_payload_size() -> u32 {
    1024
}

fn default_true() -> bool {
    true
}

fn default_tx_timer() -> f64 {
    20.0
}

fn default_stop_time() -> f64 {
    20.0
}

fn mode_from_name_or_code<'de, D>(deserializer: D) -> Result<SubscriptionMode, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Named(SubscriptionMode),
        Code(i64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Named(mode) => Ok(mode),
        Raw::Code(code) => SubscriptionMode::from_code(code).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown subscription code {}", code))
        }),
    }
}

fn time(what: &str, secs: f64) -> Result<SimTime, ConfigError> {
    SimTime::from_secs_f64(secs).ok_or_else(|| ConfigError::InvalidTime {
        what: what.to_string(),
        value: secs,
    })
}

fn interval(what: &str, start: f64, stop: f64) -> Result<ActiveInterval, ConfigError> {
    let (from, to) = (time(what, start)?, time(what, stop)?);
    ActiveInterval::new(from, to).ok_or_else(|| ConfigError::InvalidInterval {
        what: what.to_string(),
        start,
        stop,
    })
}

fn rate(what: &str, hz: f64) -> Result<Frequency, ConfigError> {
    Frequency::new(hz).map_err(|source| ConfigError::InvalidRate {
        what: what.to_string(),
        source,
    })
}

impl ScenarioConfig {
    /// Load a scenario from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a built-in scenario by name
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "adaptive" | "adaptive-tree" => Ok(Self::adaptive_tree()),
            "christmas-tree" => Ok(Self::christmas_tree()),
            "race" => Ok(Self::race(false)),
            "race-simultaneous" => Ok(Self::race(true)),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    /// Check the scenario and convert it into typed values
    pub fn validate(&self) -> Result<ScenarioPlan, ConfigError> {
        let nodes = self.topology.nodes;
        if nodes == 0 {
            return Err(ConfigError::NoNodes);
        }
        let check_node = |what: String, node: u32| -> Result<NodeId, ConfigError> {
            if node < nodes {
                Ok(NodeId::new(node))
            } else {
                Err(ConfigError::UnknownNode { what, node, nodes })
            }
        };

        let stop_time = time("stop_time", self.stop_time)?;

        let mut topology = Topology::with_nodes(nodes);
        for &(a, b) in &self.topology.links {
            if a >= nodes || b >= nodes || a == b {
                return Err(ConfigError::InvalidLink { a, b, nodes });
            }
            topology.connect(NodeId::new(a), NodeId::new(b), self.topology.link_defaults.clone());
        }

        let producer_node = check_node("producer".to_string(), self.producer.node)?;
        let topic = Topic::new(self.producer.topic.clone())?;
        let mut settings = ProducerSettings::new(topic.clone(), rate("producer frequency", self.producer.frequency)?);
        settings.payload_size = self.producer.payload_size;
        settings.emit_when_unsubscribed = self.producer.emit_when_unsubscribed;
        let producer = ProducerPlan {
            node: producer_node,
            settings,
            interval: interval("producer", self.producer.start, self.producer.stop)?,
        };
        topology.assign_role(producer_node, icens_core::AppRole::Producer);

        let mut seen = BTreeSet::new();
        let mut subscribers = Vec::with_capacity(self.subscribers.len());
        for config in &self.subscribers {
            let id = SubscriberId::new(config.id);
            let what = format!("subscriber {}", id);
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateSubscriber(id));
            }

            let node = check_node(what.clone(), config.node)?;
            let sub_topic = Topic::new(config.topic.clone())?;
            if sub_topic != topic {
                return Err(ConfigError::TopicMismatch {
                    subscriber: id,
                    expected: topic.to_string(),
                    found: sub_topic.to_string(),
                });
            }

            let tx_timer = time(&what, config.tx_timer)?;
            if tx_timer == SimTime::ZERO {
                return Err(ConfigError::InvalidTime {
                    what: format!("{} tx_timer", id),
                    value: config.tx_timer,
                });
            }

            subscribers.push(SubscriberPlan {
                subscriber: Subscriber::new(
                    id,
                    node,
                    rate(&what, config.data_rate)?,
                    config.subscription,
                    interval(&what, config.start, config.stop)?,
                ),
                tx_timer_nanos: tx_timer.as_nanos(),
            });
            topology.assign_role(node, icens_core::AppRole::Subscriber);
        }

        Ok(ScenarioPlan {
            name: self.name.clone(),
            stop_time,
            topology,
            strategy: self.strategy.clone(),
            producer,
            subscribers,
        })
    }

    /// Producer on node 0 behind a router (node 1) feeding three subscriber
    /// nodes; links 0-1, 1-2, 1-3, 1-4
    fn tree_topology() -> TopologyConfig {
        TopologyConfig {
            nodes: 5,
            links: vec![(0, 1), (1, 2), (1, 3), (1, 4)],
            link_defaults: LinkConfig::default(),
        }
    }

    fn producer(frequency: f64, stop: f64) -> ProducerConfig {
        ProducerConfig {
            node: 0,
            topic: DEFAULT_TOPIC.to_string(),
            frequency,
            payload_size: default_payload_size(),
            start: 0.0,
            stop,
            emit_when_unsubscribed: true,
        }
    }

    fn subscriber(id: u32, node: u32, data_rate: f64, start: f64, stop: f64) -> SubscriberConfig {
        SubscriberConfig {
            id,
            node,
            topic: DEFAULT_TOPIC.to_string(),
            data_rate,
            subscription: SubscriptionMode::Hard,
            tx_timer: default_tx_timer(),
            start,
            stop,
        }
    }

    /// Staggered joins: rates 5 @1s, 15 @5s, 10 @8s, all leaving at 20s
    pub fn adaptive_tree() -> Self {
        Self {
            name: "adaptive-tree".to_string(),
            stop_time: 20.0,
            topology: Self::tree_topology(),
            strategy: StrategyConfig {
                prefix: "/prefix".to_string(),
                strategy: ForwardingStrategy::BestRoute,
            },
            producer: Self::producer(1.0, 20.0),
            subscribers: vec![
                Self::subscriber(1, 2, 5.0, 1.0, 20.0),
                Self::subscriber(2, 3, 15.0, 5.0, 20.0),
                Self::subscriber(3, 4, 10.0, 8.0, 20.0),
            ],
        }
    }

    /// Three soft subscribers at 10 pps for the whole run, multicast forwarding
    pub fn christmas_tree() -> Self {
        let mut subscribers: Vec<SubscriberConfig> = (2..=4)
            .map(|node| Self::subscriber(node - 1, node, 10.0, 0.0, 20.0))
            .collect();
        for sub in &mut subscribers {
            sub.subscription = SubscriptionMode::Soft;
        }

        Self {
            name: "christmas-tree".to_string(),
            stop_time: 20.0,
            topology: Self::tree_topology(),
            strategy: StrategyConfig {
                prefix: "/prefix".to_string(),
                strategy: ForwardingStrategy::Multicast,
            },
            producer: Self::producer(1.0, 20.0),
            subscribers,
        }
    }

    /// The adaptive tree plus two near-simultaneous joins at 12s (rates 20
    /// and 25) on the nodes of the first two subscribers
    pub fn race(simultaneous: bool) -> Self {
        let mut config = Self::adaptive_tree();
        config.name = if simultaneous {
            "race-simultaneous".to_string()
        } else {
            "race".to_string()
        };
        let second_start = if simultaneous { 12.0 } else { 12.001 };
        config.subscribers.push(Self::subscriber(4, 2, 20.0, 12.0, 20.0));
        config.subscribers.push(Self::subscriber(5, 3, 25.0, second_start, 20.0));
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for name in ["adaptive", "christmas-tree", "race", "race-simultaneous"] {
            let config = ScenarioConfig::preset(name).unwrap();
            assert!(config.validate().is_ok(), "preset {} failed validation", name);
        }
        assert!(matches!(
            ScenarioConfig::preset("nope"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_adaptive_tree_plan() {
        let plan = ScenarioConfig::adaptive_tree().validate().unwrap();
        assert_eq!(plan.stop_time, SimTime::from_secs(20));
        assert_eq!(plan.topology.node_count(), 5);
        assert_eq!(plan.subscribers.len(), 3);

        let second = &plan.subscribers[1].subscriber;
        assert_eq!(second.id, SubscriberId::new(2));
        assert_eq!(second.node, NodeId::new(3));
        assert_eq!(second.desired_rate.hz(), 15.0);
        assert_eq!(second.interval.start(), SimTime::from_secs(5));
        assert_eq!(plan.subscribers[1].tx_timer_nanos, 20_000_000_000);
    }

    #[test]
    fn test_race_start_times() {
        let plan = ScenarioConfig::race(false).validate().unwrap();
        let starts: Vec<SimTime> = plan.subscribers[3..]
            .iter()
            .map(|p| p.subscriber.interval.start())
            .collect();
        assert_eq!(starts, vec![SimTime::from_millis(12_000), SimTime::from_millis(12_001)]);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ScenarioConfig::race(true);
        let json = config.to_json_pretty().unwrap();
        let parsed = ScenarioConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.subscribers.len(), 5);
        assert_eq!(parsed.subscribers[4].start, 12.0);
        assert_eq!(parsed.strategy.strategy, ForwardingStrategy::BestRoute);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "name": "minimal",
            "topology": { "nodes": 2, "links": [[0, 1]] },
            "producer": { "node": 0, "topic": "/icens/powerlevel", "frequency": 1, "stop": 10 },
            "subscribers": [
                { "id": 1, "node": 1, "topic": "/icens/powerlevel", "data_rate": 5, "subscription": 2, "start": 1, "stop": 9 }
            ]
        }"#;
        let config = ScenarioConfig::from_json_str(json).unwrap();
        assert_eq!(config.stop_time, 20.0);
        assert_eq!(config.producer.payload_size, 1024);
        assert_eq!(config.subscribers[0].subscription, SubscriptionMode::Hard);
        assert_eq!(config.subscribers[0].tx_timer, 20.0);
        assert_eq!(config.topology.link_defaults.delay, "10ms");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_subscription_code_rejected() {
        let json = r#"{ "id": 1, "node": 1, "topic": "/t", "data_rate": 5, "subscription": 9, "stop": 9 }"#;
        assert!(serde_json::from_str::<SubscriberConfig>(json).is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ScenarioConfig::adaptive_tree();
        config.subscribers[0].node = 9;
        assert!(matches!(config.validate(), Err(ConfigError::UnknownNode { node: 9, .. })));

        let mut config = ScenarioConfig::adaptive_tree();
        config.subscribers[1].start = 20.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidInterval { .. })));

        let mut config = ScenarioConfig::adaptive_tree();
        config.subscribers[2].data_rate = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRate { .. })));

        let mut config = ScenarioConfig::adaptive_tree();
        config.subscribers[2].id = 1;
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateSubscriber(_))));

        let mut config = ScenarioConfig::adaptive_tree();
        config.subscribers[0].topic = "/icens/other".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::TopicMismatch { .. })));

        let mut config = ScenarioConfig::adaptive_tree();
        config.topology.links.push((1, 1));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLink { .. })));

        let mut config = ScenarioConfig::adaptive_tree();
        config.subscribers[0].start = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTime { .. })));

        let mut config = ScenarioConfig::adaptive_tree();
        config.producer.topic = "no-slash".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTopic(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(&path, ScenarioConfig::christmas_tree().to_json_pretty().unwrap()).unwrap();

        let config = ScenarioConfig::from_json_file(&path).unwrap();
        assert_eq!(config.name, "christmas-tree");

        let missing = ScenarioConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
