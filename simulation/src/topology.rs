//! Scenario topology
//!
//! Nodes, point-to-point links and the forwarding strategy of a scenario.
//! Rate negotiation does not look at any of this; it is carried so scenario
//! files stay complete and the CLI can show what was simulated.

use std::collections::{BTreeMap, BTreeSet};

use icens_core::{AppRole, NodeId};
use serde::{Deserialize, Serialize};

/// Attributes of a point-to-point link, passed through unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Link data rate, e.g. "1Mbps"
    pub data_rate: String,
    /// Propagation delay, e.g. "10ms"
    pub delay: String,
    /// Drop-tail queue size in packets
    pub max_packets: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            data_rate: "1Mbps".to_string(),
            delay: "10ms".to_string(),
            max_packets: 20,
        }
    }
}

/// Forwarding strategy installed for a name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardingStrategy {
    #[default]
    BestRoute,
    Multicast,
}

impl std::fmt::Display for ForwardingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardingStrategy::BestRoute => write!(f, "best-route"),
            ForwardingStrategy::Multicast => write!(f, "multicast"),
        }
    }
}

/// The network a scenario runs on
#[derive(Debug, Clone, Default)]
pub struct Topology {
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Link attributes keyed by normalized `(low, high)` endpoint pair
    links: BTreeMap<(NodeId, NodeId), LinkConfig>,
    roles: BTreeMap<NodeId, BTreeSet<AppRole>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a topology with nodes `0..count` and no links
    pub fn with_nodes(count: u32) -> Self {
        let mut topology = Self::new();
        for i in 0..count {
            topology.add_node(NodeId::new(i));
        }
        topology
    }

    pub fn add_node(&mut self, id: NodeId) {
        self.adjacency.entry(id).or_default();
    }

    /// Add a bidirectional link; self-links are ignored
    pub fn connect(&mut self, a: NodeId, b: NodeId, link: LinkConfig) {
        if a == b {
            return;
        }
        self.add_node(a);
        self.add_node(b);
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
        let key = if a < b { (a, b) } else { (b, a) };
        self.links.insert(key, link);
    }

    /// Record that `node` hosts an application with `role`
    pub fn assign_role(&mut self, node: NodeId, role: AppRole) {
        self.add_node(node);
        self.roles.entry(node).or_default().insert(role);
    }

    pub fn roles(&self, node: NodeId) -> Vec<AppRole> {
        self.roles
            .get(&node)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.adjacency.contains_key(&node)
    }

    pub fn neighbors(&self, node: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.adjacency.get(&node)
    }

    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency
            .get(&a)
            .map(|neighbors| neighbors.contains(&b))
            .unwrap_or(false)
    }

    pub fn link(&self, a: NodeId, b: NodeId) -> Option<&LinkConfig> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.links.get(&key)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.adjacency.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Simple ASCII listing of nodes, roles and neighbors
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Topology:\n");
        output.push_str(&format!("  Nodes: {}\n", self.node_count()));
        output.push_str(&format!("  Links: {}\n\n", self.link_count()));

        for (node, neighbors) in &self.adjacency {
            let neighbor_str: Vec<String> = neighbors.iter().map(|n| n.to_string()).collect();
            let roles: Vec<String> = self.roles(*node).iter().map(|r| r.to_string()).collect();
            let label = if roles.is_empty() {
                String::new()
            } else {
                format!(" ({})", roles.join(", "))
            };
            output.push_str(&format!(
                "  {}{} -> [{}]\n",
                node,
                label,
                neighbor_str.join(", ")
            ));
        }
        output
    }
}

/// Build a topology from an edge list with default link attributes
pub fn from_edges(edges: &[(u32, u32)]) -> Topology {
    let mut topology = Topology::new();
    for &(a, b) in edges {
        topology.connect(NodeId::new(a), NodeId::new(b), LinkConfig::default());
    }
    topology
}
