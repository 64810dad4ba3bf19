//! Transmission report
//!
//! Per-node counts of subscription interests and data packets, shares of
//! the total, and the effective-frequency timeline of a finished run.

use std::path::Path;

use icens_core::{AppRole, EmissionSink, Frequency, NodeId, SimTime};
use serde::Serialize;
use thiserror::Error;

use crate::simulation::{FrequencyChange, SimStats, Simulation};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Transmission counts for one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTransmissions {
    pub node: NodeId,
    pub roles: Vec<AppRole>,
    pub interests: u64,
    pub data: u64,
    pub total: u64,
    /// Share of all transmissions, 0-100
    pub percentage: f64,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct TransmissionReport {
    pub scenario: String,
    pub end_time: SimTime,
    pub nodes: Vec<NodeTransmissions>,
    pub total: u64,
    pub most_active: Option<NodeId>,
    pub least_active: Option<NodeId>,
    pub timeline: Vec<FrequencyChange>,
    pub final_frequency: Frequency,
    pub stats: SimStats,
    pub errors: Vec<String>,
}

impl TransmissionReport {
    pub fn from_simulation<S: EmissionSink>(sim: &Simulation<S>) -> Self {
        let stats = sim.stats.clone();
        let topology = sim.topology();

        let mut nodes: Vec<NodeTransmissions> = topology
            .node_ids()
            .into_iter()
            .map(|node| {
                let interests = stats.interests_by_node.get(&node).copied().unwrap_or(0);
                let data = stats.data_by_node.get(&node).copied().unwrap_or(0);
                NodeTransmissions {
                    node,
                    roles: topology.roles(node),
                    interests,
                    data,
                    total: interests + data,
                    percentage: 0.0,
                }
            })
            .collect();

        let total: u64 = nodes.iter().map(|n| n.total).sum();
        if total > 0 {
            for row in &mut nodes {
                row.percentage = row.total as f64 * 100.0 / total as f64;
            }
        }

        // Only nodes hosting an application are ranked; ties go to the lowest id
        let ranked = || nodes.iter().filter(|n| !n.roles.is_empty());
        let most_active = ranked()
            .max_by_key(|n| (n.total, std::cmp::Reverse(n.node)))
            .map(|n| n.node);
        let least_active = ranked().min_by_key(|n| (n.total, n.node)).map(|n| n.node);

        Self {
            scenario: sim.name().to_string(),
            end_time: sim.now(),
            total,
            most_active,
            least_active,
            timeline: sim.timeline().to_vec(),
            final_frequency: sim.effective_frequency(),
            errors: sim.errors().iter().map(|e| e.to_string()).collect(),
            nodes,
            stats,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeTransmissions> {
        self.nodes.iter().find(|n| n.node == id)
    }

    pub fn to_json_pretty(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

impl std::fmt::Display for TransmissionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Transmission report: {} (t={}) ===", self.scenario, self.end_time)?;
        writeln!(
            f,
            "{:<6} {:<22} {:>9} {:>7} {:>7} {:>8}",
            "Node", "Roles", "Interests", "Data", "Total", "Share"
        )?;
        for row in &self.nodes {
            let roles: Vec<String> = row.roles.iter().map(|r| r.to_string()).collect();
            let roles = if roles.is_empty() {
                "-".to_string()
            } else {
                roles.join(",")
            };
            writeln!(
                f,
                "{:<6} {:<22} {:>9} {:>7} {:>7} {:>7.2}%",
                row.node.to_string(),
                roles,
                row.interests,
                row.data,
                row.total,
                row.percentage
            )?;
        }
        writeln!(f, "Total transmissions: {}", self.total)?;
        if let Some(node) = self.most_active {
            writeln!(f, "Most active node: {}", node)?;
        }
        if let Some(node) = self.least_active {
            writeln!(f, "Least active node: {}", node)?;
        }

        writeln!(f, "\nFrequency timeline:")?;
        if self.timeline.is_empty() {
            writeln!(f, "  (no changes)")?;
        }
        for change in &self.timeline {
            let driver = change
                .driver
                .map(|d| d.to_string())
                .unwrap_or_else(|| "baseline".to_string());
            writeln!(
                f,
                "  [{}] {} -> {} ({})",
                change.time, change.from, change.to, driver
            )?;
        }
        writeln!(f, "Final frequency: {}", self.final_frequency)?;

        if !self.errors.is_empty() {
            writeln!(f, "\nErrors ({}):", self.errors.len())?;
            for e in &self.errors {
                writeln!(f, "  {}", e)?;
            }
        }
        Ok(())
    }
}
