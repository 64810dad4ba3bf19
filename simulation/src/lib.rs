//! # icens simulation
//!
//! Discrete-event simulation of rate-adaptive publish/subscribe: a producer
//! publishes on a topic at a frequency negotiated from the subscribers that
//! are currently active.
//!
//! ## Architecture
//!
//! - **Scheduler** (`scheduler.rs`): deterministic `(time, phase, seq)` event queue
//! - **Adapter** (`adapter.rs`): subscriber start/stop → registry join/leave
//! - **Topology** (`topology.rs`): nodes, links and forwarding strategy, carried
//!   through for reporting
//! - **Config** (`config.rs`): JSON scenario files and built-in presets
//! - **Simulation** (`simulation.rs`): the event loop
//! - **Report** (`report.rs`): per-node transmission counts and frequency timeline
//! - **Scenarios** (`scenarios.rs`): pre-built runs used by the CLI
//!
//! ## Example
//!
//! ```rust,ignore
//! use icens_simulation::*;
//!
//! let mut sim = Simulation::from_config(&ScenarioConfig::adaptive_tree())?;
//!
//! sim.run_until(SimTime::from_secs(5));
//! assert_eq!(sim.effective_frequency().hz(), 15.0);
//!
//! sim.run();
//! println!("{}", TransmissionReport::from_simulation(&sim));
//! ```

pub mod adapter;
pub mod config;
pub mod report;
pub mod scenarios;
pub mod scheduler;
pub mod simulation;
pub mod topology;

#[cfg(test)]
mod integration_scenarios;

// Re-export main types
pub use adapter::LifecycleAdapter;

pub use config::{
    ConfigError,
    ProducerConfig,
    ScenarioConfig,
    ScenarioPlan,
    StrategyConfig,
    SubscriberConfig,
    TopologyConfig,
};

pub use report::{NodeTransmissions, ReportError, TransmissionReport};

pub use scheduler::{Scheduler, SchedulerError, SimEvent};

pub use simulation::{
    EventError,
    FrequencyChange,
    SimStats,
    Simulation,
    SimulationError,
};

pub use topology::{ForwardingStrategy, LinkConfig, Topology, from_edges};

// Re-export core types for convenience
pub use icens_core::{Frequency, NodeId, SimTime, SubscriberId, SubscriptionMode, Topic};
