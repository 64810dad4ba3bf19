//! Pre-defined simulation scenarios for icens
//!
//! Each runner prints the topology, the negotiated frequency at the
//! interesting instants and a transmission report, then returns the finished
//! simulation for inspection.

use icens_core::SimTime;
use tracing::info;

use crate::config::{ConfigError, ScenarioConfig};
use crate::report::TransmissionReport;
use crate::simulation::Simulation;

/// Run `config` to completion, printing progress at each `checkpoint`
pub fn run_config(config: &ScenarioConfig, checkpoints: &[f64]) -> Result<Simulation, ConfigError> {
    info!("=== Running {} scenario ===", config.name);
    let mut sim = Simulation::from_config(config)?;

    println!("{}", sim.topology().visualize());
    println!(
        "Producer on {} publishing {} at baseline {}, strategy {} for {}",
        sim.producer_node(),
        sim.producer().topic(),
        sim.producer().baseline(),
        sim.strategy().strategy,
        sim.strategy().prefix
    );
    for plan in sim.subscriber_plans() {
        let s = &plan.subscriber;
        println!(
            "  {} on {}: {} {} [{} .. {})",
            s.id,
            s.node,
            s.desired_rate,
            s.mode,
            s.interval.start(),
            s.interval.stop()
        );
    }

    for &secs in checkpoints {
        let Some(at) = SimTime::from_secs_f64(secs) else {
            continue;
        };
        sim.run_until(at);
        println!("\n--- t = {} ---", at);
        println!("  {}", sim.state_summary());
    }

    sim.run();
    println!("\n--- Final ---");
    println!("  {}", sim.state_summary());
    println!("\n{}", TransmissionReport::from_simulation(&sim));

    Ok(sim)
}

/// Three subscribers joining at 1s, 5s and 8s with rates 5, 15 and 10
///
/// ```text
/// t=1   S1 joins (5)   -> 5 pps
/// t=5   S2 joins (15)  -> 15 pps
/// t=8   S3 joins (10)  -> stays 15 pps
/// t=20  all leave      -> baseline 1 pps
/// ```
pub fn run_adaptive_scenario() -> Result<Simulation, ConfigError> {
    run_config(&ScenarioConfig::adaptive_tree(), &[1.0, 5.0, 8.0, 19.0])
}

/// Three soft subscribers on a multicast tree, all at 10 pps
pub fn run_christmas_tree_scenario() -> Result<Simulation, ConfigError> {
    run_config(&ScenarioConfig::christmas_tree(), &[0.0, 10.0])
}

/// Two joins racing at 12s (rates 20 and 25); 25 pps must win whichever
/// join is processed first
pub fn run_race_scenario(simultaneous: bool) -> Result<Simulation, ConfigError> {
    run_config(&ScenarioConfig::race(simultaneous), &[11.0, 12.0, 12.001, 19.0])
}
