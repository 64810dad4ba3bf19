//! Integration scenarios exercising the full negotiation stack
//!
//! These scenarios run complete simulations and check:
//! - the effective frequency at the instants that matter
//! - same-time and near-same-time joins
//! - activity interval boundaries
//! - the emission cadence seen by the sink
//! - non-fatal configuration defects

use icens_core::{
    IcensError, IdentityError, RegistryError, SimTime, SubscriberId, SubscriptionMode,
};
use test_case::test_case;

use crate::config::{ScenarioConfig, SubscriberConfig, DEFAULT_TOPIC};
use crate::scheduler::SimEvent;
use crate::simulation::{EventError, Simulation};

fn ms(millis: u64) -> SimTime {
    SimTime::from_millis(millis)
}

fn s(id: u32) -> SubscriberId {
    SubscriberId::new(id)
}

fn subscriber(id: u32, node: u32, data_rate: f64, start: f64, stop: f64) -> SubscriberConfig {
    SubscriberConfig {
        id,
        node,
        topic: DEFAULT_TOPIC.to_string(),
        data_rate,
        subscription: SubscriptionMode::Soft,
        tx_timer: 20.0,
        start,
        stop,
    }
}

/// Baseline 1; A@1 rate 5; B@5 rate 15; C@8 rate 10; all leave at 20
#[test]
fn test_staggered_joins() {
    icens_logging::init_testing();
    let mut sim = Simulation::from_config(&ScenarioConfig::adaptive_tree()).unwrap();

    sim.run_until(ms(999));
    assert_eq!(sim.effective_frequency().hz(), 1.0);

    sim.run_until(ms(1_000));
    assert_eq!(sim.effective_frequency().hz(), 5.0);
    assert_eq!(sim.producer().driver(), Some(s(1)));

    sim.run_until(ms(5_000));
    assert_eq!(sim.effective_frequency().hz(), 15.0);
    assert_eq!(sim.producer().driver(), Some(s(2)));

    sim.run_until(ms(8_000));
    assert_eq!(sim.effective_frequency().hz(), 15.0);
    assert_eq!(sim.snapshot().ids(), vec![s(1), s(2), s(3)]);

    sim.run();
    assert_eq!(sim.now(), ms(20_000));
    assert_eq!(sim.effective_frequency().hz(), 1.0);
    assert!(sim.registry().is_empty());
    assert!(sim.errors().is_empty());
}

/// Joins at 12.000 (rate 20) and 12.001 or 12.000 (rate 25) end at 25
/// whatever order they are processed in
#[test_case(false, false ; "near simultaneous")]
#[test_case(false, true ; "near simultaneous reversed insertion")]
#[test_case(true, false ; "simultaneous")]
#[test_case(true, true ; "simultaneous reversed insertion")]
fn test_race_resolves_to_highest_rate(simultaneous: bool, reversed: bool) {
    let mut config = ScenarioConfig::race(simultaneous);
    if reversed {
        config.subscribers.reverse();
    }
    let mut sim = Simulation::from_config(&config).unwrap();

    sim.run_until(ms(12_001));

    assert_eq!(sim.effective_frequency().hz(), 25.0);
    assert_eq!(sim.producer().driver(), Some(s(5)));
    assert_eq!(sim.registry().len(), 5);
}

#[test]
fn test_same_time_joins_commute() {
    let run = |reversed: bool| {
        let mut config = ScenarioConfig::race(true);
        if reversed {
            config.subscribers.reverse();
        }
        let mut sim = Simulation::from_config(&config).unwrap();
        sim.run_until(ms(12_000));
        (sim.effective_frequency(), sim.producer().driver(), sim.snapshot().len())
    };

    assert_eq!(run(false), run(true));
}

/// Tied rates resolve to the lowest subscriber id regardless of join order
#[test]
fn test_tied_rates_pick_lowest_id() {
    let mut config = ScenarioConfig::adaptive_tree();
    config.subscribers = vec![
        subscriber(7, 2, 12.0, 1.0, 20.0),
        subscriber(3, 3, 12.0, 2.0, 20.0),
    ];
    let mut sim = Simulation::from_config(&config).unwrap();

    sim.run_until(ms(1_000));
    assert_eq!(sim.producer().driver(), Some(s(7)));

    sim.run_until(ms(2_000));
    assert_eq!(sim.effective_frequency().hz(), 12.0);
    assert_eq!(sim.producer().driver(), Some(s(3)));
}

/// One subscriber stops exactly when another starts: at that instant only
/// the starting one is active
#[test]
fn test_interval_boundary() {
    let mut config = ScenarioConfig::adaptive_tree();
    config.subscribers = vec![
        subscriber(1, 2, 5.0, 1.0, 5.0),
        subscriber(2, 3, 8.0, 5.0, 10.0),
    ];
    // Start scheduled before the stop to check that ordering does not rely
    // on insertion
    config.subscribers.reverse();
    let mut sim = Simulation::from_config(&config).unwrap();

    sim.run_until(ms(5_000));

    assert_eq!(sim.snapshot().ids(), vec![s(2)]);
    assert_eq!(sim.effective_frequency().hz(), 8.0);
    assert!(sim.errors().is_empty());

    sim.run();
    assert_eq!(sim.frequency_at(ms(10_000)).hz(), 1.0);
}

/// After a rate change the next emission is one new period out; no burst
#[test]
fn test_emission_cadence_follows_rate_changes() {
    let mut sim = Simulation::from_config(&ScenarioConfig::adaptive_tree()).unwrap();
    sim.run();
    let sink = sim.recorded();

    // Baseline slot at 1s is superseded by the 1s join
    let first = sink.records().first().unwrap();
    assert_eq!(first.time, ms(1_200));
    assert_eq!(first.frequency.hz(), 5.0);

    let intervals = |from: SimTime, to: SimTime| -> Vec<u64> {
        let times = sink.times_between(from, to);
        times
            .windows(2)
            .filter_map(|w| w[1].duration_since(w[0]))
            .collect()
    };

    let at_five = intervals(ms(1_000), ms(5_000));
    assert!(!at_five.is_empty());
    assert!(at_five.iter().all(|&d| d == 200_000_000));

    let after_change = sink.times_between(ms(5_000), ms(8_000));
    let period = 66_666_667;
    assert_eq!(after_change[0], SimTime::from_nanos(5_000_000_000 + period));

    let at_fifteen = intervals(ms(5_000), ms(20_000));
    assert!(at_fifteen.iter().all(|&d| d == period));

    assert_eq!(sim.stats.emissions, sink.len() as u64);
}

#[test_case(true, 3 ; "baseline while unsubscribed")]
#[test_case(false, 0 ; "idle while unsubscribed")]
fn test_unsubscribed_behavior(emit_when_unsubscribed: bool, expected_after_leave: usize) {
    let mut config = ScenarioConfig::adaptive_tree();
    config.stop_time = 6.0;
    config.producer.emit_when_unsubscribed = emit_when_unsubscribed;
    config.subscribers = vec![subscriber(1, 2, 4.0, 1.0, 3.0)];
    let mut sim = Simulation::from_config(&config).unwrap();
    sim.run();

    // Slots at 4s, 5s and 6s when publishing the baseline
    let after_leave = sim.recorded().times_between(ms(3_000), ms(6_001));
    assert_eq!(after_leave.len(), expected_after_leave);
    assert_eq!(sim.effective_frequency().hz(), 1.0);
}

/// With nobody subscribed yet, the producer publishes its baseline from one
/// period after its own start
#[test]
fn test_baseline_emissions_before_first_join() {
    let mut config = ScenarioConfig::adaptive_tree();
    config.producer.start = 0.5;
    config.subscribers = vec![subscriber(1, 2, 5.0, 3.5, 20.0)];
    let mut sim = Simulation::from_config(&config).unwrap();
    sim.run();
    let sink = sim.recorded();

    let first = sink.records().first().unwrap();
    assert_eq!(first.time, ms(1_500));
    assert_eq!(first.frequency.hz(), 1.0);

    // The 3.5s baseline slot loses to the join at the same instant
    assert_eq!(sink.times_between(SimTime::ZERO, ms(3_500)), vec![ms(1_500), ms(2_500)]);
    assert_eq!(sink.times_between(ms(3_500), ms(4_000)), vec![ms(3_700), ms(3_900)]);
}

/// A producer starting after its subscribers emits at the negotiated rate
/// from one period after its start, with nothing before
#[test]
fn test_producer_starts_with_active_subscribers() {
    let mut config = ScenarioConfig::adaptive_tree();
    config.producer.start = 2.0;
    config.subscribers = vec![subscriber(1, 2, 4.0, 1.0, 20.0)];
    let mut sim = Simulation::from_config(&config).unwrap();

    sim.run_until(ms(1_000));
    assert_eq!(sim.effective_frequency().hz(), 4.0);
    assert!(sim.producer().next_emission().is_none());

    sim.run();
    let sink = sim.recorded();

    assert!(sink.times_between(SimTime::ZERO, ms(2_000)).is_empty());
    let first = sink.records().first().unwrap();
    assert_eq!(first.time, ms(2_250));
    assert_eq!(first.frequency.hz(), 4.0);
    assert_eq!(sink.times_between(ms(2_000), ms(3_000)), vec![ms(2_250), ms(2_500), ms(2_750)]);
}

/// Duplicate joins and unknown leaves are reported, not fatal
#[test]
fn test_lifecycle_defects_are_recorded() {
    let mut sim = Simulation::from_config(&ScenarioConfig::adaptive_tree()).unwrap();
    sim.schedule(ms(3_000), SimEvent::SubscriberStart(s(1)));
    sim.schedule(ms(6_000), SimEvent::SubscriberStop(s(3)));
    sim.schedule(ms(7_000), SimEvent::SubscriberStart(s(99)));
    sim.run();

    let errors: Vec<(SimTime, EventError)> = sim
        .errors()
        .iter()
        .map(|e| (e.time, e.error.clone()))
        .collect();
    assert_eq!(
        errors,
        vec![
            (
                ms(3_000),
                EventError::Core(IcensError::Registry(RegistryError::DuplicateActiveSubscriber(s(1))))
            ),
            (
                ms(6_000),
                EventError::Core(IcensError::Registry(RegistryError::UnknownActiveSubscriber(s(3))))
            ),
            (
                ms(7_000),
                EventError::Core(IcensError::Identity(IdentityError::UnknownSubscriber(s(99))))
            ),
        ]
    );

    // Last valid state kept, the run carries on
    assert_eq!(sim.frequency_at(ms(3_500)).hz(), 5.0);
    assert_eq!(sim.frequency_at(ms(9_000)).hz(), 15.0);
    assert_eq!(sim.stats.joins, 3);
    assert_eq!(sim.stats.errors, 3);
    assert_eq!(sim.effective_frequency().hz(), 1.0);
}

#[test]
fn test_scenario_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.json");
    std::fs::write(&path, ScenarioConfig::race(false).to_json_pretty().unwrap()).unwrap();

    let config = ScenarioConfig::from_json_file(&path).unwrap();
    let mut sim = Simulation::from_config(&config).unwrap();
    sim.run();

    assert_eq!(sim.frequency_at(ms(12_001)).hz(), 25.0);
    assert_eq!(sim.stats.joins, 5);
    assert_eq!(sim.stats.leaves, 5);
}
