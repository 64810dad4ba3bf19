//! Simulation engine for icens
//!
//! Drives one producer and its subscribers through simulated time:
//! - Producer and subscriber start/stop events from the scenario
//! - Registry joins/leaves with synchronous rate re-negotiation
//! - Producer emissions at the effective frequency, handed to an
//!   [`EmissionSink`]
//! - Periodic subscription refreshes (keep-alives)
//!
//! Errors raised while handling an event are recorded and the run continues
//! with the last valid state.

use std::collections::BTreeMap;

use icens_core::{
    AppRole, EmissionSink, Frequency, IcensError, IdentityError, NodeId, Producer, ProducerUpdate, RateEvent,
    RecordingSink, RegistrySnapshot, SimTime, SubscriberId, SubscriberRegistry,
};
use icens_logging::NodeContextGuard;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, info_span, trace, warn};

use crate::adapter::LifecycleAdapter;
use crate::config::{ConfigError, ScenarioConfig, ScenarioPlan, StrategyConfig, SubscriberPlan};
use crate::scheduler::{SchedulerError, SimEvent, Scheduler};
use crate::topology::Topology;

/// Failure while handling one event
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error(transparent)]
    Core(#[from] IcensError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// An error recorded during a run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationError {
    pub time: SimTime,
    pub error: EventError,
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.time, self.error)
    }
}

/// One change of the effective frequency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyChange {
    pub time: SimTime,
    pub from: Frequency,
    pub to: Frequency,
    /// Subscriber whose demand set the new rate; `None` for the baseline
    pub driver: Option<SubscriberId>,
}

/// Statistics from the simulation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimStats {
    pub events_processed: u64,
    pub joins: u64,
    pub leaves: u64,
    pub rate_changes: u64,
    pub emissions: u64,
    /// Emission slots discarded because a reschedule superseded them
    pub stale_emissions: u64,
    pub refreshes: u64,
    pub errors: u64,
    /// Subscription interests sent per node (joins and refreshes)
    pub interests_by_node: BTreeMap<NodeId, u64>,
    /// Data packets emitted per node
    pub data_by_node: BTreeMap<NodeId, u64>,
}

/// The simulation state
#[derive(Debug)]
pub struct Simulation<S: EmissionSink = RecordingSink> {
    name: String,
    topology: Topology,
    strategy: StrategyConfig,
    stop_time: SimTime,
    scheduler: Scheduler,
    adapter: LifecycleAdapter,
    producer: Producer,
    producer_node: NodeId,
    subscribers: BTreeMap<SubscriberId, SubscriberPlan>,
    sink: S,
    timeline: Vec<FrequencyChange>,
    rate_events: Vec<RateEvent>,
    errors: Vec<SimulationError>,
    /// Statistics
    pub stats: SimStats,
}

impl Simulation<RecordingSink> {
    /// Validate `config` and build a simulation recording every emission
    pub fn from_config(config: &ScenarioConfig) -> Result<Self, ConfigError> {
        let plan = config.validate()?;
        let sink = RecordingSink::for_topic(plan.producer.settings.topic.clone());
        Ok(Self::with_sink(plan, sink))
    }

    /// Emissions recorded so far
    pub fn recorded(&self) -> &RecordingSink {
        &self.sink
    }
}

impl<S: EmissionSink> Simulation<S> {
    /// Build a simulation from a validated plan, sending emissions to `sink`
    ///
    /// All lifecycle events are scheduled here, in plan order.
    pub fn with_sink(plan: ScenarioPlan, sink: S) -> Self {
        let ScenarioPlan {
            name,
            stop_time,
            topology,
            strategy,
            producer,
            subscribers,
        } = plan;

        let mut sim = Self {
            name,
            topology,
            strategy,
            stop_time,
            scheduler: Scheduler::new(),
            adapter: LifecycleAdapter::new(),
            producer: Producer::new(producer.settings),
            producer_node: producer.node,
            subscribers: BTreeMap::new(),
            sink,
            timeline: Vec::new(),
            rate_events: Vec::new(),
            errors: Vec::new(),
            stats: SimStats::default(),
        };

        sim.schedule(producer.interval.start(), SimEvent::ProducerStart);
        sim.schedule(producer.interval.stop(), SimEvent::ProducerStop);
        for plan in subscribers {
            let id = plan.subscriber.id;
            sim.schedule(plan.subscriber.interval.start(), SimEvent::SubscriberStart(id));
            sim.schedule(plan.subscriber.interval.stop(), SimEvent::SubscriberStop(id));
            sim.adapter.register(plan.subscriber.clone());
            sim.subscribers.insert(id, plan);
        }

        info!(
            scenario = %sim.name,
            subscribers = sim.subscribers.len(),
            stop_time = %sim.stop_time,
            strategy = %sim.strategy.strategy,
            "Simulation initialized"
        );
        sim
    }

    /// Schedule an event; a non-causal request is recorded as an error
    pub fn schedule(&mut self, at: SimTime, event: SimEvent) {
        if let Err(e) = self.scheduler.schedule(at, event) {
            let now = self.scheduler.now();
            self.record_error(now, e.into());
        }
    }

    /// Process the next event
    ///
    /// Returns `false` once the queue is empty or the next event lies after
    /// the scenario stop time.
    pub fn step(&mut self) -> bool {
        match self.scheduler.peek_time() {
            Some(at) if at <= self.stop_time => {}
            _ => return false,
        }
        let Some(scheduled) = self.scheduler.pop_next() else {
            return false;
        };

        let now = scheduled.at;
        self.stats.events_processed += 1;

        let span = info_span!("event", time = %now, event = %scheduled.event);
        let _enter = span.enter();
        trace!(seq = scheduled.seq, "dispatch");

        match scheduled.event {
            SimEvent::ProducerStart => {
                let _ctx = NodeContextGuard::new(self.producer_node, AppRole::Producer);
                let snapshot = self.adapter.registry().snapshot();
                let update = self.producer.start(now, &snapshot);
                self.apply_update(now, update);
            }
            SimEvent::ProducerStop => {
                let _ctx = NodeContextGuard::new(self.producer_node, AppRole::Producer);
                self.producer.stop(now);
            }
            SimEvent::SubscriberStart(id) => self.handle_subscriber_start(now, id),
            SimEvent::SubscriberStop(id) => self.handle_subscriber_stop(now, id),
            SimEvent::SubscriptionRefresh(id) => self.handle_refresh(now, id),
            SimEvent::Emission { generation } => self.handle_emission(now, generation),
        }
        true
    }

    /// Run until no event remains at or before the stop time
    pub fn run(&mut self) {
        while self.step() {}
        info!(
            scenario = %self.name,
            time = %self.scheduler.now(),
            frequency = self.producer.effective_frequency().hz(),
            "Simulation complete"
        );
        info!("Stats: {:?}", self.stats);
    }

    /// Process every event scheduled at or before `until`
    pub fn run_until(&mut self, until: SimTime) {
        while self.scheduler.peek_time().is_some_and(|at| at <= until) && self.step() {}
    }

    fn handle_subscriber_start(&mut self, now: SimTime, id: SubscriberId) {
        let Some(plan) = self.subscribers.get(&id) else {
            self.record_error(now, IcensError::from(IdentityError::UnknownSubscriber(id)).into());
            return;
        };
        let node = plan.subscriber.node;
        let stop = plan.subscriber.interval.stop();
        let tx_timer = plan.tx_timer_nanos;
        let _ctx = NodeContextGuard::new(node, AppRole::Subscriber);

        match self.adapter.notify_subscriber_active(id, now, &mut self.producer) {
            Ok(update) => {
                self.stats.joins += 1;
                *self.stats.interests_by_node.entry(node).or_insert(0) += 1;
                self.rate_events.push(RateEvent::join(now, id));
                self.apply_update(now, update);
                self.schedule_refresh(now, id, tx_timer, stop);
            }
            Err(e) => self.record_error(now, e.into()),
        }
    }

    fn handle_subscriber_stop(&mut self, now: SimTime, id: SubscriberId) {
        let node = self.subscribers.get(&id).map(|p| p.subscriber.node);
        let _ctx = node.map(|node| NodeContextGuard::new(node, AppRole::Subscriber));

        match self.adapter.notify_subscriber_inactive(id, now, &mut self.producer) {
            Ok(update) => {
                self.stats.leaves += 1;
                self.rate_events.push(RateEvent::leave(now, id));
                self.apply_update(now, update);
            }
            Err(e) => self.record_error(now, e.into()),
        }
    }

    fn handle_refresh(&mut self, now: SimTime, id: SubscriberId) {
        let Some(plan) = self.subscribers.get(&id) else {
            return;
        };
        let node = plan.subscriber.node;
        let stop = plan.subscriber.interval.stop();
        let tx_timer = plan.tx_timer_nanos;

        if self.adapter.refresh(id, now) {
            self.stats.refreshes += 1;
            *self.stats.interests_by_node.entry(node).or_insert(0) += 1;
            self.schedule_refresh(now, id, tx_timer, stop);
        }
    }

    fn handle_emission(&mut self, now: SimTime, generation: u64) {
        let Some(emission) = self.producer.on_emission_due(now, generation) else {
            self.stats.stale_emissions += 1;
            trace!(generation, "stale emission slot discarded");
            return;
        };

        let _ctx = NodeContextGuard::new(self.producer_node, AppRole::Producer);
        let topic = self.producer.topic().clone();
        match self
            .sink
            .emit_once(now, self.producer_node, &topic, emission.payload, emission.frequency)
        {
            Ok(()) => {
                self.stats.emissions += 1;
                *self.stats.data_by_node.entry(self.producer_node).or_insert(0) += 1;
            }
            Err(e) => self.record_error(now, IcensError::from(e).into()),
        }

        self.schedule(emission.next.at, SimEvent::Emission {
            generation: emission.next.generation,
        });
    }

    fn schedule_refresh(&mut self, now: SimTime, id: SubscriberId, tx_timer: u64, stop: SimTime) {
        if let Some(at) = now.checked_add_nanos(tx_timer) {
            if at < stop {
                self.schedule(at, SimEvent::SubscriptionRefresh(id));
            }
        }
    }

    fn apply_update(&mut self, now: SimTime, update: ProducerUpdate) {
        if let Some(e) = update.error.clone() {
            self.record_error(now, IcensError::from(e).into());
        }
        if update.rate_changed() {
            self.stats.rate_changes += 1;
            self.timeline.push(FrequencyChange {
                time: now,
                from: update.previous,
                to: update.current,
                driver: update.driver,
            });
        }
        if let Some(slot) = update.reschedule {
            self.schedule(slot.at, SimEvent::Emission {
                generation: slot.generation,
            });
        }
    }

    fn record_error(&mut self, time: SimTime, error: EventError) {
        match &error {
            EventError::Scheduler(_) => error!(time = %time, %error, "event could not be scheduled"),
            EventError::Core(_) => warn!(time = %time, %error, "event rejected"),
        }
        self.stats.errors += 1;
        self.errors.push(SimulationError { time, error });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn stop_time(&self) -> SimTime {
        self.stop_time
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    pub fn producer_node(&self) -> NodeId {
        self.producer_node
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        self.adapter.registry()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.adapter.registry().snapshot()
    }

    pub fn effective_frequency(&self) -> Frequency {
        self.producer.effective_frequency()
    }

    /// Effective frequency in force at `at`, reconstructed from the timeline
    pub fn frequency_at(&self, at: SimTime) -> Frequency {
        self.timeline
            .iter()
            .take_while(|change| change.time <= at)
            .last()
            .map(|change| change.to)
            .unwrap_or_else(|| self.producer.baseline())
    }

    pub fn timeline(&self) -> &[FrequencyChange] {
        &self.timeline
    }

    /// Joins and leaves applied so far, in processing order
    pub fn rate_events(&self) -> &[RateEvent] {
        &self.rate_events
    }

    pub fn errors(&self) -> &[SimulationError] {
        &self.errors
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn subscriber_plans(&self) -> impl Iterator<Item = &SubscriberPlan> {
        self.subscribers.values()
    }

    /// One-line summary of the current state
    pub fn state_summary(&self) -> String {
        format!(
            "t={} active={:?} frequency={} state={:?} emitted={}",
            self.now(),
            self.snapshot().ids(),
            self.effective_frequency(),
            self.producer.state(),
            self.stats.emissions
        )
    }
}
