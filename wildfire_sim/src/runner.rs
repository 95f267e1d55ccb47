//! Scenario runner - drives one simulation from ignition until the fire settles.

use crate::context::SimContext;
use crate::loader::LoadError;
use crate::monitor::{Monitor, Violation};
use crate::scenarios::ScenarioId;

use serde::Serialize;
use std::time::{Duration, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use wildfire_core::{
    AgentSnapshot, AgentStatus, LogEntry, Location, NodeSnapshot, NodeStatus, SimConfig, SimError,
    SimEvent, Simulation, TopologyInput,
};
use wildfire_env::WildfireContext;

/// Quiet time units after which a run with no pending ignition is settled.
const QUIET_UNITS: u32 = 2;

/// Fraction of a time unit between starting the nodes and dispatching the
/// searcher, so the first NodeDeath wave has been handled.
const DISPATCH_DELAY_UNITS: f64 = 0.1;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The topology or configuration was rejected, or the driver misbehaved
    #[error(transparent)]
    Sim(#[from] SimError),

    /// The configuration file could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The tokio runtime could not be built
    #[error("cannot build runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario name (or config file path)
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Wall-clock start of the run, milliseconds since the Unix epoch
    pub started_at_unix_ms: u64,

    /// Whether the monitor saw no violation
    pub passed: bool,

    /// Whether the fire settled before the duration ran out
    pub settled: bool,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// The initial searching agent, as it ended
    pub searcher: AgentSnapshot,

    /// Final node snapshots, ordered by location
    pub nodes: Vec<NodeSnapshot>,

    /// Final agent snapshots, in creation order
    pub agents: Vec<AgentSnapshot>,

    /// Station log
    pub station_log: Vec<LogEntry>,

    /// Nodes with no route to the station
    pub unreachable: Vec<Location>,

    /// Every event observed, in order
    pub events: Vec<SimEvent>,

    /// Invariant violations
    pub violations: Vec<Violation>,

    /// Metrics collected during the run
    pub metrics: ScenarioMetrics,
}

/// Counts collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioMetrics {
    pub nodes_safe: usize,
    pub nodes_threatened: usize,
    pub nodes_burning: usize,
    pub agents_created: usize,
    pub agents_fortified: usize,
    pub agents_dead: usize,
    pub log_entries: usize,
    pub ignitions_scheduled: usize,
    pub events_observed: usize,
    pub events_lagged: u64,
}

impl ScenarioResult {
    /// Failure message if any.
    pub fn failure_reason(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        let reasons: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        Some(reasons.join("; "))
    }

    /// Final status of a node.
    pub fn node_status(&self, location: Location) -> Option<NodeStatus> {
        self.nodes
            .iter()
            .find(|n| n.location == location)
            .map(|n| n.status)
    }
}

/// Runs simulations on a seeded context.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Simulation configuration
    config: SimConfig,

    /// Maximum simulated duration
    max_duration: Duration,

    /// Run on the wall clock instead of a paused virtual clock
    realtime: bool,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: SimConfig::default(),
            max_duration: Duration::from_secs(120),
            realtime: false,
        }
    }

    /// Replaces the simulation configuration.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the length of one time unit.
    pub fn with_time_unit(mut self, unit: Duration) -> Self {
        self.config.time_unit = unit;
        self
    }

    /// Enables or disables fire spreading.
    pub fn with_fire_spread(mut self, enabled: bool) -> Self {
        self.config.fire_spread = enabled;
        self
    }

    /// Sets the maximum duration. Values too large for a `Duration`
    /// (including infinity) mean no limit.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration = Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX);
        self
    }

    /// Runs on the wall clock.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a built-in scenario.
    pub fn run_scenario(&self, scenario: ScenarioId) -> Result<ScenarioResult, RunError> {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        self.run(scenario.name(), &scenario.topology())
    }

    /// Runs a topology on a fresh single-threaded runtime.
    pub fn run(&self, name: &str, input: &TopologyInput) -> Result<ScenarioResult, RunError> {
        let mut builder = tokio::runtime::Builder::new_current_thread();
        builder.enable_time();
        if !self.realtime {
            builder.start_paused(true);
        }
        let runtime = builder.build().map_err(RunError::Runtime)?;
        runtime.block_on(self.run_async(name, input))
    }

    /// Runs a topology on the current runtime.
    pub async fn run_async(
        &self,
        name: &str,
        input: &TopologyInput,
    ) -> Result<ScenarioResult, RunError> {
        let ctx = SimContext::shared(self.seed);
        let started_at_unix_ms = ctx
            .system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let mut sim = Simulation::build(input, ctx.clone(), self.config.clone())?;
        let mut events = sim.subscribe();
        let mut monitor = Monitor::new();
        let mut recorded = Vec::new();

        let unreachable = sim.topology().unreachable();
        if !unreachable.is_empty() {
            warn!(count = unreachable.len(), "nodes cannot reach the station");
        }

        let station = sim.topology().station();
        sim.ignite(sim.topology().fire_origin())?;
        sim.start_all_nodes()?;
        ctx.sleep(self.config.time_unit.mul_f64(DISPATCH_DELAY_UNITS))
            .await;
        let searcher = sim.dispatch_initial_agent(station)?;

        let quiet = self.config.time_unit * QUIET_UNITS;
        let mut settled = false;
        loop {
            let remaining = self.max_duration.saturating_sub(ctx.now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(quiet.min(remaining), events.recv()).await {
                Ok(Ok(event)) => {
                    monitor.observe(&event);
                    recorded.push(event);
                }
                Ok(Err(RecvError::Lagged(missed))) => monitor.lagged(missed),
                Ok(Err(RecvError::Closed)) => break,
                Err(_) if sim.pending_ignitions() == 0 => {
                    settled = true;
                    break;
                }
                Err(_) => {
                    debug!(pending = sim.pending_ignitions(), "quiet, waiting for ignitions");
                }
            }
        }
        while let Ok(event) = events.try_recv() {
            monitor.observe(&event);
            recorded.push(event);
        }
        if !settled {
            warn!(
                pending = sim.pending_ignitions(),
                "duration elapsed before the fire settled"
            );
        }

        let nodes = sim.nodes();
        let agents = sim.agents();
        monitor.finish(&nodes, &agents);

        let station_log = sim.station_log();
        let searcher = agents
            .iter()
            .find(|a| a.id == searcher.id)
            .cloned()
            .unwrap_or(searcher);
        let metrics = ScenarioMetrics {
            nodes_safe: count_nodes(&nodes, NodeStatus::Safe),
            nodes_threatened: count_nodes(&nodes, NodeStatus::Threatened),
            nodes_burning: count_nodes(&nodes, NodeStatus::Burning),
            agents_created: agents.len(),
            agents_fortified: count_agents(&agents, AgentStatus::Fortified),
            agents_dead: count_agents(&agents, AgentStatus::Dead),
            log_entries: station_log.len(),
            ignitions_scheduled: recorded
                .iter()
                .filter(|e| matches!(e, SimEvent::IgnitionScheduled { .. }))
                .count(),
            events_observed: monitor.observed(),
            events_lagged: monitor.lagged_events(),
        };
        info!(
            scenario = name,
            burning = metrics.nodes_burning,
            agents = metrics.agents_created,
            logged = metrics.log_entries,
            "run finished"
        );

        Ok(ScenarioResult {
            scenario: name.to_string(),
            seed: ctx.seed(),
            started_at_unix_ms,
            passed: monitor.is_clean(),
            settled,
            final_time_secs: ctx.now().as_secs_f64(),
            searcher,
            nodes,
            agents,
            station_log,
            unreachable,
            events: recorded,
            violations: monitor.violations().to_vec(),
            metrics,
        })
    }
}

fn count_nodes(nodes: &[NodeSnapshot], status: NodeStatus) -> usize {
    nodes.iter().filter(|n| n.status == status).count()
}

fn count_agents(agents: &[AgentSnapshot], status: AgentStatus) -> usize {
    agents.iter().filter(|a| a.status == status).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_line_burns_out() {
        let result = ScenarioRunner::new(42)
            .run_scenario(ScenarioId::Line)
            .unwrap();

        assert!(result.passed, "{:?}", result.failure_reason());
        assert!(result.settled);
        assert_eq!(result.metrics.nodes_burning, 5);
        assert_ne!(result.searcher.status, AgentStatus::Searching);
        assert_eq!(result.station_log[0].report.agent, result.searcher.id);
        assert_eq!(result.metrics.ignitions_scheduled, 4);
    }

    #[test]
    fn test_split_island_untouched() {
        let result = ScenarioRunner::new(7)
            .run_scenario(ScenarioId::Split)
            .unwrap();

        assert!(result.passed);
        assert_eq!(result.unreachable, vec![Location::new(5, 2), Location::new(6, 2)]);
        assert_eq!(result.node_status(Location::new(5, 2)), Some(NodeStatus::Safe));
        assert_eq!(result.node_status(Location::new(0, 0)), Some(NodeStatus::Burning));
        assert!(result
            .station_log
            .iter()
            .all(|e| !result.unreachable.contains(&e.report.origin)));
    }

    #[test]
    fn test_all_scenarios_pass() {
        for scenario in ScenarioId::all() {
            let result = ScenarioRunner::new(1).run_scenario(scenario).unwrap();
            assert!(result.passed, "{scenario}: {:?}", result.failure_reason());
            assert!(result.settled, "{scenario} did not settle");
            assert!(!result.station_log.is_empty());
        }
    }

    #[test]
    fn test_no_spread_stops_at_first_ring() {
        let result = ScenarioRunner::new(3)
            .with_fire_spread(false)
            .run_scenario(ScenarioId::Line)
            .unwrap();

        assert!(result.settled);
        assert_eq!(result.metrics.nodes_burning, 1);
        assert_eq!(result.metrics.nodes_threatened, 1);
        assert_eq!(result.metrics.ignitions_scheduled, 0);
        assert_eq!(result.searcher.status, AgentStatus::Fortified);
        assert_eq!(result.searcher.bound, Location::new(3, 0));
    }

    #[test]
    fn test_short_duration_does_not_settle() {
        let result = ScenarioRunner::new(5)
            .with_duration(1.0)
            .run_scenario(ScenarioId::Grid)
            .unwrap();

        assert!(!result.settled);
        assert!(result.final_time_secs >= 1.0);
        assert!(result.metrics.nodes_burning < 25);
    }

    #[test]
    fn test_time_unit_scales_run() {
        let result = ScenarioRunner::new(9)
            .with_time_unit(Duration::from_millis(10))
            .run_scenario(ScenarioId::Line)
            .unwrap();

        assert!(result.settled);
        assert_eq!(result.metrics.nodes_burning, 5);
        assert!(result.final_time_secs < 1.0);
    }

    #[test]
    fn test_same_seed_same_fire() {
        let delays = |result: &ScenarioResult| -> Vec<(Location, u64)> {
            let mut delays: Vec<_> = result
                .events
                .iter()
                .filter_map(|e| match e {
                    SimEvent::IgnitionScheduled { location, delay_ms } => Some((*location, *delay_ms)),
                    _ => None,
                })
                .collect();
            delays.sort();
            delays
        };

        let a = ScenarioRunner::new(11).run_scenario(ScenarioId::Ring).unwrap();
        let b = ScenarioRunner::new(11).run_scenario(ScenarioId::Ring).unwrap();
        assert_eq!(delays(&a), delays(&b));
    }

    #[test]
    fn test_unbounded_duration_runs_until_settled() {
        for secs in [f64::INFINITY, 1e30] {
            let runner = ScenarioRunner::new(4).with_duration(secs);
            assert_eq!(runner.max_duration, Duration::MAX);

            let result = runner.run_scenario(ScenarioId::Line).unwrap();
            assert!(result.settled);
            assert_eq!(result.metrics.nodes_burning, 5);
        }
        assert_eq!(ScenarioRunner::new(4).with_duration(-3.0).max_duration, Duration::ZERO);
    }

    #[test]
    fn test_result_carries_context_seed_and_start() {
        let result = ScenarioRunner::new(21).run_scenario(ScenarioId::Line).unwrap();
        assert_eq!(result.seed, 21);
        // Seeded runs start at the simulation epoch, 2024-01-01 00:00:00 UTC.
        assert_eq!(result.started_at_unix_ms, 1_704_067_200_000);
    }

    #[test]
    fn test_invalid_topology_rejected() {
        let input = TopologyInput::new().node(0, 0).station(0, 0);
        let err = ScenarioRunner::new(0).run("broken", &input).unwrap_err();
        assert!(matches!(err, RunError::Sim(SimError::Config(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_grid_invariants_hold(seed in any::<u64>()) {
            let result = ScenarioRunner::new(seed).run_scenario(ScenarioId::Grid).unwrap();
            prop_assert!(result.passed, "{:?}", result.failure_reason());
            prop_assert!(result.searcher.status != AgentStatus::Searching);
            prop_assert_eq!(result.metrics.nodes_burning, 25);
        }
    }
}
