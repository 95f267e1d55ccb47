//! Invariant monitor.
//!
//! The Monitor watches the event stream of a running simulation and keeps
//! the observer's view of the world:
//! - Last reported status of every node and agent
//! - Which agent occupies which node
//!
//! Anything that contradicts the model (a status moving backwards, two
//! agents on one node) is recorded as a [`Violation`].

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use wildfire_core::{
    AgentId, AgentSnapshot, AgentStatus, Location, NodeSnapshot, NodeStatus, SimEvent,
};

/// An observed contradiction of the simulation invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Violation {
    /// A node status moved backwards
    #[error("node {location} went from {from:?} back to {to:?}")]
    StatusRegressed {
        location: Location,
        from: NodeStatus,
        to: NodeStatus,
    },

    /// An agent status moved backwards
    #[error("agent {agent} went from {from:?} back to {to:?}")]
    AgentRegressed {
        agent: AgentId,
        from: AgentStatus,
        to: AgentStatus,
    },

    /// A node reported a second, different resident
    #[error("node {location} resident changed from {was} to {now}")]
    ResidentReplaced {
        location: Location,
        was: AgentId,
        now: AgentId,
    },

    /// Two agents bound to the same node
    #[error("agents {first} and {second} both bound to {location}")]
    SharedNode {
        location: Location,
        first: AgentId,
        second: AgentId,
    },
}

/// Event-stream checker.
#[derive(Debug, Default)]
pub struct Monitor {
    /// Last status seen per node
    nodes: HashMap<Location, NodeStatus>,

    /// Last status seen per agent
    agents: HashMap<AgentId, AgentStatus>,

    /// Resident reported per node
    residents: HashMap<Location, AgentId>,

    /// Fortified (or dead) agent per node
    bound: HashMap<Location, AgentId>,

    /// Violations in detection order
    violations: Vec<Violation>,

    /// Events consumed
    observed: usize,

    /// Events lost because the monitor fell behind
    lagged: u64,
}

impl Monitor {
    /// Creates an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks one event against everything seen so far.
    pub fn observe(&mut self, event: &SimEvent) {
        self.observed += 1;

        match event {
            SimEvent::Node {
                location,
                status,
                resident,
                ..
            } => {
                if let Some(from) = self.nodes.insert(*location, *status) {
                    if *status < from {
                        self.record(Violation::StatusRegressed {
                            location: *location,
                            from,
                            to: *status,
                        });
                    }
                }
                if let Some(now) = resident {
                    match self.residents.get(location) {
                        Some(was) if was != now => self.record(Violation::ResidentReplaced {
                            location: *location,
                            was: was.clone(),
                            now: now.clone(),
                        }),
                        Some(_) => {}
                        None => {
                            self.residents.insert(*location, now.clone());
                        }
                    }
                }
            }
            SimEvent::Agent {
                agent,
                status,
                location,
            } => {
                if let Some(from) = self.agents.insert(agent.clone(), *status) {
                    if *status < from {
                        self.record(Violation::AgentRegressed {
                            agent: agent.clone(),
                            from,
                            to: *status,
                        });
                    }
                }
                if *status != AgentStatus::Searching {
                    self.bind(*location, agent);
                }
            }
            SimEvent::IgnitionScheduled { .. } | SimEvent::StationLog { .. } => {}
        }
    }

    /// Notes events dropped by a lagging subscription.
    pub fn lagged(&mut self, missed: u64) {
        warn!(missed, "monitor lagged behind the event stream");
        self.lagged += missed;
    }

    /// Cross-checks the final snapshots.
    pub fn finish(&mut self, nodes: &[NodeSnapshot], agents: &[AgentSnapshot]) {
        for node in nodes {
            if let Some(&seen) = self.nodes.get(&node.location) {
                if node.status < seen {
                    self.record(Violation::StatusRegressed {
                        location: node.location,
                        from: seen,
                        to: node.status,
                    });
                }
            }
        }
        for agent in agents {
            if agent.status != AgentStatus::Searching {
                self.bind(agent.bound, &agent.id);
            }
        }
    }

    fn bind(&mut self, location: Location, agent: &AgentId) {
        match self.bound.get(&location) {
            Some(first) if first != agent => {
                let violation = Violation::SharedNode {
                    location,
                    first: first.clone(),
                    second: agent.clone(),
                };
                self.record(violation);
            }
            Some(_) => {}
            None => {
                self.bound.insert(location, agent.clone());
            }
        }
    }

    fn record(&mut self, violation: Violation) {
        error!(%violation, "invariant violated");
        self.violations.push(violation);
    }

    /// Returns true if no violation was seen.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn lagged_events(&self) -> u64 {
        self.lagged
    }

    /// Last status seen for a node.
    pub fn node_status(&self, location: Location) -> Option<NodeStatus> {
        self.nodes.get(&location).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildfire_core::DisplayStatus;

    fn node_event(x: i32, status: NodeStatus, resident: Option<&str>) -> SimEvent {
        let occupied = resident.is_some();
        SimEvent::Node {
            location: Location::new(x, 0),
            status,
            display: DisplayStatus::derive(status, occupied),
            resident: resident.map(|r| AgentId::new(r).unwrap()),
        }
    }

    fn agent_event(name: &str, status: AgentStatus, x: i32) -> SimEvent {
        SimEvent::Agent {
            agent: AgentId::new(name).unwrap(),
            status,
            location: Location::new(x, 0),
        }
    }

    #[test]
    fn test_forward_progress_is_clean() {
        let mut monitor = Monitor::new();
        monitor.observe(&node_event(1, NodeStatus::Safe, None));
        monitor.observe(&node_event(1, NodeStatus::Threatened, None));
        monitor.observe(&node_event(1, NodeStatus::Threatened, Some("a")));
        monitor.observe(&agent_event("a", AgentStatus::Fortified, 1));
        monitor.observe(&node_event(1, NodeStatus::Burning, Some("a")));
        monitor.observe(&agent_event("a", AgentStatus::Dead, 1));

        assert!(monitor.is_clean());
        assert_eq!(monitor.observed(), 6);
        assert_eq!(monitor.node_status(Location::new(1, 0)), Some(NodeStatus::Burning));
    }

    #[test]
    fn test_status_regression_detected() {
        let mut monitor = Monitor::new();
        monitor.observe(&node_event(2, NodeStatus::Burning, None));
        monitor.observe(&node_event(2, NodeStatus::Threatened, None));

        assert_eq!(
            monitor.violations(),
            &[Violation::StatusRegressed {
                location: Location::new(2, 0),
                from: NodeStatus::Burning,
                to: NodeStatus::Threatened,
            }]
        );
    }

    #[test]
    fn test_shared_node_detected() {
        let mut monitor = Monitor::new();
        monitor.observe(&agent_event("a", AgentStatus::Fortified, 3));
        monitor.observe(&agent_event("b", AgentStatus::Fortified, 3));

        assert!(matches!(monitor.violations(), [Violation::SharedNode { .. }]));
    }

    #[test]
    fn test_resident_replacement_detected() {
        let mut monitor = Monitor::new();
        monitor.observe(&node_event(0, NodeStatus::Safe, Some("a")));
        monitor.observe(&node_event(0, NodeStatus::Safe, Some("b")));

        assert!(matches!(monitor.violations(), [Violation::ResidentReplaced { .. }]));
    }

    #[test]
    fn test_searching_agents_do_not_bind() {
        let mut monitor = Monitor::new();
        monitor.observe(&agent_event("a", AgentStatus::Searching, 0));
        monitor.observe(&agent_event("b", AgentStatus::Fortified, 0));
        assert!(monitor.is_clean());
    }

    #[test]
    fn test_finish_checks_snapshots() {
        let mut monitor = Monitor::new();
        monitor.observe(&node_event(0, NodeStatus::Threatened, None));

        let nodes = vec![NodeSnapshot {
            location: Location::new(0, 0),
            status: NodeStatus::Safe,
            display: DisplayStatus::Safe,
            resident: None,
            is_station: true,
        }];
        monitor.finish(&nodes, &[]);

        assert_eq!(monitor.violations().len(), 1);
    }
}
