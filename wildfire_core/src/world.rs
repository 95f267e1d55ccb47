//! Shared state reachable from every actor task.

use crate::agent::AgentHandle;
use crate::config::SimConfig;
use crate::events::{EventBus, SimEvent};
use crate::identity::CreationClock;
use crate::message::{CreationReport, Message};
use crate::node::{NodeCell, NodeStatus};
use crate::station::{LogEntry, StationLog};
use crate::topology::Location;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};
use wildfire_env::WildfireContext;

/// The node registry plus everything the actors share.
///
/// Node cells are created once and never removed, so the registry itself
/// needs no lock.
pub(crate) struct World<Ctx: WildfireContext> {
    /// Environment (time, tasks, randomness)
    pub ctx: Arc<Ctx>,

    /// Simulation configuration
    pub config: SimConfig,

    /// All nodes by location
    nodes: HashMap<Location, Arc<NodeCell>>,

    /// Every agent ever created, in creation order
    agents: Mutex<Vec<AgentHandle>>,

    /// The station's log
    pub log: StationLog,

    /// Observation bus
    pub events: EventBus,

    /// Creation timestamp issuer
    pub clock: CreationClock,

    /// Ignition timers armed but not yet fired
    pending_ignitions: AtomicUsize,
}

impl<Ctx: WildfireContext> World<Ctx> {
    pub fn new(ctx: Arc<Ctx>, config: SimConfig, nodes: HashMap<Location, Arc<NodeCell>>) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            ctx,
            config,
            nodes,
            agents: Mutex::new(Vec::new()),
            log: StationLog::default(),
            events,
            clock: CreationClock::default(),
            pending_ignitions: AtomicUsize::new(0),
        }
    }

    pub fn node(&self, location: Location) -> Option<&Arc<NodeCell>> {
        self.nodes.get(&location)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<NodeCell>> {
        self.nodes.values()
    }

    /// Posts to a node unless it is observed Burning.
    ///
    /// A send that races with the target burning down is dropped.
    pub fn deliver(&self, node: &NodeCell, message: Message) -> bool {
        if node.status() == NodeStatus::Burning {
            return false;
        }
        match node.post(message) {
            Ok(()) => true,
            Err(err) => {
                trace!(node = %node.location(), %err, "delivery lost to burning node");
                false
            }
        }
    }

    /// Broadcasts a message to every non-Burning neighbor of `from`.
    pub fn flood(&self, from: &NodeCell, message: &Message) -> usize {
        from.neighbors()
            .iter()
            .filter_map(|n| self.nodes.get(n))
            .filter(|n| self.deliver(n, message.clone()))
            .count()
    }

    pub fn register_agent(&self, agent: AgentHandle) {
        self.agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(agent);
    }

    pub fn agents(&self) -> Vec<AgentHandle> {
        self.agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Appends a report to the station log and announces it.
    pub fn log_creation(&self, report: CreationReport) -> LogEntry {
        let entry = self.log.append(report);
        debug!(
            agent = %entry.report.agent,
            origin = %entry.report.origin,
            hops = entry.report.visited.len(),
            "station logged creation"
        );
        self.events.publish(SimEvent::StationLog {
            entry: entry.clone(),
        });
        entry
    }

    /// Publishes the current display status of a node.
    pub fn publish_node(&self, node: &NodeCell) {
        let snapshot = node.snapshot();
        self.events.publish(SimEvent::Node {
            location: snapshot.location,
            status: snapshot.status,
            display: snapshot.display,
            resident: snapshot.resident,
        });
    }

    pub fn ignition_armed(&self) {
        self.pending_ignitions.fetch_add(1, Ordering::AcqRel);
    }

    pub fn ignition_fired(&self) {
        self.pending_ignitions.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn pending_ignitions(&self) -> usize {
        self.pending_ignitions.load(Ordering::Acquire)
    }
}
