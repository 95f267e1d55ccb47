//! Sensor node actor.
//!
//! Each node runs as its own task and reacts to its mailbox until it burns:
//!
//! ```text
//!   Safe ──NodeDeath──▶ Threatened ──CatchFire──▶ Burning (task exits)
//!     │                                               ▲
//!     └────────────────────CatchFire──────────────────┘
//! ```
//!
//! Status and occupancy sit behind one mutex per node. Only the node's own
//! task writes the status (plus `ignite` before tasks start); residency
//! claims by searching agents check status and occupancy in the same
//! critical section, which makes a claim atomic.

use crate::agent::{AgentActor, AgentHandle, AgentStatus};
use crate::events::{DisplayStatus, SimEvent};
use crate::identity::{AgentId, AgentSequence};
use crate::message::{AgentSighting, CreationReport, Message};
use crate::topology::{Location, NodeSpec};
use crate::world::World;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};
use wildfire_env::{EnvError, Mailbox, MailboxSender, WildfireContext};

/// Core node status. Ordered: transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeStatus {
    Safe,
    Threatened,
    Burning,
}

#[derive(Debug)]
struct NodeState {
    status: NodeStatus,
    resident: Option<AgentHandle>,
}

/// Point-in-time view of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub location: Location,
    pub status: NodeStatus,
    pub display: DisplayStatus,
    pub resident: Option<AgentId>,
    pub is_station: bool,
}

/// The shared half of a node: identity, adjacency, guarded state and the
/// posting side of its mailbox.
#[derive(Debug)]
pub struct NodeCell {
    location: Location,
    is_station: bool,
    neighbors: Vec<Location>,
    channels: Vec<Location>,
    state: Mutex<NodeState>,
    mailbox: MailboxSender<Message>,
    agent_seq: AgentSequence,
}

impl NodeCell {
    /// Creates the cell for `spec` and returns it with its mailbox.
    pub(crate) fn new(spec: &NodeSpec) -> (Arc<Self>, Mailbox<Message>) {
        let (tx, rx) = wildfire_env::mailbox(format!("node-{}", spec.location));
        let cell = Self {
            location: spec.location,
            is_station: spec.is_station,
            neighbors: spec.neighbors.clone(),
            channels: spec.channels.clone(),
            state: Mutex::new(NodeState {
                status: NodeStatus::Safe,
                resident: None,
            }),
            mailbox: tx,
            agent_seq: AgentSequence::default(),
        };
        (Arc::new(cell), rx)
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn is_station(&self) -> bool {
        self.is_station
    }

    pub fn neighbors(&self) -> &[Location] {
        &self.neighbors
    }

    pub fn channels(&self) -> &[Location] {
        &self.channels
    }

    pub fn status(&self) -> NodeStatus {
        self.lock().status
    }

    /// Name of the resident agent, if any.
    pub fn resident(&self) -> Option<AgentId> {
        self.lock().resident.as_ref().map(|a| a.id().clone())
    }

    pub fn has_resident(&self) -> bool {
        self.lock().resident.is_some()
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        let state = self.lock();
        NodeSnapshot {
            location: self.location,
            status: state.status,
            display: DisplayStatus::derive(state.status, state.resident.is_some()),
            resident: state.resident.as_ref().map(|a| a.id().clone()),
            is_station: self.is_station,
        }
    }

    pub(crate) fn post(&self, message: Message) -> Result<(), EnvError> {
        self.mailbox.post(message)
    }

    pub(crate) fn next_agent_id(&self) -> AgentId {
        self.agent_seq.next_id(self.location)
    }

    /// Moves the status forward. Returns false (and changes nothing) if
    /// `next` is not ahead of the current status.
    pub(crate) fn advance(&self, next: NodeStatus) -> bool {
        let mut state = self.lock();
        if next <= state.status {
            return false;
        }
        state.status = next;
        true
    }

    /// Atomically makes `agent` the resident if this node is Threatened and
    /// unoccupied, fortifying the agent in the same step.
    pub(crate) fn try_claim(&self, agent: &AgentHandle) -> bool {
        let mut state = self.lock();
        if state.status != NodeStatus::Threatened || state.resident.is_some() {
            return false;
        }
        agent.fortify_at(self.location);
        state.resident = Some(agent.clone());
        true
    }

    /// Installs the agent built by `spawn` unless the node is occupied.
    pub(crate) fn host_with<F>(&self, spawn: F) -> Option<AgentHandle>
    where
        F: FnOnce() -> AgentHandle,
    {
        let mut state = self.lock();
        if state.resident.is_some() {
            return None;
        }
        let agent = spawn();
        state.resident = Some(agent.clone());
        Some(agent)
    }

    fn resident_handle(&self) -> Option<AgentHandle> {
        self.lock().resident.clone()
    }
}

/// Salts separating node random streams from agent streams.
const RELAY_STREAM_SALT: u64 = 0x6e6f_6465_0000_0000;
const IGNITION_STREAM_SALT: u64 = 0x6669_7265_0000_0000;

/// The task half of a node.
pub(crate) struct NodeActor<Ctx: WildfireContext> {
    cell: Arc<NodeCell>,
    mailbox: Mailbox<Message>,
    world: Arc<World<Ctx>>,
    rng: ChaCha8Rng,
}

impl<Ctx: WildfireContext> NodeActor<Ctx> {
    pub fn new(cell: Arc<NodeCell>, mailbox: Mailbox<Message>, world: Arc<World<Ctx>>) -> Self {
        let rng = world
            .ctx
            .derive_rng(RELAY_STREAM_SALT ^ cell.location.stream_id());
        Self {
            cell,
            mailbox,
            world,
            rng,
        }
    }

    /// Processes messages until the node burns, then announces its death.
    pub async fn run(mut self) {
        debug!(node = %self.cell.location, "node task started");

        while self.cell.status() != NodeStatus::Burning {
            let Some(message) = self.mailbox.recv().await else {
                return;
            };
            self.handle(message);
            self.world.publish_node(&self.cell);
        }

        burn_down(&self.world, &self.cell);
    }

    fn handle(&mut self, message: Message) {
        trace!(node = %self.cell.location, kind = ?message.kind(), "handling");

        match message {
            Message::Fortification => {
                if self.cell.status() == NodeStatus::Threatened {
                    self.announce_resident();
                }
            }
            Message::NodeDeath => {
                let newly_threatened = self.cell.advance(NodeStatus::Threatened);
                self.announce_resident();
                if newly_threatened {
                    debug!(node = %self.cell.location, "threatened");
                    if self.world.config.fire_spread {
                        self.arm_ignition();
                    }
                }
            }
            Message::AgentCreation(sighting) => self.host_relay_agent(sighting),
            Message::CatchFire => {
                self.cell.advance(NodeStatus::Burning);
            }
            Message::Creation(report) => {
                if self.cell.is_station {
                    self.world.log_creation(report);
                } else {
                    self.relay(report);
                }
            }
        }
    }

    /// Floods `AgentCreation` if an agent lives here.
    fn announce_resident(&self) {
        if let Some(agent) = self.cell.resident() {
            let sighting = AgentSighting {
                agent,
                location: self.cell.location,
            };
            self.world.flood(&self.cell, &Message::AgentCreation(sighting));
        }
    }

    fn host_relay_agent(&self, sighting: AgentSighting) {
        let hosted = self.cell.host_with(|| {
            AgentActor::spawn(&self.world, &self.cell, AgentStatus::Fortified)
        });
        if let Some(agent) = hosted {
            debug!(
                node = %self.cell.location,
                agent = %agent.id(),
                sighted = %sighting.agent,
                from = %sighting.location,
                "relay agent created"
            );
        }
    }

    /// Forwards a creation report one hop toward the station.
    fn relay(&mut self, mut report: CreationReport) {
        let mut hops = self.cell.channels.clone();
        hops.shuffle(&mut self.rng);

        let next = hops
            .into_iter()
            .filter(|hop| !report.has_visited(*hop))
            .filter_map(|hop| self.world.node(hop))
            .find(|node| node.status() != NodeStatus::Burning)
            .cloned();

        match next {
            Some(node) => {
                report.push_visited(self.cell.location);
                self.world.deliver(&node, Message::Creation(report));
            }
            None => {
                trace!(
                    node = %self.cell.location,
                    agent = %report.agent,
                    "no eligible channel, creation report dropped"
                );
            }
        }
    }

    /// Arms the one-shot ignition timer.
    ///
    /// The delay is drawn from the node's ignition stream, independent of
    /// relay shuffles.
    fn arm_ignition(&self) {
        let mut rng = self
            .world
            .ctx
            .derive_rng(IGNITION_STREAM_SALT ^ self.cell.location.stream_id());
        let delay = self.world.config.ignition_delay(rng.gen::<f64>());
        let world = Arc::clone(&self.world);
        let cell = Arc::clone(&self.cell);

        world.ignition_armed();
        world.events.publish(SimEvent::IgnitionScheduled {
            location: cell.location,
            delay_ms: delay.as_millis() as u64,
        });

        let name = format!("ignition-{}", cell.location);
        self.world.ctx.spawn(&name, async move {
            world.ctx.sleep(delay).await;
            world.deliver(&cell, Message::CatchFire);
            world.ignition_fired();
        });
    }
}

/// Death announcement: neighbors and the resident agent learn of the fire.
pub(crate) fn burn_down<Ctx: WildfireContext>(world: &World<Ctx>, cell: &NodeCell) {
    let reached = world.flood(cell, &Message::NodeDeath);
    if let Some(agent) = cell.resident_handle() {
        if let Err(err) = agent.post(Message::NodeDeath) {
            trace!(node = %cell.location, %err, "resident agent already gone");
        }
    }
    debug!(node = %cell.location, neighbors = reached, "burning");
    world.publish_node(cell);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::world::testing::{spec, start, wire};
    use std::time::Duration;
    use tokio::sync::broadcast;
    use wildfire_env::TokioContext;

    fn loc(x: i32, y: i32) -> Location {
        Location::new(x, y)
    }

    fn no_spread() -> SimConfig {
        SimConfig {
            fire_spread: false,
            ..SimConfig::default()
        }
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn drain(rx: &mut broadcast::Receiver<SimEvent>) -> Vec<SimEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Station (0, 0). (1, 1) forwards through (1, 0) or (0, 1).
    fn diamond() -> Vec<NodeSpec> {
        vec![
            spec((0, 0), &[(1, 0), (0, 1)], &[], true),
            spec((1, 0), &[(0, 0), (1, 1)], &[(0, 0)], false),
            spec((0, 1), &[(0, 0), (1, 1)], &[(0, 0)], false),
            spec((1, 1), &[(1, 0), (0, 1)], &[(1, 0), (0, 1)], false),
        ]
    }

    fn pair() -> Vec<NodeSpec> {
        vec![
            spec((0, 0), &[(1, 0)], &[], true),
            spec((1, 0), &[(0, 0)], &[(0, 0)], false),
        ]
    }

    #[test]
    fn test_status_only_moves_forward() {
        let (cell, _mailbox) = NodeCell::new(&spec((0, 0), &[], &[], false));

        assert!(!cell.advance(NodeStatus::Safe));
        assert!(cell.advance(NodeStatus::Burning));
        assert!(!cell.advance(NodeStatus::Threatened));
        assert_eq!(cell.status(), NodeStatus::Burning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_needs_threatened_and_empty() {
        let (world, _idle) = wire(TokioContext::shared(), no_spread(), &pair());
        let cell = Arc::clone(world.node(loc(1, 0)).unwrap());
        let first = AgentActor::spawn(&world, &cell, AgentStatus::Searching);
        let second = AgentActor::spawn(&world, &cell, AgentStatus::Searching);

        assert!(!cell.try_claim(&first));
        assert_eq!(first.status(), AgentStatus::Searching);

        cell.advance(NodeStatus::Threatened);
        assert!(cell.try_claim(&first));
        assert!(!cell.try_claim(&second));

        assert_eq!(first.status(), AgentStatus::Fortified);
        assert_eq!(first.bound(), loc(1, 0));
        assert_eq!(second.status(), AgentStatus::Searching);
        assert_eq!(cell.resident().as_ref(), Some(first.id()));
        assert!(cell.host_with(|| unreachable!("occupied node hosted")).is_none());
        assert_eq!(cell.snapshot().display, DisplayStatus::Fortified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_skips_burning_next_hop() {
        let (world, idle) = wire(TokioContext::shared(), no_spread(), &diamond());
        world.node(loc(1, 0)).unwrap().advance(NodeStatus::Burning);
        start(&world, idle);

        let report = CreationReport::new("scout", 1, loc(1, 1)).unwrap();
        world
            .node(loc(1, 1))
            .unwrap()
            .post(Message::Creation(report))
            .unwrap();
        settle(100).await;

        let log = world.log.entries();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].report.visited, vec![loc(1, 1), loc(0, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_refuses_visited_next_hop() {
        let (world, idle) = wire(TokioContext::shared(), no_spread(), &diamond());
        start(&world, idle);

        let mut report = CreationReport::new("scout", 1, loc(1, 1)).unwrap();
        report.push_visited(loc(1, 0));
        world
            .node(loc(1, 1))
            .unwrap()
            .post(Message::Creation(report))
            .unwrap();
        settle(100).await;

        let log = world.log.entries();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].report.visited, vec![loc(1, 0), loc(1, 1), loc(0, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_drops_when_no_hop_eligible() {
        let (world, idle) = wire(TokioContext::shared(), no_spread(), &diamond());
        world.node(loc(0, 1)).unwrap().advance(NodeStatus::Burning);
        start(&world, idle);

        let mut report = CreationReport::new("scout", 1, loc(1, 1)).unwrap();
        report.push_visited(loc(1, 0));
        world
            .node(loc(1, 1))
            .unwrap()
            .post(Message::Creation(report))
            .unwrap();
        settle(100).await;

        assert!(world.log.entries().is_empty());
        assert_eq!(world.node(loc(1, 1)).unwrap().status(), NodeStatus::Safe);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignition_armed_once_per_node() {
        let (world, idle) = wire(TokioContext::shared(), SimConfig::default(), &pair());
        let mut rx = world.events.subscribe();
        start(&world, idle);

        let cell = Arc::clone(world.node(loc(1, 0)).unwrap());
        cell.post(Message::NodeDeath).unwrap();
        cell.post(Message::NodeDeath).unwrap();
        settle(100).await;

        assert_eq!(cell.status(), NodeStatus::Threatened);
        assert_eq!(world.pending_ignitions(), 1);

        // Both windows are 2 to 3 seconds, one after the other.
        settle(10_000).await;

        assert_eq!(cell.status(), NodeStatus::Burning);
        assert_eq!(world.node(loc(0, 0)).unwrap().status(), NodeStatus::Burning);
        assert_eq!(world.pending_ignitions(), 0);

        let scheduled: Vec<Location> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                SimEvent::IgnitionScheduled { location, .. } => Some(location),
                _ => None,
            })
            .collect();
        assert_eq!(scheduled, vec![loc(1, 0), loc(0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_creation_hosts_one_relay_agent() {
        let (world, idle) = wire(TokioContext::shared(), no_spread(), &pair());
        start(&world, idle);

        let cell = Arc::clone(world.node(loc(1, 0)).unwrap());
        for _ in 0..2 {
            let sighting = AgentSighting {
                agent: AgentId::new("scout").unwrap(),
                location: loc(2, 0),
            };
            cell.post(Message::AgentCreation(sighting)).unwrap();
        }
        settle(100).await;

        let agents = world.agents();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].status(), AgentStatus::Fortified);
        assert_eq!(cell.resident().as_ref(), Some(agents[0].id()));

        let log = world.log.entries();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].report.agent.as_str(), "(1, 0)#0");
        assert_eq!(log[0].report.visited, vec![loc(1, 0)]);
    }
}
