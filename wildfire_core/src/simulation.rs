//! Driver control surface.
//!
//! Calls are expected in this order:
//!
//! 1. [`Simulation::build`] (or [`Simulation::new`] with a prepared topology)
//! 2. [`Simulation::ignite`] on the fire origin
//! 3. [`Simulation::start_all_nodes`]
//! 4. [`Simulation::dispatch_initial_agent`] at the station
//!
//! Out-of-order calls fail with [`SimError`].

use crate::agent::{AgentActor, AgentSnapshot, AgentStatus};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::events::SimEvent;
use crate::message::Message;
use crate::node::{burn_down, NodeActor, NodeCell, NodeSnapshot, NodeStatus};
use crate::station::LogEntry;
use crate::topology::{Location, Topology, TopologyInput};
use crate::world::World;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use wildfire_env::{Mailbox, WildfireContext};

/// Random stream used for channel derivation.
const CHANNEL_STREAM: u64 = 0x6368_616e;

/// A wired-up simulation: node cells exist, tasks start on demand.
pub struct Simulation<Ctx: WildfireContext> {
    topology: Topology,
    world: Arc<World<Ctx>>,

    /// Node mailboxes waiting for `start_all_nodes`
    idle: Option<Vec<(Arc<NodeCell>, Mailbox<Message>)>>,
}

impl<Ctx: WildfireContext> Simulation<Ctx> {
    /// Builds the topology, derives channels from the context's random
    /// source and wires the nodes.
    pub fn build(input: &TopologyInput, ctx: Arc<Ctx>, config: SimConfig) -> Result<Self, SimError> {
        let mut topology = Topology::build(input)?;
        let mut rng = ctx.derive_rng(CHANNEL_STREAM);
        topology.derive_channels(&mut rng);
        Self::new(topology, ctx, config)
    }

    /// Wires the nodes of an already built topology (channels included).
    pub fn new(topology: Topology, ctx: Arc<Ctx>, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let mut cells = HashMap::with_capacity(topology.len());
        let mut idle = Vec::with_capacity(topology.len());
        for spec in topology.nodes() {
            let (cell, mailbox) = NodeCell::new(spec);
            cells.insert(spec.location, Arc::clone(&cell));
            idle.push((cell, mailbox));
        }

        let unreachable = topology.unreachable();
        if !unreachable.is_empty() {
            debug!(count = unreachable.len(), "nodes unreachable from the station");
        }

        Ok(Self {
            topology,
            world: Arc::new(World::new(ctx, config, cells)),
            idle: Some(idle),
        })
    }

    fn cell(&self, location: Location) -> Result<&Arc<NodeCell>, SimError> {
        self.world
            .node(location)
            .ok_or(SimError::UnknownLocation(location))
    }

    /// Sets a node Burning immediately, bypassing the ignition timer.
    ///
    /// Its neighbors find `NodeDeath` queued when their tasks start.
    pub fn ignite(&mut self, location: Location) -> Result<(), SimError> {
        if self.idle.is_none() {
            return Err(SimError::AlreadyStarted);
        }
        let cell = self.cell(location)?;
        if cell.advance(NodeStatus::Burning) {
            info!(node = %location, "ignited");
            burn_down(&self.world, cell);
        }
        Ok(())
    }

    /// Starts one task per node that is not already Burning.
    pub fn start_all_nodes(&mut self) -> Result<(), SimError> {
        let idle = self.idle.take().ok_or(SimError::AlreadyStarted)?;
        let count = idle.len();

        for (cell, mailbox) in idle {
            self.world.publish_node(&cell);
            if cell.status() == NodeStatus::Burning {
                continue;
            }
            let name = format!("node-{}", cell.location());
            let actor = NodeActor::new(cell, mailbox, Arc::clone(&self.world));
            self.world.ctx.spawn(&name, actor.run());
        }

        info!(nodes = count, "node tasks started");
        Ok(())
    }

    /// Creates the initial searching agent at `location`.
    pub fn dispatch_initial_agent(&self, location: Location) -> Result<AgentSnapshot, SimError> {
        if self.idle.is_some() {
            return Err(SimError::NotStarted);
        }
        let cell = self.cell(location)?;
        let agent = AgentActor::spawn(&self.world, cell, AgentStatus::Searching);
        info!(agent = %agent.id(), at = %location, "initial agent dispatched");
        Ok(agent.snapshot())
    }

    /// Enqueues `message` on a node's mailbox.
    pub fn post(&self, location: Location, message: Message) -> Result<(), SimError> {
        self.cell(location)?.post(message)?;
        Ok(())
    }

    /// Subscribes to simulation events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.world.events.subscribe()
    }

    pub fn node(&self, location: Location) -> Option<NodeSnapshot> {
        self.world.node(location).map(|cell| cell.snapshot())
    }

    pub fn node_status(&self, location: Location) -> Option<NodeStatus> {
        self.world.node(location).map(|cell| cell.status())
    }

    /// Snapshots of every node, ordered by location.
    pub fn nodes(&self) -> Vec<NodeSnapshot> {
        let mut nodes: Vec<NodeSnapshot> = self.world.nodes().map(|cell| cell.snapshot()).collect();
        nodes.sort_by_key(|n| n.location);
        nodes
    }

    /// Snapshots of every agent, in creation order.
    pub fn agents(&self) -> Vec<AgentSnapshot> {
        self.world.agents().iter().map(|a| a.snapshot()).collect()
    }

    pub fn station_log(&self) -> Vec<LogEntry> {
        self.world.log.entries()
    }

    /// The station log as text.
    pub fn render_station_log(&self) -> String {
        self.world.log.render()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &SimConfig {
        &self.world.config
    }

    /// Ignition timers armed but not yet fired.
    pub fn pending_ignitions(&self) -> usize {
        self.world.pending_ignitions()
    }

    pub fn is_started(&self) -> bool {
        self.idle.is_none()
    }
}
