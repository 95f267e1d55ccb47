//! Mobile agent actor.
//!
//! An agent is either the initial searcher dispatched by the driver or a
//! relay agent spawned by a node that learned of a nearby agent. Searchers
//! walk the neighbor graph until they claim a threatened node; fortified
//! agents wait for their node to burn.

use crate::events::SimEvent;
use crate::identity::AgentId;
use crate::message::{CreationReport, Message};
use crate::node::{NodeCell, NodeStatus};
use crate::topology::Location;
use crate::world::World;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};
use wildfire_env::{EnvError, Mailbox, MailboxSender, WildfireContext};

/// Agent lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentStatus {
    Searching,
    Fortified,
    Dead,
}

#[derive(Debug)]
struct AgentState {
    status: AgentStatus,
    bound: Location,
}

#[derive(Debug)]
struct AgentCell {
    id: AgentId,
    created_at_us: u64,
    state: Mutex<AgentState>,
    mailbox: MailboxSender<Message>,
}

/// Point-in-time view of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub created_at_us: u64,
    pub status: AgentStatus,
    pub bound: Location,
}

/// Shared reference to a live (or finished) agent.
#[derive(Debug, Clone)]
pub struct AgentHandle(Arc<AgentCell>);

impl AgentHandle {
    fn lock(&self) -> MutexGuard<'_, AgentState> {
        self.0.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &AgentId {
        &self.0.id
    }

    pub fn created_at_us(&self) -> u64 {
        self.0.created_at_us
    }

    pub fn status(&self) -> AgentStatus {
        self.lock().status
    }

    /// Node the agent is bound to. A searcher reports its start node until
    /// it claims one.
    pub fn bound(&self) -> Location {
        self.lock().bound
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        let state = self.lock();
        AgentSnapshot {
            id: self.0.id.clone(),
            created_at_us: self.0.created_at_us,
            status: state.status,
            bound: state.bound,
        }
    }

    /// Binds the agent to `location` as Fortified.
    ///
    /// Called with the node lock held.
    pub(crate) fn fortify_at(&self, location: Location) {
        let mut state = self.lock();
        state.status = AgentStatus::Fortified;
        state.bound = location;
    }

    fn die(&self) {
        self.lock().status = AgentStatus::Dead;
    }

    pub(crate) fn post(&self, message: Message) -> Result<(), EnvError> {
        self.0.mailbox.post(message)
    }
}

/// The task half of an agent.
pub(crate) struct AgentActor<Ctx: WildfireContext> {
    handle: AgentHandle,
    mailbox: Mailbox<Message>,
    world: Arc<World<Ctx>>,
    rng: ChaCha8Rng,
}

impl<Ctx: WildfireContext> AgentActor<Ctx> {
    /// Creates an agent bound to `origin` and starts its task.
    ///
    /// Enqueues the agent's creation report (preceded by `Fortification`
    /// for a fortified start) on `origin`. Never locks `origin`, so a node
    /// may call this while holding its own state lock.
    pub fn spawn(world: &Arc<World<Ctx>>, origin: &NodeCell, status: AgentStatus) -> AgentHandle {
        let id = origin.next_agent_id();
        let created_at_us = world.clock.stamp(world.ctx.now());
        let (tx, rx) = wildfire_env::mailbox(format!("agent-{id}"));

        let handle = AgentHandle(Arc::new(AgentCell {
            id: id.clone(),
            created_at_us,
            state: Mutex::new(AgentState {
                status,
                bound: origin.location(),
            }),
            mailbox: tx,
        }));

        if status == AgentStatus::Fortified {
            if let Err(err) = origin.post(Message::Fortification) {
                trace!(agent = %id, %err, "origin closed before fortification");
            }
        }
        let report = CreationReport::for_agent(id.clone(), created_at_us, origin.location());
        if let Err(err) = origin.post(Message::Creation(report)) {
            trace!(agent = %id, %err, "origin closed before creation report");
        }

        world.register_agent(handle.clone());
        world.events.publish(SimEvent::Agent {
            agent: id.clone(),
            status,
            location: origin.location(),
        });
        debug!(agent = %id, at = %origin.location(), ?status, "agent created");

        let actor = AgentActor {
            handle: handle.clone(),
            mailbox: rx,
            world: Arc::clone(world),
            rng: world.ctx.derive_rng(id.stream_id()),
        };
        world.ctx.spawn(&format!("agent-{id}"), actor.run());

        handle
    }

    async fn run(mut self) {
        if self.handle.status() == AgentStatus::Searching {
            match self.search().await {
                Some(location) => {
                    debug!(agent = %self.handle.id(), at = %location, "fortified");
                    self.publish();
                }
                None => {
                    debug!(agent = %self.handle.id(), "search exhausted");
                    return;
                }
            }
        }

        while let Some(message) = self.mailbox.recv().await {
            if message == Message::NodeDeath {
                self.handle.die();
                debug!(agent = %self.handle.id(), at = %self.handle.bound(), "dead");
                self.publish();
                return;
            }
            trace!(agent = %self.handle.id(), kind = ?message.kind(), "ignored");
        }
    }

    /// Randomized depth-first walk from the bound node. Returns the claimed
    /// location, or `None` once every reachable unoccupied node was visited.
    async fn search(&mut self) -> Option<Location> {
        let mut visited = HashSet::new();
        let mut stack = vec![self.handle.bound()];

        while let Some(location) = stack.pop() {
            if !visited.insert(location) {
                continue;
            }
            let Some(node) = self.world.node(location).cloned() else {
                continue;
            };

            if node.status() == NodeStatus::Threatened && node.try_claim(&self.handle) {
                self.world.deliver(&node, Message::Fortification);
                return Some(location);
            }

            let mut next: Vec<Location> = node
                .neighbors()
                .iter()
                .copied()
                .filter(|n| !visited.contains(n))
                .filter(|n| self.world.node(*n).is_some_and(|c| !c.has_resident()))
                .collect();
            next.shuffle(&mut self.rng);
            stack.extend(next);

            self.world.ctx.yield_now().await;
        }

        None
    }

    fn publish(&self) {
        let snapshot = self.handle.snapshot();
        self.world.events.publish(SimEvent::Agent {
            agent: snapshot.id,
            status: snapshot.status,
            location: snapshot.bound,
        });
    }
}
