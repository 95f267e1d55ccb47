//! Observation interface.
//!
//! Every status change inside the simulation is published as a
//! [`SimEvent`] on a broadcast bus. Publishing never blocks: a subscriber
//! that falls more than `event_capacity` events behind loses the oldest
//! ones instead of slowing the actors down.

use crate::agent::AgentStatus;
use crate::identity::AgentId;
use crate::node::NodeStatus;
use crate::station::LogEntry;
use crate::topology::Location;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Presentation status of a node: core status combined with occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayStatus {
    Safe,
    Threatened,
    Burning,
    /// Agent on a Safe node
    Occupied,
    /// Agent on a Threatened node
    Fortified,
    /// Agent on a Burning node
    Casualty,
}

impl DisplayStatus {
    /// Derives the display status from node status and occupancy.
    pub fn derive(status: NodeStatus, occupied: bool) -> Self {
        match (status, occupied) {
            (NodeStatus::Safe, false) => DisplayStatus::Safe,
            (NodeStatus::Threatened, false) => DisplayStatus::Threatened,
            (NodeStatus::Burning, false) => DisplayStatus::Burning,
            (NodeStatus::Safe, true) => DisplayStatus::Occupied,
            (NodeStatus::Threatened, true) => DisplayStatus::Fortified,
            (NodeStatus::Burning, true) => DisplayStatus::Casualty,
        }
    }

    /// One-character map glyph.
    pub fn glyph(&self) -> char {
        match self {
            DisplayStatus::Safe => '.',
            DisplayStatus::Threatened => '!',
            DisplayStatus::Burning => '#',
            DisplayStatus::Occupied => 'o',
            DisplayStatus::Fortified => 'F',
            DisplayStatus::Casualty => 'x',
        }
    }
}

/// Something observable happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A node handled a message (or burned down)
    Node {
        location: Location,
        status: NodeStatus,
        display: DisplayStatus,
        resident: Option<AgentId>,
    },

    /// An agent was created or changed status
    Agent {
        agent: AgentId,
        status: AgentStatus,
        location: Location,
    },

    /// A threatened node armed its ignition timer
    IgnitionScheduled { location: Location, delay_ms: u64 },

    /// The station appended a creation report to its log
    StationLog { entry: LogEntry },
}

impl SimEvent {
    /// Location the event is about.
    pub fn location(&self) -> Location {
        match self {
            SimEvent::Node { location, .. }
            | SimEvent::Agent { location, .. }
            | SimEvent::IgnitionScheduled { location, .. } => *location,
            SimEvent::StationLog { entry } => entry.report.origin,
        }
    }
}

/// Fire-and-forget event broadcaster.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SimEvent>,
}

impl EventBus {
    /// Creates a bus buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes to all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. Having no subscriber is not an error.
    pub fn publish(&self, event: SimEvent) {
        let _ = self.tx.send(event);
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
