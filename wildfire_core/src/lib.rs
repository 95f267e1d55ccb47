//! Wildfire Core - Sensor-Network Mobile-Agent Actors
//!
//! A grid of sensor nodes watches for a spreading fire. Each node and each
//! mobile agent runs as its own task and talks only through mailboxes:
//!
//! 1. **Fire spread**: a burning node floods `NodeDeath`; neighbors become
//!    threatened and ignite after a random delay
//! 2. **Agent search**: a searching agent walks the graph and fortifies the
//!    first threatened node it reaches
//! 3. **Creation relay**: nodes that learn of an agent host a relay agent
//!    whose creation report travels hop by hop to the base station
//!
//! Observers subscribe to [`SimEvent`]s; the driver uses [`Simulation`].

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod message;
pub mod node;
pub mod simulation;
pub mod station;
pub mod topology;

mod world;

// Re-export key types for convenience
pub use agent::{AgentHandle, AgentSnapshot, AgentStatus};
pub use config::SimConfig;
pub use error::{ConfigError, MessageError, SimError};
pub use events::{DisplayStatus, EventBus, SimEvent};
pub use identity::{AgentId, CreationClock};
pub use message::{AgentSighting, CreationReport, Message, MessageKind};
pub use node::{NodeSnapshot, NodeStatus};
pub use simulation::Simulation;
pub use station::{LogEntry, StationLog};
pub use topology::{Location, NodeSpec, Topology, TopologyInput};
