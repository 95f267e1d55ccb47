//! Error types for the wildfire core.

use crate::topology::Location;
use thiserror::Error;
use wildfire_env::EnvError;

/// Malformed or inconsistent topology / simulation configuration.
///
/// Always fatal: returned before any actor task starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Zero or several stations were declared
    #[error("expected exactly one station, found {0}")]
    StationCount(usize),

    /// Zero or several fire origins were declared
    #[error("expected exactly one fire origin, found {0}")]
    FireOriginCount(usize),

    /// The station is not a declared node location
    #[error("station {0} is not a declared node")]
    UndeclaredStation(Location),

    /// The fire origin is not a declared node location
    #[error("fire origin {0} is not a declared node")]
    UndeclaredFireOrigin(Location),

    /// An edge endpoint is not a declared node location
    #[error("edge {from} - {to} references undeclared node {missing}")]
    UndeclaredEdgeEndpoint {
        from: Location,
        to: Location,
        missing: Location,
    },

    /// An edge connects a node to itself
    #[error("edge connects {0} to itself")]
    SelfLoop(Location),

    /// The ignition delay window is empty or negative
    #[error("invalid ignition window [{min}, {max}] time units")]
    InvalidIgnitionWindow { min: f64, max: f64 },

    /// The longest ignition delay does not fit in a `Duration`
    #[error("ignition delay of {max} time units is out of range")]
    IgnitionDelayOverflow { max: f64 },

    /// The time unit is zero
    #[error("time unit must be non-zero")]
    ZeroTimeUnit,

    /// The event buffer cannot hold a single event
    #[error("event capacity must be non-zero")]
    ZeroEventCapacity,
}

/// Invalid message payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Creation and AgentCreation payloads need a non-empty agent name
    #[error("agent name must not be empty")]
    EmptyAgentName,
}

/// Errors raised by the simulation control surface.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid topology or configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Location does not name a node of this topology
    #[error("unknown node {0}")]
    UnknownLocation(Location),

    /// `ignite` or `start_all_nodes` called after the node tasks started
    #[error("node tasks already started")]
    AlreadyStarted,

    /// `dispatch_initial_agent` called before the node tasks started
    #[error("node tasks not started yet")]
    NotStarted,

    /// Mailbox delivery failed
    #[error(transparent)]
    Env(#[from] EnvError),
}
