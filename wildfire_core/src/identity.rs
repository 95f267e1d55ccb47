//! Agent identity and creation timestamps.

use crate::error::MessageError;
use crate::topology::Location;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Name of an agent, unique within one simulation.
///
/// Issued as `"{spawn location}#{per-node sequence}"`, e.g. `(1, 0)#0`.
/// Serialized as the bare name; deserializing a blank name fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Wraps an externally supplied name.
    pub fn new(name: impl Into<String>) -> Result<Self, MessageError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MessageError::EmptyAgentName);
        }
        Ok(Self(name))
    }

    /// Derives the name of the `seq`-th agent spawned at `origin`.
    pub fn issue(origin: Location, seq: u32) -> Self {
        Self(format!("{origin}#{seq}"))
    }

    /// Returns the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stable 64-bit digest (FNV-1a) used to key the agent's random stream.
    pub fn stream_id(&self) -> u64 {
        self.0.bytes().fold(0xcbf29ce484222325, |hash, b| {
            (hash ^ b as u64).wrapping_mul(0x100000001b3)
        })
    }
}

impl TryFrom<String> for AgentId {
    type Error = MessageError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-node sequence counter for agent names.
#[derive(Debug, Default)]
pub struct AgentSequence(AtomicU32);

impl AgentSequence {
    /// Issues the next agent name for `origin`.
    pub fn next_id(&self, origin: Location) -> AgentId {
        AgentId::issue(origin, self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Issues strictly increasing creation timestamps (microseconds since the
/// simulation epoch), so two agents never share one even when created in
/// the same clock tick.
#[derive(Debug, Default)]
pub struct CreationClock {
    last_us: AtomicU64,
}

impl CreationClock {
    /// Returns a stamp `>= now`, strictly greater than every earlier stamp.
    pub fn stamp(&self, now: Duration) -> u64 {
        let now_us = u64::try_from(now.as_micros()).unwrap_or(u64::MAX);
        let mut last = self.last_us.load(Ordering::Relaxed);
        loop {
            let next = now_us.max(last.saturating_add(1));
            match self
                .last_us
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(observed) => last = observed,
            }
        }
    }
}
