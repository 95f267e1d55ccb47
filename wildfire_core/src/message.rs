//! Messages exchanged between node and agent actors.
//!
//! | Message         | Sent by                 | Sent to                  | Payload            |
//! |-----------------|-------------------------|--------------------------|--------------------|
//! | `NodeDeath`     | burning node            | neighbors, resident agent| -                  |
//! | `AgentCreation` | node hosting an agent   | neighbors                | [`AgentSighting`]  |
//! | `CatchFire`     | ignition timer          | its own node             | -                  |
//! | `Fortification` | fortified agent         | its bound node           | -                  |
//! | `Creation`      | new agent, relay nodes  | bound node, channel hop  | [`CreationReport`] |

use crate::error::MessageError;
use crate::identity::AgentId;
use crate::topology::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    NodeDeath,
    AgentCreation,
    CatchFire,
    Fortification,
    Creation,
}

/// Actor protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// A neighbor (or the agent's node) started burning
    NodeDeath,

    /// A neighbor hosts an agent
    AgentCreation(AgentSighting),

    /// The ignition timer fired
    CatchFire,

    /// An agent anchored itself on the receiving node
    Fortification,

    /// An agent was created; relayed to the station
    Creation(CreationReport),
}

impl Message {
    /// Returns the type tag.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::NodeDeath => MessageKind::NodeDeath,
            Message::AgentCreation(_) => MessageKind::AgentCreation,
            Message::CatchFire => MessageKind::CatchFire,
            Message::Fortification => MessageKind::Fortification,
            Message::Creation(_) => MessageKind::Creation,
        }
    }
}

/// Payload of `AgentCreation`: which agent was seen, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSighting {
    /// The resident agent of the sending node
    pub agent: AgentId,

    /// The sending node
    pub location: Location,
}

/// Payload of `Creation`: the record the station logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationReport {
    /// Name of the new agent
    pub agent: AgentId,

    /// Creation time, microseconds since the simulation epoch
    pub created_at_us: u64,

    /// Node the agent was created on
    pub origin: Location,

    /// Nodes that already forwarded this report (most recent last)
    pub visited: Vec<Location>,
}

impl CreationReport {
    /// Creates a report from a raw agent name.
    ///
    /// # Errors
    /// [`MessageError::EmptyAgentName`] for a blank name.
    pub fn new(
        agent: impl Into<String>,
        created_at_us: u64,
        origin: Location,
    ) -> Result<Self, MessageError> {
        Ok(Self::for_agent(AgentId::new(agent)?, created_at_us, origin))
    }

    /// Creates a report for an already issued agent id.
    pub fn for_agent(agent: AgentId, created_at_us: u64, origin: Location) -> Self {
        Self {
            agent,
            created_at_us,
            origin,
            visited: Vec::new(),
        }
    }

    /// Returns true if `location` already forwarded this report.
    pub fn has_visited(&self, location: Location) -> bool {
        self.visited.contains(&location)
    }

    /// Records that `location` is forwarding this report.
    pub fn push_visited(&mut self, location: Location) {
        self.visited.push(location);
    }
}

/// Station log rendering.
impl fmt::Display for CreationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Agent: {}", self.agent)?;
        writeln!(f, "Time Created: {}", self.created_at_us)?;
        writeln!(f, "Created At: {}", self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        let report = CreationReport::new("a", 1, Location::new(0, 0)).unwrap();
        let sighting = AgentSighting {
            agent: AgentId::issue(Location::new(0, 0), 0),
            location: Location::new(0, 0),
        };

        assert_eq!(Message::NodeDeath.kind(), MessageKind::NodeDeath);
        assert_eq!(Message::CatchFire.kind(), MessageKind::CatchFire);
        assert_eq!(Message::Fortification.kind(), MessageKind::Fortification);
        assert_eq!(Message::Creation(report).kind(), MessageKind::Creation);
        assert_eq!(Message::AgentCreation(sighting).kind(), MessageKind::AgentCreation);
    }

    #[test]
    fn test_creation_requires_name() {
        assert_eq!(
            CreationReport::new("", 0, Location::new(1, 1)),
            Err(MessageError::EmptyAgentName)
        );
    }

    #[test]
    fn test_visited_stack() {
        let mut report = CreationReport::new("a", 0, Location::new(2, 0)).unwrap();
        assert!(!report.has_visited(Location::new(2, 0)));

        report.push_visited(Location::new(2, 0));
        report.push_visited(Location::new(1, 0));

        assert!(report.has_visited(Location::new(2, 0)));
        assert_eq!(report.visited.last(), Some(&Location::new(1, 0)));
    }

    #[test]
    fn test_render() {
        let report = CreationReport::new("(1, 0)#0", 2_500_000, Location::new(1, 0)).unwrap();
        assert_eq!(
            report.to_string(),
            "Agent: (1, 0)#0\nTime Created: 2500000\nCreated At: (1, 0)\n"
        );
    }

    #[test]
    fn test_message_serializes() {
        let msg = Message::Creation(CreationReport::new("x", 9, Location::new(3, 4)).unwrap());
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_blank_report_rejected_on_decode() {
        let blank = r#"{"agent":"","created_at_us":1,"origin":{"x":0,"y":0},"visited":[]}"#;
        assert!(serde_json::from_str::<CreationReport>(blank).is_err());

        let named = r#"{"agent":"scout","created_at_us":1,"origin":{"x":0,"y":0},"visited":[]}"#;
        let report: CreationReport = serde_json::from_str(named).unwrap();
        assert_eq!(report.agent.as_str(), "scout");
    }
}
