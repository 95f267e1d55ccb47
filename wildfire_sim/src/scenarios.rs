//! Built-in topologies.

use wildfire_core::TopologyInput;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// WF-001: five sensors in a row, fire at the far end
    Line,

    /// WF-002: station component plus an island the relay cannot reach
    Split,

    /// WF-003: 5x5 grid, fire in the corner opposite the station
    Grid,

    /// WF-004: eight sensors around a square, fire across from the station
    Ring,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Line,
            ScenarioId::Split,
            ScenarioId::Grid,
            ScenarioId::Ring,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Line => "line",
            ScenarioId::Split => "split",
            ScenarioId::Grid => "grid",
            ScenarioId::Ring => "ring",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Line => "Fire walks down a 5-node line toward the station",
            ScenarioId::Split => "Island nodes get no channel; their reports are dropped",
            ScenarioId::Grid => "Fire crosses a 5x5 grid; redundant channels relay reports",
            ScenarioId::Ring => "Fire splits both ways around an 8-node ring",
        }
    }

    /// Returns the topology declaration.
    pub fn topology(&self) -> TopologyInput {
        match self {
            ScenarioId::Line => {
                let mut input = TopologyInput::new();
                for x in 0..5 {
                    input = input.node(x, 0);
                    if x > 0 {
                        input = input.edge((x - 1, 0), (x, 0));
                    }
                }
                input.station(0, 0).fire(4, 0)
            }
            ScenarioId::Split => TopologyInput::new()
                .node(0, 0)
                .node(1, 0)
                .node(2, 0)
                .node(5, 2)
                .node(6, 2)
                .edge((0, 0), (1, 0))
                .edge((1, 0), (2, 0))
                .edge((5, 2), (6, 2))
                .station(0, 0)
                .fire(2, 0),
            ScenarioId::Grid => {
                let mut input = TopologyInput::new();
                for y in 0..5 {
                    for x in 0..5 {
                        input = input.node(x, y);
                        if x > 0 {
                            input = input.edge((x - 1, y), (x, y));
                        }
                        if y > 0 {
                            input = input.edge((x, y - 1), (x, y));
                        }
                    }
                }
                input.station(0, 0).fire(4, 4)
            }
            ScenarioId::Ring => {
                let ring = [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (1, 2), (0, 2), (0, 1)];
                let mut input = TopologyInput::new();
                for (i, &(x, y)) in ring.iter().enumerate() {
                    input = input.node(x, y).edge((x, y), ring[(i + 1) % ring.len()]);
                }
                input.station(0, 0).fire(2, 2)
            }
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" | "wf-001" => Ok(ScenarioId::Line),
            "split" | "wf-002" => Ok(ScenarioId::Split),
            "grid" | "wf-003" => Ok(ScenarioId::Grid),
            "ring" | "wf-004" => Ok(ScenarioId::Ring),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
