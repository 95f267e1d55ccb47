//! JSON exporter for finished runs.
//!
//! Writes the configuration, the full event stream, the final snapshots and
//! the station log of one run as a pretty-printed JSON document.

use crate::monitor::Violation;
use crate::runner::{ScenarioMetrics, ScenarioResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;
use wildfire_core::{AgentSnapshot, LogEntry, Location, NodeSnapshot, SimConfig, SimEvent};

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Unique id of this export
    pub run_id: Uuid,

    /// Scenario name or config path
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Wall-clock start of the run, milliseconds since the Unix epoch
    pub started_at_unix_ms: u64,

    /// Configuration the run used
    pub config: SimConfig,

    /// Simulated duration in seconds
    pub duration_sec: f64,

    /// Final results
    pub passed: bool,
    pub settled: bool,

    /// Every event, in observation order
    pub events: Vec<SimEvent>,

    /// Final node snapshots
    pub nodes: Vec<NodeSnapshot>,

    /// Final agent snapshots
    pub agents: Vec<AgentSnapshot>,

    /// Rendered station log
    pub station_log: Vec<ExportedLogEntry>,

    /// Nodes with no route to the station
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreachable: Vec<Location>,

    /// Invariant violations
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,

    pub metrics: ScenarioMetrics,
}

/// A station log entry with its rendered text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedLogEntry {
    #[serde(flatten)]
    pub entry: LogEntry,
    pub text: String,
}

impl SimExport {
    /// Creates an export from a finished run.
    pub fn from_result(result: &ScenarioResult, config: &SimConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: result.scenario.clone(),
            seed: result.seed,
            started_at_unix_ms: result.started_at_unix_ms,
            config: config.clone(),
            duration_sec: result.final_time_secs,
            passed: result.passed,
            settled: result.settled,
            events: result.events.clone(),
            nodes: result.nodes.clone(),
            agents: result.agents.clone(),
            station_log: result
                .station_log
                .iter()
                .map(|entry| ExportedLogEntry {
                    entry: entry.clone(),
                    text: entry.rendered(),
                })
                .collect(),
            unreachable: result.unreachable.clone(),
            violations: result.violations.clone(),
            metrics: result.metrics.clone(),
        }
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScenarioRunner;
    use crate::scenarios::ScenarioId;

    #[test]
    fn test_export_contents() {
        let runner = ScenarioRunner::new(42);
        let result = runner.run_scenario(ScenarioId::Split).unwrap();
        let export = SimExport::from_result(&result, runner.config());

        let json: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        assert_eq!(json["scenario"], "split");
        assert_eq!(json["seed"], 42);
        assert_eq!(json["started_at_unix_ms"], 1_704_067_200_000u64);
        assert_eq!(json["config"]["fire_spread"], true);
        assert_eq!(json["unreachable"].as_array().unwrap().len(), 2);
        assert!(json.get("violations").is_none());
        assert_eq!(json["nodes"].as_array().unwrap().len(), 5);

        let first = &json["station_log"][0];
        assert_eq!(first["sequence"], 0);
        assert!(first["text"].as_str().unwrap().starts_with("Agent: (0, 0)#0\n"));
        assert!(json["events"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["event"] == "station_log"));
    }

    #[test]
    fn test_write_to_file() {
        let result = ScenarioRunner::new(1).run_scenario(ScenarioId::Line).unwrap();
        let export = SimExport::from_result(&result, &SimConfig::default());

        let path = std::env::temp_dir().join(format!("wildfire-{}.json", export.run_id));
        export.write_to_file(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["run_id"], export.run_id.to_string());
    }
}
