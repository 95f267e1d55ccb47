//! Wildfire Simulation Harness
//!
//! Runs the wildfire agent network end to end on a seeded context and checks
//! the run against the model's invariants.
//!
//! # Core Principle: Seeded Runs on Virtual Time
//!
//! - **Time**: runs execute on a paused tokio clock that jumps to the next
//!   timer whenever every actor is blocked
//! - **Randomness**: channel derivation, relay shuffles, search order and
//!   ignition delays all come from streams of one 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                       │
//! │  ┌─────────────┐   ┌───────────────────────────────────┐ │
//! │  │ SimContext  │──►│ Simulation (node + agent actors)  │ │
//! │  └─────────────┘   └────────────────┬──────────────────┘ │
//! │                                     │ SimEvent stream    │
//! │                              ┌──────▼──────┐             │
//! │                              │   Monitor   │             │
//! │                              └─────────────┘             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use wildfire_sim::{ScenarioId, ScenarioRunner};
//!
//! let result = ScenarioRunner::new(42).run_scenario(ScenarioId::Grid)?;
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod loader;
mod monitor;
mod runner;
pub mod scenarios;
pub mod visualizer;

pub use context::SimContext;
pub use exporter::{ExportedLogEntry, SimExport};
pub use loader::{load_config, parse_config, LoadError};
pub use monitor::{Monitor, Violation};
pub use runner::{RunError, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
