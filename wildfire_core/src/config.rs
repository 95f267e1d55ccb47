//! Simulation tuning knobs.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every actor of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Threatened nodes start ignition timers (default: true)
    pub fire_spread: bool,

    /// Wall/virtual duration of one time unit (default: 1s)
    pub time_unit: Duration,

    /// Shortest ignition delay, in time units (default: 2.0)
    pub ignition_min_units: f64,

    /// Longest ignition delay, in time units (default: 3.0)
    pub ignition_max_units: f64,

    /// Events buffered per subscriber before the oldest are dropped (default: 4096)
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fire_spread: true,
            time_unit: Duration::from_secs(1),
            ignition_min_units: 2.0,
            ignition_max_units: 3.0,
            event_capacity: 4096,
        }
    }
}

impl SimConfig {
    /// Checks the configuration for values the actors cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.ignition_min_units, self.ignition_max_units);
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
            return Err(ConfigError::InvalidIgnitionWindow { min, max });
        }
        if self.time_unit.is_zero() {
            return Err(ConfigError::ZeroTimeUnit);
        }
        if self.units(max).is_none() {
            return Err(ConfigError::IgnitionDelayOverflow { max });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        Ok(())
    }

    /// Returns the ignition delay for a draw in `[0, 1]`.
    pub fn ignition_delay(&self, fraction: f64) -> Duration {
        let span = self.ignition_max_units - self.ignition_min_units;
        let units = self.ignition_min_units + span * fraction.clamp(0.0, 1.0);
        self.units(units).unwrap_or(Duration::MAX)
    }

    /// `units` time units as a duration, if representable.
    fn units(&self, units: f64) -> Option<Duration> {
        Duration::try_from_secs_f64(self.time_unit.as_secs_f64() * units).ok()
    }
}
