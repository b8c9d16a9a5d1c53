//! Controller configuration parameters
//!
//! All tunable thresholds and sensor periods for the rig.
//! Values can be overridden via a JSON config object on disk.

use serde::{Deserialize, Serialize};

/// Core controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- Sensor query periods ---
    /// Reactor-box sensor callback period (milliseconds)
    pub reactor_sensor_period_ms: u32,
    /// Power-box sensor callback period (milliseconds)
    pub power_sensor_period_ms: u32,

    // --- Ambient temperature thresholds (both enclosures) ---
    /// Warn threshold (Celsius)
    pub ambient_warn_celsius: f64,
    /// Abort threshold (Celsius); aborting cancels all three lanes
    pub ambient_abort_celsius: f64,

    // --- Per-lane IR temperature thresholds ---
    /// Warn threshold (Celsius)
    pub ir_warn_celsius: f64,
    /// Abort threshold (Celsius); aborting cancels the affected lane only
    pub ir_abort_celsius: f64,

    // --- Thermocouple ---
    /// Warn threshold (Celsius)
    pub thermocouple_warn_celsius: f64,
    /// Lanes whose experiments are cancelled on a thermocouple exceedance
    pub thermocouple_affected_lanes: [bool; 3],

    // --- UV ---
    /// UV-index warning threshold (UVI)
    pub uv_warn_uvi: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Sensor periods
            reactor_sensor_period_ms: 200,
            power_sensor_period_ms: 200,

            // Ambient
            ambient_warn_celsius: 45.0,
            ambient_abort_celsius: 60.0,

            // IR per lane
            ir_warn_celsius: 80.0,
            ir_abort_celsius: 120.0,

            // Thermocouple: the probe sits in the stage block, so an
            // exceedance affects every lane unless configured otherwise
            thermocouple_warn_celsius: 100.0,
            thermocouple_affected_lanes: [true, true, true],

            // UV
            uv_warn_uvi: 1.0,
        }
    }
}
