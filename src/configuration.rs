//! Persisted configuration objects.
//!
//! Everything the rig stores on disk or ships over the wire: LED data
//! sheets, hardware configurations, experiment templates, and finalized
//! experiment records.  All of them serialize with serde to the JSON layout
//! the frontend expects (tuples as arrays, snake_case field names).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Any object that can live in a [`ConfigFolder`](crate::config_folder::ConfigFolder).
pub trait ConfigObject: Serialize + DeserializeOwned {
    /// Unique 64-bit identifier; doubles as the file name.
    fn uid(&self) -> u64;
    /// Human-readable description for listings.
    fn description(&self) -> String;
}

// ───────────────────────────────────────────────────────────────
// LEDs
// ───────────────────────────────────────────────────────────────

/// One point of an LED's emission spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmissionPair {
    pub wavelength: i32,
    pub intensity: f64,
}

/// Data sheet of one physical LED module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Led {
    pub uid: u64,
    pub name: String,
    pub fwhm: i32,
    pub max_of_emission: i32,
    pub min_wavelength: i32,
    pub max_wavelength: i32,
    pub color: String,
    /// Absolute drive limit in mA.
    pub max_current: i32,
    pub manufacturer_id: i64,
    pub order_id: i64,
    pub date_soldering: String,
    pub soldered_by: String,
    pub operating_time: f64,
    pub defect: bool,
    pub emission_spectrum: Vec<EmissionPair>,
    pub emission_spectrum_recorded_on: String,
}

impl Led {
    /// A UV emitter needs the UV interlock chain.
    pub fn is_uv(&self) -> bool {
        self.min_wavelength <= 400
    }
}

impl ConfigObject for Led {
    fn uid(&self) -> u64 {
        self.uid
    }

    fn description(&self) -> String {
        self.name.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// Bricklets and hardware configuration
// ───────────────────────────────────────────────────────────────

/// Inventory entry for one bricklet module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TinkerforgeBricklet {
    pub uid: u64,
    pub name: String,
    /// Module kind, e.g. "io16_v2" or "servo_v2".
    pub kind: String,
    /// The module's bus UID string.
    pub tf_uid: String,
}

impl ConfigObject for TinkerforgeBricklet {
    fn uid(&self) -> u64 {
        self.uid
    }

    fn description(&self) -> String {
        self.name.clone()
    }
}

/// Rig-wide hardware defaults referenced by experiment templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    pub uid: u64,
    pub name: String,
    pub tinkerforge_bricklets: Vec<TinkerforgeBricklet>,
    pub software_version: String,
    pub date: String,
    pub default_distance_led_vial: f64,
    pub default_position_thermocouple: String,
    pub default_pwm_channels: Vec<u8>,
    pub default_temperature_threshold: f64,
    pub default_uv_threshold: f64,
    pub default_sensor_query_interval: f64,
    pub default_reaction_vessel_volume: f64,
}

impl ConfigObject for HardwareConfig {
    fn uid(&self) -> u64 {
        self.uid
    }

    fn description(&self) -> String {
        self.name.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// Experiment template
// ───────────────────────────────────────────────────────────────

/// User-supplied blueprint for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentTemplate {
    pub uid: u64,
    pub name: String,
    pub date: String,
    pub config_file: HardwareConfig,
    /// One-based lane number the template targets by default.
    pub active_lane: u8,

    pub led_front: Option<Led>,
    /// Target intensity in [0, 1].
    pub led_front_intensity: f64,
    pub led_front_distance_to_vial: f64,
    /// Exposure duration in seconds.
    pub led_front_exposure_time: f64,

    pub led_back: Option<Led>,
    pub led_back_intensity: f64,
    pub led_back_distance_to_vial: f64,
    pub led_back_exposure_time: f64,

    /// Sample prompts; each entry is the delay to the next prompt in
    /// seconds, armed one at a time.
    pub time_points_sample_taking: Vec<f64>,
    pub size_sample: f64,
    /// Measurement sampling interval in seconds.
    pub measurement_interval: f64,
    pub position_thermocouple: String,
}

impl ExperimentTemplate {
    /// True when either configured LED is a UV emitter.
    pub fn uses_uv_led(&self) -> bool {
        self.led_front.as_ref().is_some_and(Led::is_uv)
            || self.led_back.as_ref().is_some_and(Led::is_uv)
    }
}

impl ConfigObject for ExperimentTemplate {
    fn uid(&self) -> u64 {
        self.uid
    }

    fn description(&self) -> String {
        self.name.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// Experiment record
// ───────────────────────────────────────────────────────────────

/// One entry of a lane's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPair {
    /// Seconds since experiment start, wall clock (pauses included).
    pub timepoint: f64,
    pub event: String,
}

impl EventPair {
    pub fn new(timepoint: f64, event: impl Into<String>) -> Self {
        Self {
            timepoint,
            event: event.into(),
        }
    }
}

/// One row of a lane's measurement log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasuredDataAtTimePoint {
    /// Seconds since experiment start.
    pub timepoint: f64,
    pub temperature_thermocouple: f64,
    pub ambient_temp_power_box: f64,
    pub ambient_temp_reactor_box: f64,
    pub voltage_lane1: f64,
    pub current_lane1: f64,
    pub ir_temp_lane1: f64,
    pub voltage_lane2: f64,
    pub current_lane2: f64,
    pub ir_temp_lane2: f64,
    pub voltage_lane3: f64,
    pub current_lane3: f64,
    pub ir_temp_lane3: f64,
    pub uv_index: f64,
    pub ambient_light: f64,
}

/// Finalized output of one run: the template fields copied forward plus
/// the logs and status flags collected while it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub uid: u64,
    pub name: String,
    pub lab_notebook_entry: String,
    /// Completion date, `YYYY-MM-DD`.
    pub date: String,
    pub config_file: HardwareConfig,
    /// One-based lane the run actually used.
    pub active_lane: u8,

    pub led_front: Option<Led>,
    pub led_front_intensity: f64,
    pub led_front_distance_to_vial: f64,
    pub led_front_exposure_time: f64,

    pub led_back: Option<Led>,
    pub led_back_intensity: f64,
    pub led_back_distance_to_vial: f64,
    pub led_back_exposure_time: f64,

    pub time_points_sample_taking: Vec<f64>,
    pub size_sample: f64,
    /// UIDs of experiments that ran on other lanes at the same time.
    pub parallel_experiments: Vec<u64>,
    pub position_thermocouple: String,

    pub error_occured: bool,
    pub experiment_cancelled: bool,
    pub event_log: Vec<EventPair>,
    pub measured_data: Vec<MeasuredDataAtTimePoint>,
}

impl ConfigObject for Experiment {
    fn uid(&self) -> u64 {
        self.uid
    }

    fn description(&self) -> String {
        self.name.clone()
    }
}
