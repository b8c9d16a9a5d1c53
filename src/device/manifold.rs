//! Declarative bricklet manifolds.
//!
//! Each box enumerates its peripherals as `(kind, uid)` pairs; `attach`
//! binds every declaration to a live handle over the box's single transport
//! channel.  The UID tables mirror the physical rig and are not
//! configurable.

use std::sync::Arc;

use crate::measurements::LedPosition;

use super::ports::{
    BrickletFactory, DigitalIo16, DualRelay, PowerMonitor, ScalarKind, ScalarSensor, ServoPwm,
    Transport,
};

// ───────────────────────────────────────────────────────────────
// Reactor box
// ───────────────────────────────────────────────────────────────

/// Peripherals of the reactor enclosure (sample stage side).
pub struct ReactorBoxBricklets {
    pub transport: Arc<dyn Transport>,
    pub thermocouple: Arc<dyn ScalarSensor>,
    pub io: Arc<dyn DigitalIo16>,
    pub ambient_light: Arc<dyn ScalarSensor>,
    pub temperature: Arc<dyn ScalarSensor>,
    /// IR thermometers, indexed by `lane.index()`.
    pub lane_temp_ir: [Arc<dyn ScalarSensor>; 3],
    pub uv_light: Arc<dyn ScalarSensor>,
}

impl ReactorBoxBricklets {
    pub const UID_THERMOCOUPLE: &'static str = "232m";
    pub const UID_IO: &'static str = "231w";
    pub const UID_AMBIENT_LIGHT: &'static str = "25sN";
    pub const UID_TEMPERATURE: &'static str = "ZQH";
    pub const UID_LANE_TEMP_IR: [&'static str; 3] = ["Tzv", "TzV", "TDe"];
    pub const UID_UV_LIGHT: &'static str = "MxN";

    pub fn attach(factory: &dyn BrickletFactory) -> Self {
        Self {
            transport: factory.transport(),
            thermocouple: factory.scalar(ScalarKind::Thermocouple, Self::UID_THERMOCOUPLE),
            io: factory.io16(Self::UID_IO),
            ambient_light: factory.scalar(ScalarKind::AmbientLight, Self::UID_AMBIENT_LIGHT),
            temperature: factory.scalar(ScalarKind::Temperature, Self::UID_TEMPERATURE),
            lane_temp_ir: Self::UID_LANE_TEMP_IR
                .map(|uid| factory.scalar(ScalarKind::TemperatureIr, uid)),
            uv_light: factory.scalar(ScalarKind::UvLight, Self::UID_UV_LIGHT),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Power box
// ───────────────────────────────────────────────────────────────

/// Peripherals of the power enclosure (LED drive side).
pub struct PowerBoxBricklets {
    pub transport: Arc<dyn Transport>,
    /// One dual relay per LED position, `[lane][side]`.
    pub dual_relays: [[Arc<dyn DualRelay>; 2]; 3],
    pub io: Arc<dyn DigitalIo16>,
    pub temperature: Arc<dyn ScalarSensor>,
    /// Per-position voltage/current sensors, `[lane][side]`.
    pub voltage_current: [[Arc<dyn PowerMonitor>; 2]; 3],
    pub voltage_current_total: Arc<dyn PowerMonitor>,
    pub servo: Arc<dyn ServoPwm>,
}

impl PowerBoxBricklets {
    /// `[lane][side]`, front first.
    pub const UID_DUAL_RELAYS: [[&'static str; 2]; 3] =
        [["211B", "211L"], ["211J", "211A"], ["211K", "211s"]];
    pub const UID_IO: &'static str = "231g";
    pub const UID_TEMPERATURE: &'static str = "ZQZ";
    /// `[lane][side]`, front first.
    pub const UID_VOLTAGE_CURRENT: [[&'static str; 2]; 3] =
        [["23j6", "23jv"], ["23jJ", "23jD"], ["23jw", "23jd"]];
    pub const UID_VOLTAGE_CURRENT_TOTAL: &'static str = "23jb";
    pub const UID_SERVO: &'static str = "SFe";

    pub fn attach(factory: &dyn BrickletFactory) -> Self {
        Self {
            transport: factory.transport(),
            dual_relays: Self::UID_DUAL_RELAYS.map(|pair| pair.map(|uid| factory.dual_relay(uid))),
            io: factory.io16(Self::UID_IO),
            temperature: factory.scalar(ScalarKind::Temperature, Self::UID_TEMPERATURE),
            voltage_current: Self::UID_VOLTAGE_CURRENT
                .map(|pair| pair.map(|uid| factory.power_monitor(uid))),
            voltage_current_total: factory.power_monitor(Self::UID_VOLTAGE_CURRENT_TOTAL),
            servo: factory.servo(Self::UID_SERVO),
        }
    }

    pub fn dual_relay(&self, position: LedPosition) -> &Arc<dyn DualRelay> {
        &self.dual_relays[position.lane.index()][position.side.index()]
    }

    pub fn voltage_current(&self, position: LedPosition) -> &Arc<dyn PowerMonitor> {
        &self.voltage_current[position.lane.index()][position.side.index()]
    }
}
