//! Reactor box: sample stage enclosure.
//!
//! Forwards every sensor callback into the observable sensor state in its
//! native typed quantity and exposes the status panel legend.  The box
//! never decides anything — thresholds and LED policy live in the
//! controller.

use std::sync::Arc;

use log::debug;

use crate::device::manifold::ReactorBoxBricklets;
use crate::device::panel::{LedChannel, LedState, StatusLedPanel};
use crate::measurements::{Illuminance, LedLane, Temperature, UvIndex};
use crate::observable::Observable;

// ───────────────────────────────────────────────────────────────
// Sensor state
// ───────────────────────────────────────────────────────────────

/// Latest reading of every reactor-box sensor.  All fields start at their
/// typed zero and only move forward under bricklet callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReactorBoxSensorState {
    pub thermocouple_temp: Temperature,
    pub ambient_light: Illuminance,
    pub ambient_temperature: Temperature,
    /// Per-lane IR stage temperature, indexed by `lane.index()`.
    pub lane_ir_temp: [Temperature; 3],
    pub uv_index: UvIndex,
    /// Logical sample-taken inputs (the physical buttons are active-low).
    pub lane_sample_taken: [bool; 3],
    pub maintenance_mode: bool,
    pub cable_control: bool,
}

/// One variant per observable field, carrying the freshly written value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReactorBoxField {
    ThermocoupleTemp(Temperature),
    AmbientLight(Illuminance),
    AmbientTemperature(Temperature),
    LaneIrTemp(LedLane, Temperature),
    UvIndex(UvIndex),
    LaneSampleTaken(LedLane, bool),
    MaintenanceMode(bool),
    CableControl(bool),
}

pub type ReactorSensors = Observable<ReactorBoxSensorState, ReactorBoxField>;

// ───────────────────────────────────────────────────────────────
// Panel legend (bit-exact channel map)
// ───────────────────────────────────────────────────────────────

/// Channel assignment of the reactor-box I/O bricklet.
pub struct ReactorPanel;

impl ReactorPanel {
    pub const INPUT_SAMPLE_LANE: [u8; 3] = [0, 1, 2];
    pub const INPUT_MAINTENANCE_MODE: u8 = 14;
    pub const INPUT_CABLE_CONTROL: u8 = 15;

    pub const LED_STATE_LANE: [LedChannel; 3] = [LedChannel(3), LedChannel(4), LedChannel(5)];
    pub const LED_UV_INSTALLED: LedChannel = LedChannel(6);
    pub const LED_UV_WARNING: LedChannel = LedChannel(7);
    pub const LED_EXPERIMENT_RUNNING: LedChannel = LedChannel(8);
    pub const LED_WARNING_TEMP_LANE: [LedChannel; 3] =
        [LedChannel(9), LedChannel(10), LedChannel(11)];
    pub const LED_WARNING_TEMP_AMBIENT: LedChannel = LedChannel(12);
    pub const LED_WARNING_THERMOCOUPLE: LedChannel = LedChannel(13);

    pub fn is_output_channel(channel: u8) -> bool {
        (3..=13).contains(&channel)
    }
}

// ───────────────────────────────────────────────────────────────
// Box
// ───────────────────────────────────────────────────────────────

pub struct ReactorBox {
    bricklets: ReactorBoxBricklets,
    pub sensors: Arc<ReactorSensors>,
    panel: StatusLedPanel,
    sensor_period_ms: u32,
}

impl ReactorBox {
    pub fn new(bricklets: ReactorBoxBricklets, sensor_period_ms: u32) -> Self {
        let panel = StatusLedPanel::new(Arc::clone(&bricklets.io));
        Self {
            bricklets,
            sensors: Arc::new(Observable::new(ReactorBoxSensorState::default())),
            panel,
            sensor_period_ms,
        }
    }

    pub fn panel(&self) -> &StatusLedPanel {
        &self.panel
    }

    pub fn transport(&self) -> Arc<dyn crate::device::ports::Transport> {
        Arc::clone(&self.bricklets.transport)
    }

    /// Register every callback, configure periods and channel directions,
    /// and run the panel lamp test (all LEDs HIGH).  Idempotent, so a
    /// transport reconnect may simply call it again.
    pub fn initialize(&self) {
        let period = self.sensor_period_ms;

        self.panel
            .initialize(ReactorPanel::is_output_channel, period);

        let sensors = Arc::clone(&self.sensors);
        self.bricklets.io.on_input_value(Box::new(move |channel, _changed, value| {
            Self::apply_input(&sensors, channel, value);
        }));
        let sensors = Arc::clone(&self.sensors);
        self.bricklets.thermocouple.on_reading(Box::new(move |hundredth| {
            let temp = Temperature::from_hundredth_celsius(hundredth as i32);
            sensors.update(ReactorBoxField::ThermocoupleTemp(temp), |s| {
                s.thermocouple_temp = temp;
            });
        }));
        self.bricklets.thermocouple.set_callback_period(period);

        let sensors = Arc::clone(&self.sensors);
        self.bricklets.ambient_light.on_reading(Box::new(move |hundredth_lux| {
            let light = Illuminance::from_hundredth_lux(hundredth_lux);
            sensors.update(ReactorBoxField::AmbientLight(light), |s| {
                s.ambient_light = light;
            });
        }));
        self.bricklets.ambient_light.set_callback_period(period);

        let sensors = Arc::clone(&self.sensors);
        self.bricklets.temperature.on_reading(Box::new(move |hundredth| {
            let temp = Temperature::from_hundredth_celsius(hundredth as i32);
            sensors.update(ReactorBoxField::AmbientTemperature(temp), |s| {
                s.ambient_temperature = temp;
            });
        }));
        self.bricklets.temperature.set_callback_period(period);

        for lane in LedLane::ALL {
            let sensors = Arc::clone(&self.sensors);
            self.bricklets.lane_temp_ir[lane.index()].on_reading(Box::new(move |tenth| {
                let temp = Temperature::from_tenth_celsius(tenth as i32);
                sensors.update(ReactorBoxField::LaneIrTemp(lane, temp), |s| {
                    s.lane_ir_temp[lane.index()] = temp;
                });
            }));
            self.bricklets.lane_temp_ir[lane.index()].set_callback_period(period);
        }

        let sensors = Arc::clone(&self.sensors);
        self.bricklets.uv_light.on_reading(Box::new(move |tenth_uvi| {
            let uv = UvIndex::from_tenth_uvi(tenth_uvi as i32);
            sensors.update(ReactorBoxField::UvIndex(uv), |s| {
                s.uv_index = uv;
            });
        }));
        self.bricklets.uv_light.set_callback_period(period);

        // Lamp test; the controller recomputes the real states right after.
        for channel in 0..16u8 {
            if ReactorPanel::is_output_channel(channel) {
                self.panel.set(channel, LedState::High);
            }
        }
        debug!("reactor box initialized (sensor period {period} ms)");
    }

    /// Map one I/O input channel to its sensor-state field.
    fn apply_input(sensors: &ReactorSensors, channel: u8, raw: bool) {
        if let Some(lane) = ReactorPanel::INPUT_SAMPLE_LANE
            .iter()
            .position(|&c| c == channel)
            .and_then(LedLane::from_index)
        {
            // Sample buttons are wired active-low.
            let taken = !raw;
            sensors.update(ReactorBoxField::LaneSampleTaken(lane, taken), |s| {
                s.lane_sample_taken[lane.index()] = taken;
            });
        } else if channel == ReactorPanel::INPUT_MAINTENANCE_MODE {
            sensors.update(ReactorBoxField::MaintenanceMode(raw), |s| {
                s.maintenance_mode = raw;
            });
        } else if channel == ReactorPanel::INPUT_CABLE_CONTROL {
            sensors.update(ReactorBoxField::CableControl(raw), |s| {
                s.cable_control = raw;
            });
        }
    }
}
