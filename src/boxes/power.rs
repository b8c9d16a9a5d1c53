//! Power box: regulated high-current LED drive.
//!
//! Owns the six LED drive channels (dual relay + servo-PWM + PID current
//! loop per position), the per-position power monitoring, and the power-box
//! status panel.  The current callbacks double as the PID control loop: a
//! position with a live PID entry converts every 100 ms current sample into
//! a new PWM position.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::control::pid::LedPid;
use crate::device::manifold::PowerBoxBricklets;
use crate::device::panel::{LedChannel, LedState, StatusLedPanel};
use crate::device::ports::ServoPwm;
use crate::error::{PowerError, Result};
use crate::measurements::{Current, LedLane, LedPosition, LedSide, Temperature, Voltage};
use crate::observable::Observable;

/// Servo PWM period in microseconds.
pub const PWM_PERIOD_US: u32 = 10_000;
/// Full-scale servo position; drives the LED fully *off* (inverted duty).
pub const PWM_MAX_DEGREE: i32 = 10_000;
/// Current sensors feed the PID loop at this rate.
pub const PID_SENSOR_PERIOD_MS: u32 = 100;
/// Settle time between the two relay channels of one position.
const RELAY_SETTLE: Duration = Duration::from_millis(10);

// ───────────────────────────────────────────────────────────────
// Sensor state
// ───────────────────────────────────────────────────────────────

/// Lid switch state of an enclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseLidState {
    #[default]
    Open,
    Closed,
}

impl CaseLidState {
    pub const fn name(self) -> &'static str {
        match self {
            CaseLidState::Open => "OPEN",
            CaseLidState::Closed => "CLOSED",
        }
    }
}

/// Latest reading of every power-box sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PowerBoxSensorState {
    pub ambient_temperature: Temperature,
    pub voltage_total: Voltage,
    pub current_total: Current,
    /// Per-position LED supply voltage, `[lane][side]`.
    pub lane_voltage: [[Voltage; 2]; 3],
    /// Per-position LED current, `[lane][side]`.
    pub lane_current: [[Current; 2]; 3],

    pub powerbox_lid: CaseLidState,
    pub reactorbox_lid: CaseLidState,
    /// LED-installed detectors, `[lane][side]` (front also covers the vial).
    pub led_installed: [[bool; 2]; 3],
    pub water_detected: bool,
    pub cable_control: bool,
}

impl PowerBoxSensorState {
    pub fn led_voltage(&self, position: LedPosition) -> Voltage {
        self.lane_voltage[position.lane.index()][position.side.index()]
    }

    pub fn led_current(&self, position: LedPosition) -> Current {
        self.lane_current[position.lane.index()][position.side.index()]
    }

    pub fn led_installed(&self, position: LedPosition) -> bool {
        self.led_installed[position.lane.index()][position.side.index()]
    }
}

/// One variant per observable field, carrying the freshly written value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerBoxField {
    AmbientTemperature(Temperature),
    VoltageTotal(Voltage),
    CurrentTotal(Current),
    LaneVoltage(LedPosition, Voltage),
    LaneCurrent(LedPosition, Current),
    PowerBoxLid(CaseLidState),
    ReactorBoxLid(CaseLidState),
    LedInstalled(LedPosition, bool),
    WaterDetected(bool),
    CableControl(bool),
}

pub type PowerSensors = Observable<PowerBoxSensorState, PowerBoxField>;

// ───────────────────────────────────────────────────────────────
// Panel legend (bit-exact channel map)
// ───────────────────────────────────────────────────────────────

/// Channel assignment of the power-box I/O bricklet.
pub struct PowerPanel;

impl PowerPanel {
    pub const INPUT_POWERBOX_CLOSED: u8 = 0;
    pub const INPUT_REACTORBOX_CLOSED: u8 = 1;
    /// `[lane][side]`; front detectors also sense the vial.
    // TODO: check the wiring diagram for active-low detectors on these
    // channels before trusting them for interlocks.
    pub const INPUT_LED_INSTALLED: [[u8; 2]; 3] = [[2, 3], [4, 5], [6, 7]];
    pub const INPUT_WATER_DETECTED: u8 = 9;
    pub const INPUT_CABLE_CONTROL: u8 = 15;

    pub const LED_WARNING_TEMP_AMBIENT: LedChannel = LedChannel(8);
    pub const LED_MAINTENANCE_ACTIVE: LedChannel = LedChannel(10);
    pub const LED_CONNECTED: LedChannel = LedChannel(11);
    pub const LED_WARNING_VOLTAGE: LedChannel = LedChannel(12);
    pub const LED_WARNING_WATER: LedChannel = LedChannel(13);
    pub const LED_BOXES_CLOSED: LedChannel = LedChannel(14);

    pub fn is_output_channel(channel: u8) -> bool {
        matches!(channel, 8 | 10 | 11 | 12 | 13 | 14)
    }
}

// ───────────────────────────────────────────────────────────────
// Box
// ───────────────────────────────────────────────────────────────

/// Per-position drive bookkeeping, shared with the current callbacks.
#[derive(Default)]
struct LedDriveTable {
    max_current: HashMap<LedPosition, Current>,
    pid: HashMap<LedPosition, LedPid>,
}

pub struct PowerBox {
    bricklets: PowerBoxBricklets,
    pub sensors: Arc<PowerSensors>,
    panel: StatusLedPanel,
    sensor_period_ms: u32,
    drive: Arc<Mutex<LedDriveTable>>,
}

impl PowerBox {
    pub fn new(bricklets: PowerBoxBricklets, sensor_period_ms: u32) -> Self {
        let panel = StatusLedPanel::new(Arc::clone(&bricklets.io));
        Self {
            bricklets,
            sensors: Arc::new(Observable::new(PowerBoxSensorState::default())),
            panel,
            sensor_period_ms,
            drive: Arc::new(Mutex::new(LedDriveTable::default())),
        }
    }

    pub fn panel(&self) -> &StatusLedPanel {
        &self.panel
    }

    pub fn transport(&self) -> Arc<dyn crate::device::ports::Transport> {
        Arc::clone(&self.bricklets.transport)
    }

    /// Hard-coded servo channel per LED position (wired on the backplane).
    pub const fn servo_channel(position: LedPosition) -> u8 {
        match (position.lane, position.side) {
            (LedLane::Lane1, LedSide::Front) => 0,
            (LedLane::Lane2, LedSide::Front) => 1,
            (LedLane::Lane3, LedSide::Front) => 2,
            (LedLane::Lane1, LedSide::Back) => 7,
            (LedLane::Lane2, LedSide::Back) => 8,
            (LedLane::Lane3, LedSide::Back) => 9,
        }
    }

    /// Register every callback, configure periods and channel directions,
    /// and run the panel lamp test.  Idempotent for transport reconnects.
    pub fn initialize(&self) {
        let period = self.sensor_period_ms;

        self.panel.initialize(PowerPanel::is_output_channel, period);

        let sensors = Arc::clone(&self.sensors);
        self.bricklets.io.on_input_value(Box::new(move |channel, _changed, value| {
            Self::apply_input(&sensors, channel, value);
        }));
        // Bootstrap the input snapshot so lid and detector states are
        // populated before the first change-driven callback.
        let initial = self.bricklets.io.get_value();
        for channel in 0..16u8 {
            if !PowerPanel::is_output_channel(channel) {
                Self::apply_input(&self.sensors, channel, initial[channel as usize]);
            }
        }

        let sensors = Arc::clone(&self.sensors);
        self.bricklets.temperature.on_reading(Box::new(move |hundredth| {
            let temp = Temperature::from_hundredth_celsius(hundredth as i32);
            sensors.update(PowerBoxField::AmbientTemperature(temp), |s| {
                s.ambient_temperature = temp;
            });
        }));
        self.bricklets.temperature.set_callback_period(period);

        for position in LedPosition::iter() {
            let monitor = self.bricklets.voltage_current(position);

            let sensors = Arc::clone(&self.sensors);
            monitor.on_voltage(Box::new(move |milli_volts| {
                let voltage = Voltage::from_milli_volts(milli_volts);
                sensors.update(PowerBoxField::LaneVoltage(position, voltage), |s| {
                    s.lane_voltage[position.lane.index()][position.side.index()] = voltage;
                });
            }));

            let sensors = Arc::clone(&self.sensors);
            let drive = Arc::clone(&self.drive);
            let servo = Arc::clone(&self.bricklets.servo);
            monitor.on_current(Box::new(move |milli_amps| {
                let current = Current::from_milli_amps(milli_amps);
                sensors.update(PowerBoxField::LaneCurrent(position, current), |s| {
                    s.lane_current[position.lane.index()][position.side.index()] = current;
                });
                Self::step_pid(&drive, servo.as_ref(), position, current);
            }));

            monitor.set_current_callback_period(PID_SENSOR_PERIOD_MS);
            monitor.set_voltage_callback_period(period);
        }

        let sensors = Arc::clone(&self.sensors);
        self.bricklets.voltage_current_total.on_voltage(Box::new(move |milli_volts| {
            let voltage = Voltage::from_milli_volts(milli_volts);
            sensors.update(PowerBoxField::VoltageTotal(voltage), |s| {
                s.voltage_total = voltage;
            });
        }));
        let sensors = Arc::clone(&self.sensors);
        self.bricklets.voltage_current_total.on_current(Box::new(move |milli_amps| {
            let current = Current::from_milli_amps(milli_amps);
            sensors.update(PowerBoxField::CurrentTotal(current), |s| {
                s.current_total = current;
            });
        }));
        self.bricklets.voltage_current_total.set_current_callback_period(period);
        self.bricklets.voltage_current_total.set_voltage_callback_period(period);

        // Lamp test; the controller recomputes the real states right after.
        for channel in 0..16u8 {
            if PowerPanel::is_output_channel(channel) {
                self.panel.set(channel, LedState::High);
            }
        }
        debug!("power box initialized (sensor period {period} ms)");
    }

    // ── LED drive commands ────────────────────────────────────

    /// Remember the drive limit of a position.  Required before
    /// [`activate_led`](Self::activate_led).
    pub fn set_led_max_current(&self, position: LedPosition, current: Current) -> Result<()> {
        if !(0..=1000).contains(&current.milli_amps) {
            return Err(PowerError::MaxCurrentOutOfRange.into());
        }
        debug!("setting led max current {position} to {current}");
        self.drive.lock().unwrap().max_current.insert(position, current);
        Ok(())
    }

    /// Energise an LED and start the feedback loop keeping its intensity.
    ///
    /// The relay channels close in fixed order with a 10 ms settle between
    /// them; reversing the order stresses the LED driver.
    pub fn activate_led(&self, position: LedPosition, target_intensity: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&target_intensity) {
            return Err(PowerError::IntensityOutOfRange.into());
        }
        let max_current = {
            let drive = self.drive.lock().unwrap();
            *drive
                .max_current
                .get(&position)
                .ok_or(PowerError::MaxCurrentNotSet(position))?
        };

        debug!("activating led {position} at intensity {target_intensity}");

        self.set_pwm_absolute_intensity(position, 0.0);
        self.bricklets.servo.set_enable(Self::servo_channel(position), true);

        let relay = self.bricklets.dual_relay(position);
        relay.set_selected(1, true);
        thread::sleep(RELAY_SETTLE);
        relay.set_selected(0, true);

        self.drive
            .lock()
            .unwrap()
            .pid
            .insert(position, LedPid::new(max_current * target_intensity));
        Ok(())
    }

    /// De-energise an LED.  Safe to call for a position that was never
    /// activated — the relay and servo lines are always safe to command,
    /// only the PID entry removal is conditional.
    pub fn deactivate_led(&self, position: LedPosition) {
        debug!("deactivating led {position}");

        let relay = self.bricklets.dual_relay(position);
        relay.set_selected(0, false);
        thread::sleep(RELAY_SETTLE);
        relay.set_selected(1, false);

        self.drive.lock().unwrap().pid.remove(&position);
        self.bricklets.servo.set_enable(Self::servo_channel(position), false);
    }

    /// Deactivate all six positions and reset the servo bricklet.  Called on
    /// startup and shutdown.
    pub fn reset_leds(&self) {
        for position in LedPosition::iter() {
            self.deactivate_led(position);
        }
        thread::sleep(RELAY_SETTLE);
        for position in LedPosition::iter() {
            let channel = Self::servo_channel(position);
            self.bricklets.servo.set_degree(channel, 0, PWM_MAX_DEGREE);
            self.bricklets.servo.set_period(channel, PWM_PERIOD_US);
            self.bricklets.servo.set_pulse_width(channel, 0, PWM_PERIOD_US);
            self.bricklets.servo.set_position(channel, PWM_MAX_DEGREE);
            self.bricklets.servo.set_motion_configuration(channel, 0, 0, 0);
            self.bricklets.servo.set_enable(channel, false);
        }
    }

    /// True while the position has a live PID entry (commanded on).
    pub fn is_led_active(&self, position: LedPosition) -> bool {
        self.drive.lock().unwrap().pid.contains_key(&position)
    }

    // ── Internal ──────────────────────────────────────────────

    /// PWM mapping is inverted: intensity 1.0 -> position 0.
    fn set_pwm_absolute_intensity(&self, position: LedPosition, intensity: f64) {
        let degree = (f64::from(PWM_MAX_DEGREE) * (1.0 - intensity)).round() as i32;
        self.bricklets
            .servo
            .set_position(Self::servo_channel(position), degree);
    }

    fn step_pid(
        drive: &Mutex<LedDriveTable>,
        servo: &dyn ServoPwm,
        position: LedPosition,
        measured: Current,
    ) {
        let intensity = {
            let mut drive = drive.lock().unwrap();
            match drive.pid.get_mut(&position) {
                Some(pid) => pid.step(measured),
                None => return,
            }
        };
        let clamped = intensity.clamp(0.0, 1.0);
        let degree = (f64::from(PWM_MAX_DEGREE) * (1.0 - clamped)).round() as i32;
        servo.set_position(Self::servo_channel(position), degree);
    }

    /// Map one I/O input channel to its sensor-state field.
    fn apply_input(sensors: &PowerSensors, channel: u8, raw: bool) {
        if channel == PowerPanel::INPUT_POWERBOX_CLOSED {
            let lid = if raw { CaseLidState::Open } else { CaseLidState::Closed };
            sensors.update(PowerBoxField::PowerBoxLid(lid), |s| s.powerbox_lid = lid);
        } else if channel == PowerPanel::INPUT_REACTORBOX_CLOSED {
            let lid = if raw { CaseLidState::Open } else { CaseLidState::Closed };
            sensors.update(PowerBoxField::ReactorBoxLid(lid), |s| s.reactorbox_lid = lid);
        } else if channel == PowerPanel::INPUT_WATER_DETECTED {
            // Active-low detector.
            let detected = !raw;
            sensors.update(PowerBoxField::WaterDetected(detected), |s| {
                s.water_detected = detected;
            });
        } else if channel == PowerPanel::INPUT_CABLE_CONTROL {
            sensors.update(PowerBoxField::CableControl(raw), |s| s.cable_control = raw);
        } else {
            for position in LedPosition::iter() {
                if PowerPanel::INPUT_LED_INSTALLED[position.lane.index()][position.side.index()]
                    == channel
                {
                    sensors.update(PowerBoxField::LedInstalled(position, raw), |s| {
                        s.led_installed[position.lane.index()][position.side.index()] = raw;
                    });
                    return;
                }
            }
        }
    }
}
