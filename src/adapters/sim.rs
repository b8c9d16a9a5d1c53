//! In-process simulated rig.
//!
//! Every peripheral port trait gets a small mock that records commands and
//! lets a driver (test or demo loop) feed sensor readings and input edges
//! by hand.  Monoflops are queued and fired by an explicit
//! [`SimIo16::tick_monoflops`] call so blinking stays deterministic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::device::ports::{
    BrickletFactory, DigitalIo16, DualRelay, PortDirection, PowerMonitor, ScalarKind,
    ScalarSensor, ServoPwm, Transport,
};
use crate::error::DeviceError;

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SimTransport {
    connected: Mutex<bool>,
    observers: Mutex<Vec<Box<dyn Fn(bool) + Send + Sync>>>,
}

impl SimTransport {
    fn notify(&self, connected: bool) {
        for observer in self.observers.lock().unwrap().iter() {
            observer(connected);
        }
    }

    /// Simulate a link drop (auto-reconnect is up to the driver).
    pub fn drop_connection(&self) {
        *self.connected.lock().unwrap() = false;
        self.notify(false);
    }

    /// Simulate the link coming back.
    pub fn restore_connection(&self) {
        *self.connected.lock().unwrap() = true;
        self.notify(true);
    }
}

impl Transport for SimTransport {
    fn connect(&self) -> Result<(), DeviceError> {
        *self.connected.lock().unwrap() = true;
        self.notify(true);
        Ok(())
    }

    fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
        self.notify(false);
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }

    fn on_connection_change(&self, callback: Box<dyn Fn(bool) + Send + Sync>) {
        self.observers.lock().unwrap().push(callback);
    }
}

// ───────────────────────────────────────────────────────────────
// Digital I/O
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SimIo16 {
    directions: Mutex<[Option<PortDirection>; 16]>,
    outputs: Mutex<[bool; 16]>,
    inputs: Mutex<[bool; 16]>,
    pending_monoflops: Mutex<Vec<(u8, bool, u32)>>,
    input_callback: Mutex<Option<Box<dyn Fn(u8, bool, bool) + Send + Sync>>>,
    monoflop_callback: Mutex<Option<Box<dyn Fn(u8, bool) + Send + Sync>>>,
}

impl SimIo16 {
    /// Preset an input level without firing callbacks (pre-boot wiring).
    pub fn preset_input(&self, channel: u8, value: bool) {
        self.inputs.lock().unwrap()[channel as usize] = value;
    }

    /// Drive an input edge: store the level and fire the input callback.
    pub fn set_input(&self, channel: u8, value: bool) {
        self.inputs.lock().unwrap()[channel as usize] = value;
        if let Some(callback) = self.input_callback.lock().unwrap().as_ref() {
            callback(channel, true, value);
        }
    }

    /// Last commanded output level of a channel.
    pub fn output(&self, channel: u8) -> bool {
        self.outputs.lock().unwrap()[channel as usize]
    }

    /// Expire every queued monoflop once, firing the done callbacks.
    /// A blinking panel channel re-queues itself from inside the callback.
    pub fn tick_monoflops(&self) {
        let pending: Vec<_> = self.pending_monoflops.lock().unwrap().drain(..).collect();
        for (channel, value, _duration) in pending {
            self.outputs.lock().unwrap()[channel as usize] = value;
            if let Some(callback) = self.monoflop_callback.lock().unwrap().as_ref() {
                callback(channel, value);
            }
        }
    }

    /// Queued monoflop requests (channel, value, duration ms).
    pub fn pending_monoflops(&self) -> Vec<(u8, bool, u32)> {
        self.pending_monoflops.lock().unwrap().clone()
    }
}

impl DigitalIo16 for SimIo16 {
    fn set_configuration(&self, channel: u8, direction: PortDirection, _init: bool) {
        self.directions.lock().unwrap()[channel as usize] = Some(direction);
    }

    fn set_selected_value(&self, channel: u8, value: bool) {
        self.outputs.lock().unwrap()[channel as usize] = value;
    }

    fn set_monoflop(&self, channel: u8, value: bool, duration_ms: u32) {
        self.pending_monoflops
            .lock()
            .unwrap()
            .push((channel, value, duration_ms));
    }

    fn set_input_value_callback_configuration(
        &self,
        _channel: u8,
        _period_ms: u32,
        _value_has_to_change: bool,
    ) {
    }

    fn get_value(&self) -> [bool; 16] {
        let inputs = self.inputs.lock().unwrap();
        let outputs = self.outputs.lock().unwrap();
        let directions = self.directions.lock().unwrap();
        let mut value = [false; 16];
        for channel in 0..16 {
            value[channel] = match directions[channel] {
                Some(PortDirection::Output) => outputs[channel],
                _ => inputs[channel],
            };
        }
        value
    }

    fn on_input_value(&self, callback: Box<dyn Fn(u8, bool, bool) + Send + Sync>) {
        *self.input_callback.lock().unwrap() = Some(callback);
    }

    fn on_monoflop_done(&self, callback: Box<dyn Fn(u8, bool) + Send + Sync>) {
        *self.monoflop_callback.lock().unwrap() = Some(callback);
    }
}

// ───────────────────────────────────────────────────────────────
// Scalar sensors and power monitors
// ───────────────────────────────────────────────────────────────

pub struct SimScalarSensor {
    pub kind: ScalarKind,
    period_ms: Mutex<u32>,
    callback: Mutex<Option<Box<dyn Fn(i64) + Send + Sync>>>,
}

impl SimScalarSensor {
    fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            period_ms: Mutex::new(0),
            callback: Mutex::new(None),
        }
    }

    /// Push one raw reading through the registered callback.
    pub fn feed(&self, raw: i64) {
        if let Some(callback) = self.callback.lock().unwrap().as_ref() {
            callback(raw);
        }
    }

    pub fn period_ms(&self) -> u32 {
        *self.period_ms.lock().unwrap()
    }
}

impl ScalarSensor for SimScalarSensor {
    fn set_callback_period(&self, period_ms: u32) {
        *self.period_ms.lock().unwrap() = period_ms;
    }

    fn on_reading(&self, callback: Box<dyn Fn(i64) + Send + Sync>) {
        *self.callback.lock().unwrap() = Some(callback);
    }
}

#[derive(Default)]
pub struct SimPowerMonitor {
    voltage_period_ms: Mutex<u32>,
    current_period_ms: Mutex<u32>,
    voltage_callback: Mutex<Option<Box<dyn Fn(i32) + Send + Sync>>>,
    current_callback: Mutex<Option<Box<dyn Fn(i32) + Send + Sync>>>,
}

impl SimPowerMonitor {
    pub fn feed_voltage(&self, milli_volts: i32) {
        if let Some(callback) = self.voltage_callback.lock().unwrap().as_ref() {
            callback(milli_volts);
        }
    }

    pub fn feed_current(&self, milli_amps: i32) {
        if let Some(callback) = self.current_callback.lock().unwrap().as_ref() {
            callback(milli_amps);
        }
    }

    pub fn current_period_ms(&self) -> u32 {
        *self.current_period_ms.lock().unwrap()
    }
}

impl PowerMonitor for SimPowerMonitor {
    fn set_voltage_callback_period(&self, period_ms: u32) {
        *self.voltage_period_ms.lock().unwrap() = period_ms;
    }

    fn set_current_callback_period(&self, period_ms: u32) {
        *self.current_period_ms.lock().unwrap() = period_ms;
    }

    fn on_voltage(&self, callback: Box<dyn Fn(i32) + Send + Sync>) {
        *self.voltage_callback.lock().unwrap() = Some(callback);
    }

    fn on_current(&self, callback: Box<dyn Fn(i32) + Send + Sync>) {
        *self.current_callback.lock().unwrap() = Some(callback);
    }
}

// ───────────────────────────────────────────────────────────────
// Relays and servo
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SimDualRelay {
    states: Mutex<[bool; 2]>,
    /// Every `(relay, closed)` command in order, for ordering assertions.
    history: Mutex<Vec<(u8, bool)>>,
}

impl SimDualRelay {
    pub fn states(&self) -> [bool; 2] {
        *self.states.lock().unwrap()
    }

    pub fn history(&self) -> Vec<(u8, bool)> {
        self.history.lock().unwrap().clone()
    }
}

impl DualRelay for SimDualRelay {
    fn set_selected(&self, relay: u8, closed: bool) {
        self.states.lock().unwrap()[relay as usize] = closed;
        self.history.lock().unwrap().push((relay, closed));
    }
}

#[derive(Default)]
pub struct SimServo {
    positions: Mutex<HashMap<u8, i32>>,
    enabled: Mutex<HashMap<u8, bool>>,
}

impl SimServo {
    pub fn position(&self, channel: u8) -> Option<i32> {
        self.positions.lock().unwrap().get(&channel).copied()
    }

    pub fn is_enabled(&self, channel: u8) -> bool {
        self.enabled.lock().unwrap().get(&channel).copied().unwrap_or(false)
    }
}

impl ServoPwm for SimServo {
    fn set_degree(&self, _channel: u8, _min: i32, _max: i32) {}

    fn set_period(&self, _channel: u8, _period_us: u32) {}

    fn set_pulse_width(&self, _channel: u8, _min_us: u32, _max_us: u32) {}

    fn set_position(&self, channel: u8, degree: i32) {
        self.positions.lock().unwrap().insert(channel, degree);
    }

    fn set_motion_configuration(
        &self,
        _channel: u8,
        _velocity: u32,
        _acceleration: u32,
        _deceleration: u32,
    ) {
    }

    fn set_enable(&self, channel: u8, enabled: bool) {
        self.enabled.lock().unwrap().insert(channel, enabled);
    }
}

// ───────────────────────────────────────────────────────────────
// Factory
// ───────────────────────────────────────────────────────────────

/// One simulated box: hands out peripheral handles by UID and keeps the
/// concrete mocks reachable so the driver can feed them.
#[derive(Default)]
pub struct SimFactory {
    transport: Arc<SimTransport>,
    io16s: Mutex<HashMap<String, Arc<SimIo16>>>,
    scalars: Mutex<HashMap<String, Arc<SimScalarSensor>>>,
    monitors: Mutex<HashMap<String, Arc<SimPowerMonitor>>>,
    relays: Mutex<HashMap<String, Arc<SimDualRelay>>>,
    servos: Mutex<HashMap<String, Arc<SimServo>>>,
}

impl SimFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sim_transport(&self) -> Arc<SimTransport> {
        Arc::clone(&self.transport)
    }

    pub fn sim_io16(&self, uid: &str) -> Arc<SimIo16> {
        Arc::clone(
            self.io16s
                .lock()
                .unwrap()
                .entry(uid.to_string())
                .or_default(),
        )
    }

    pub fn sim_scalar(&self, kind: ScalarKind, uid: &str) -> Arc<SimScalarSensor> {
        Arc::clone(
            self.scalars
                .lock()
                .unwrap()
                .entry(uid.to_string())
                .or_insert_with(|| Arc::new(SimScalarSensor::new(kind))),
        )
    }

    pub fn sim_power_monitor(&self, uid: &str) -> Arc<SimPowerMonitor> {
        Arc::clone(
            self.monitors
                .lock()
                .unwrap()
                .entry(uid.to_string())
                .or_default(),
        )
    }

    pub fn sim_dual_relay(&self, uid: &str) -> Arc<SimDualRelay> {
        Arc::clone(
            self.relays
                .lock()
                .unwrap()
                .entry(uid.to_string())
                .or_default(),
        )
    }

    pub fn sim_servo(&self, uid: &str) -> Arc<SimServo> {
        Arc::clone(
            self.servos
                .lock()
                .unwrap()
                .entry(uid.to_string())
                .or_default(),
        )
    }
}

impl BrickletFactory for SimFactory {
    fn transport(&self) -> Arc<dyn Transport> {
        self.sim_transport()
    }

    fn io16(&self, uid: &str) -> Arc<dyn DigitalIo16> {
        self.sim_io16(uid)
    }

    fn scalar(&self, kind: ScalarKind, uid: &str) -> Arc<dyn ScalarSensor> {
        debug!("sim: attaching {kind:?} sensor {uid}");
        self.sim_scalar(kind, uid)
    }

    fn power_monitor(&self, uid: &str) -> Arc<dyn PowerMonitor> {
        self.sim_power_monitor(uid)
    }

    fn dual_relay(&self, uid: &str) -> Arc<dyn DualRelay> {
        self.sim_dual_relay(uid)
    }

    fn servo(&self, uid: &str) -> Arc<dyn ServoPwm> {
        self.sim_servo(uid)
    }
}
