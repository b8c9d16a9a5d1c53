//! Peripheral port traits — the boundary between the control core and the
//! bricklet bus.
//!
//! ```text
//!   Adapter (vendor TCP client / simulator) ──▶ Port trait ──▶ Box
//! ```
//!
//! The wire protocol lives entirely behind these traits; the vendor client
//! and the in-process simulator both implement them.  All methods take
//! `&self` — concrete adapters are internally synchronised, which lets the
//! boxes share cheap `Arc` handles across callback threads.
//!
//! Callback registration hands the adapter a boxed closure.  Peripherals
//! have one callback slot per event (as the wire protocol does): registering
//! again replaces the previous closure, which keeps a reconnect-triggered
//! re-initialization idempotent.  Adapters invoke callbacks from their own
//! receive threads; one peripheral's callbacks are serialized,
//! cross-peripheral ordering is undefined.

use std::sync::Arc;

use crate::error::DeviceError;

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

/// One TCP endpoint carrying every bricklet of a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub const DEFAULT_PORT: u16 = 4223;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Connection lifecycle of a box's bricklet bus.
///
/// Adapters enable auto-reconnect after the initial `connect`; the
/// connection-change callback fires on every edge, including reconnects.
pub trait Transport: Send + Sync {
    fn connect(&self) -> Result<(), DeviceError>;
    fn disconnect(&self);
    fn is_connected(&self) -> bool;
    fn on_connection_change(&self, callback: Box<dyn Fn(bool) + Send + Sync>);
}

// ───────────────────────────────────────────────────────────────
// Peripherals
// ───────────────────────────────────────────────────────────────

/// Direction of a digital I/O channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// 16-channel digital I/O peripheral with monoflop support.
///
/// A monoflop holds `value` on a channel for `duration_ms`, then restores
/// the previous level and fires the monoflop-done callback with the final
/// channel value.
pub trait DigitalIo16: Send + Sync {
    fn set_configuration(&self, channel: u8, direction: PortDirection, init: bool);
    fn set_selected_value(&self, channel: u8, value: bool);
    fn set_monoflop(&self, channel: u8, value: bool, duration_ms: u32);
    fn set_input_value_callback_configuration(
        &self,
        channel: u8,
        period_ms: u32,
        value_has_to_change: bool,
    );
    fn get_value(&self) -> [bool; 16];
    /// `(channel, changed, value)` on every configured input edge/period.
    fn on_input_value(&self, callback: Box<dyn Fn(u8, bool, bool) + Send + Sync>);
    /// `(channel, value)` when a monoflop expires.
    fn on_monoflop_done(&self, callback: Box<dyn Fn(u8, bool) + Send + Sync>);
}

/// Which scalar quantity a [`ScalarSensor`] reports.  The raw integer scale
/// is fixed per kind (hundredth degC, tenth degC, hundredth lx, tenth UVI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Thermocouple,
    Temperature,
    AmbientLight,
    TemperatureIr,
    UvLight,
}

/// A sensor bricklet that pushes one integer reading per period.
pub trait ScalarSensor: Send + Sync {
    fn set_callback_period(&self, period_ms: u32);
    fn on_reading(&self, callback: Box<dyn Fn(i64) + Send + Sync>);
}

/// Combined voltage/current sensor with independent callback periods.
pub trait PowerMonitor: Send + Sync {
    fn set_voltage_callback_period(&self, period_ms: u32);
    fn set_current_callback_period(&self, period_ms: u32);
    /// Millivolts.
    fn on_voltage(&self, callback: Box<dyn Fn(i32) + Send + Sync>);
    /// Milliamps.
    fn on_current(&self, callback: Box<dyn Fn(i32) + Send + Sync>);
}

/// Two-channel industrial relay.
///
/// Commands are fire-and-forget (no response expected): waiting for
/// acknowledgements would stall the relay bus during the ordered
/// close/open sequences.
pub trait DualRelay: Send + Sync {
    fn set_selected(&self, relay: u8, closed: bool);
}

/// Servo bricklet used as a high-resolution PWM source for the LED drivers.
pub trait ServoPwm: Send + Sync {
    fn set_degree(&self, channel: u8, min: i32, max: i32);
    fn set_period(&self, channel: u8, period_us: u32);
    fn set_pulse_width(&self, channel: u8, min_us: u32, max_us: u32);
    fn set_position(&self, channel: u8, degree: i32);
    fn set_motion_configuration(
        &self,
        channel: u8,
        velocity: u32,
        acceleration: u32,
        deceleration: u32,
    );
    fn set_enable(&self, channel: u8, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// Factory
// ───────────────────────────────────────────────────────────────

/// Binds `(kind, uid)` declarations to live peripheral handles over one
/// transport channel.  The manifolds call this once per declared bricklet.
pub trait BrickletFactory: Send + Sync {
    fn transport(&self) -> Arc<dyn Transport>;
    fn io16(&self, uid: &str) -> Arc<dyn DigitalIo16>;
    fn scalar(&self, kind: ScalarKind, uid: &str) -> Arc<dyn ScalarSensor>;
    fn power_monitor(&self, uid: &str) -> Arc<dyn PowerMonitor>;
    fn dual_relay(&self, uid: &str) -> Arc<dyn DualRelay>;
    fn servo(&self, uid: &str) -> Arc<dyn ServoPwm>;
}
