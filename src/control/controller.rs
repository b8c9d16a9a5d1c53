//! Controller: the safety and threshold engine.
//!
//! Owns both boxes and the experiment supervisor.  Every observable
//! sensor field of either box fans out into one handler arm here; the
//! exhaustive `match` on the field unions is what guarantees no sensor
//! goes unsupervised.  Handlers advance the threshold machines under the
//! controller mutex, then drive panel LEDs and lane actions *after*
//! releasing it — the supervisor and runners take their own locks and may
//! call straight back into the controller.
//!
//! Runners reach the controller through [`ControllerHandle`], a non-owning
//! weak handle implementing [`ExperimentHost`]; the controller owns the
//! supervisor owns the runners, so no reference cycle survives shutdown.

use std::sync::{Arc, Mutex, Weak};

use log::{debug, error, info, warn};

use crate::boxes::power::{
    CaseLidState, PowerBox, PowerBoxField, PowerBoxSensorState, PowerPanel,
};
use crate::boxes::reactor::{
    ReactorBox, ReactorBoxField, ReactorBoxSensorState, ReactorPanel,
};
use crate::config::ControllerConfig;
use crate::configuration::{Experiment, ExperimentTemplate};
use crate::control::thresholds::{ThresholdAction, ThresholdMachine, ThresholdStatus};
use crate::device::manifold::{PowerBoxBricklets, ReactorBoxBricklets};
use crate::device::panel::{LedChannel, LedState};
use crate::device::ports::BrickletFactory;
use crate::error::Result;
use crate::experiment::supervisor::ExperimentSupervisor;
use crate::experiment::{ExperimentHost, MeasuredData};
use crate::measurements::{Current, LedLane, LedPosition, Temperature, Voltage};

pub const EVENT_WATER_LEAK: &str = "Water leakage detected";
pub const EVENT_VOLTAGE_ERROR: &str = "Voltage Error";
pub const EVENT_AMBIENT_WARN: &str = "Ambient Temperature exceeded threshold";
pub const EVENT_AMBIENT_ABORT: &str = "Ambient Temperature exceeded critical threshold";
pub const EVENT_AMBIENT_BACK: &str = "Ambient Temperature back to normal";
pub const EVENT_IR_WARN: &str = "IR Temperature exceeded threshold";
pub const EVENT_IR_ABORT: &str = "IR Temperature exceeded critical threshold";
pub const EVENT_IR_BACK: &str = "IR Temperature back to normal";
pub const EVENT_THERMOCOUPLE_WARN: &str = "Thermocouple Temperature exceeded threshold";
pub const EVENT_THERMOCOUPLE_BACK: &str = "Thermocouple Temperature back to normal";

/// Which box a connection event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoxSide {
    Reactor,
    Power,
}

/// Snapshot of everything the push surface shows.
#[derive(Debug, Clone, Copy)]
pub struct ControllerState {
    pub reactor_box_connected: bool,
    pub power_box_connected: bool,
    /// Lane is waiting for its sample prompt to be confirmed.
    pub sample_lane: [bool; 3],
    pub exp_running: [bool; 3],
    pub uv_installed: bool,
    pub ambient_temp_status: ThresholdStatus,
    pub ir_temp_status: [ThresholdStatus; 3],
    pub thermocouple_status: ThresholdStatus,
    pub reactor_box_state: ReactorBoxSensorState,
    pub power_box_state: PowerBoxSensorState,
}

/// Mutable controller state behind one mutex.  Never call into the
/// supervisor or runners while holding it.
struct Shared {
    reactor_connected: bool,
    power_connected: bool,
    sample_lane: [bool; 3],
    exp_running: [bool; 3],
    uv_lanes: [bool; 3],
    uv_installed: bool,
    ambient_reactor: ThresholdMachine,
    ambient_power: ThresholdMachine,
    ir: [ThresholdMachine; 3],
    thermocouple: ThresholdMachine,
    voltage_faults: [[bool; 2]; 3],
}

impl Shared {
    fn fault_count(&self) -> usize {
        self.voltage_faults.iter().flatten().filter(|f| **f).count()
    }
}

pub struct Controller {
    pub reactor_box: ReactorBox,
    pub power_box: PowerBox,
    supervisor: ExperimentSupervisor,
    config: ControllerConfig,
    shared: Mutex<Shared>,
    /// External persistence collaborator receiving finalized records.
    record_sink: Box<dyn Fn(LedLane, Experiment) + Send + Sync>,
}

impl Controller {
    /// Build the controller over two attached manifolds.  Call
    /// [`connect`](Self::connect) and [`initialize`](Self::initialize)
    /// before use.
    pub fn new(
        reactor_factory: &dyn BrickletFactory,
        power_factory: &dyn BrickletFactory,
        config: ControllerConfig,
        record_sink: Box<dyn Fn(LedLane, Experiment) + Send + Sync>,
    ) -> Arc<Self> {
        let reactor_box = ReactorBox::new(
            ReactorBoxBricklets::attach(reactor_factory),
            config.reactor_sensor_period_ms,
        );
        let power_box = PowerBox::new(
            PowerBoxBricklets::attach(power_factory),
            config.power_sensor_period_ms,
        );

        let warn_ambient = Temperature::from_celsius(config.ambient_warn_celsius);
        let abort_ambient = Temperature::from_celsius(config.ambient_abort_celsius);
        let warn_ir = Temperature::from_celsius(config.ir_warn_celsius);
        let abort_ir = Temperature::from_celsius(config.ir_abort_celsius);
        let warn_thermo = Temperature::from_celsius(config.thermocouple_warn_celsius);

        Arc::new_cyclic(|weak: &Weak<Controller>| {
            let supervisor =
                ExperimentSupervisor::new(Arc::new(ControllerHandle(weak.clone())));
            Controller {
                reactor_box,
                power_box,
                supervisor,
                config,
                shared: Mutex::new(Shared {
                    reactor_connected: false,
                    power_connected: false,
                    sample_lane: [false; 3],
                    exp_running: [false; 3],
                    uv_lanes: [false; 3],
                    uv_installed: false,
                    ambient_reactor: ThresholdMachine::new(warn_ambient, Some(abort_ambient)),
                    ambient_power: ThresholdMachine::new(warn_ambient, Some(abort_ambient)),
                    ir: [ThresholdMachine::new(warn_ir, Some(abort_ir)); 3],
                    thermocouple: ThresholdMachine::new(warn_thermo, None),
                    voltage_faults: [[false; 2]; 3],
                }),
                record_sink,
            }
        })
    }

    /// Establish both box connections (auto-reconnect stays on afterwards).
    pub fn connect(self: &Arc<Self>) -> Result<()> {
        for (side, transport) in [
            (BoxSide::Reactor, self.reactor_box.transport()),
            (BoxSide::Power, self.power_box.transport()),
        ] {
            let weak = Arc::downgrade(self);
            transport.on_connection_change(Box::new(move |connected| {
                if let Some(controller) = weak.upgrade() {
                    controller.on_connection_change(side, connected);
                }
            }));
            transport.connect()?;
        }
        Ok(())
    }

    /// Wire the sensor observers, initialize both boxes, and drive every
    /// panel LED to its resting state.
    pub fn initialize(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.reactor_box.sensors.subscribe(Box::new(move |old, new, field| {
            if let Some(controller) = weak.upgrade() {
                controller.on_reactor_field(old, new, field);
            }
        }));
        let weak = Arc::downgrade(self);
        self.power_box.sensors.subscribe(Box::new(move |old, new, field| {
            if let Some(controller) = weak.upgrade() {
                controller.on_power_field(old, new, field);
            }
        }));

        self.reactor_box.initialize();
        self.power_box.initialize();
        self.power_box.reset_leds();

        self.apply_resting_led_states();
        info!("controller initialized");
    }

    /// Panel states for "nothing is wrong and nothing runs".
    fn apply_resting_led_states(&self) {
        let reactor = self.reactor_box.panel();
        for lane in LedLane::ALL {
            ReactorPanel::LED_STATE_LANE[lane.index()].set(reactor, LedState::Low);
            ReactorPanel::LED_WARNING_TEMP_LANE[lane.index()].set(reactor, LedState::High);
        }
        ReactorPanel::LED_UV_INSTALLED.set(reactor, LedState::Low);
        ReactorPanel::LED_UV_WARNING.set(reactor, LedState::High);
        ReactorPanel::LED_EXPERIMENT_RUNNING.set(reactor, LedState::Low);
        ReactorPanel::LED_WARNING_TEMP_AMBIENT.set(reactor, LedState::High);
        ReactorPanel::LED_WARNING_THERMOCOUPLE.set(reactor, LedState::High);

        let power = self.power_box.panel();
        PowerPanel::LED_WARNING_TEMP_AMBIENT.set(power, LedState::High);
        PowerPanel::LED_MAINTENANCE_ACTIVE.set(power, LedState::Low);
        // No faults recorded: the voltage warning idles low.
        PowerPanel::LED_WARNING_VOLTAGE.set(power, LedState::Low);
        PowerPanel::LED_WARNING_WATER.set(power, LedState::High);

        let (boxes_closed, connected) = {
            let shared = self.shared.lock().unwrap();
            (
                self.both_lids_closed(),
                shared.reactor_connected && shared.power_connected,
            )
        };
        PowerPanel::LED_BOXES_CLOSED.set(
            power,
            if boxes_closed { LedState::High } else { LedState::Low },
        );
        self.apply_connected_led(connected);
    }

    fn both_lids_closed(&self) -> bool {
        let state = self.power_box.sensors.snapshot();
        state.powerbox_lid == CaseLidState::Closed && state.reactorbox_lid == CaseLidState::Closed
    }

    // ── Experiment command surface ────────────────────────────

    pub fn start_experiment_on(
        &self,
        lane: LedLane,
        template: ExperimentTemplate,
        uid: u64,
        notes: impl Into<String>,
    ) -> Result<()> {
        let uses_uv = template.uses_uv_led();
        self.supervisor.start_experiment_on(lane, template, uid, notes)?;

        let uv_installed = {
            let mut shared = self.shared.lock().unwrap();
            shared.exp_running[lane.index()] = true;
            shared.uv_lanes[lane.index()] = uses_uv;
            shared.uv_installed = shared.uv_lanes.iter().any(|uv| *uv);
            shared.uv_installed
        };

        let reactor = self.reactor_box.panel();
        ReactorPanel::LED_EXPERIMENT_RUNNING.set(reactor, LedState::High);
        ReactorPanel::LED_UV_INSTALLED.set(
            reactor,
            if uv_installed { LedState::High } else { LedState::Low },
        );
        Ok(())
    }

    pub fn pause_experiment_on(&self, lane: LedLane) {
        self.supervisor.pause_experiment_on(lane);
    }

    pub fn resume_experiment_on(&self, lane: LedLane) {
        self.supervisor.resume_experiment_on(lane);
    }

    pub fn cancel_experiment_on(&self, lane: LedLane) {
        self.supervisor.cancel_experiment_on(lane);
    }

    pub fn sample_was_taken_on(&self, lane: LedLane) {
        self.supervisor.sample_was_taken_on(lane);
    }

    pub fn supervisor(&self) -> &ExperimentSupervisor {
        &self.supervisor
    }

    /// Compose the full state snapshot for the push surface.
    pub fn state_snapshot(&self) -> ControllerState {
        let reactor_box_state = self.reactor_box.sensors.snapshot();
        let power_box_state = self.power_box.sensors.snapshot();
        let shared = self.shared.lock().unwrap();
        ControllerState {
            reactor_box_connected: shared.reactor_connected,
            power_box_connected: shared.power_connected,
            sample_lane: shared.sample_lane,
            exp_running: shared.exp_running,
            uv_installed: shared.uv_installed,
            ambient_temp_status: shared.ambient_reactor.status(),
            ir_temp_status: [
                shared.ir[0].status(),
                shared.ir[1].status(),
                shared.ir[2].status(),
            ],
            thermocouple_status: shared.thermocouple.status(),
            reactor_box_state,
            power_box_state,
        }
    }

    // ── Host surface (called by runners) ──────────────────────

    fn alert_take_sample(&self, lane: LedLane) {
        self.shared.lock().unwrap().sample_lane[lane.index()] = true;
        ReactorPanel::LED_STATE_LANE[lane.index()].set(self.reactor_box.panel(), LedState::High);
        info!("{lane}: please take a sample");
    }

    fn end_experiment(&self, lane: LedLane, record: Experiment) {
        let (any_running, uv_installed) = {
            let mut shared = self.shared.lock().unwrap();
            shared.exp_running[lane.index()] = false;
            shared.sample_lane[lane.index()] = false;
            shared.uv_lanes[lane.index()] = false;
            shared.uv_installed = shared.uv_lanes.iter().any(|uv| *uv);
            (
                shared.exp_running.iter().any(|r| *r),
                shared.uv_installed,
            )
        };

        let reactor = self.reactor_box.panel();
        ReactorPanel::LED_STATE_LANE[lane.index()].set(reactor, LedState::Low);
        ReactorPanel::LED_EXPERIMENT_RUNNING.set(
            reactor,
            if any_running { LedState::High } else { LedState::Low },
        );
        ReactorPanel::LED_UV_INSTALLED.set(
            reactor,
            if uv_installed { LedState::High } else { LedState::Low },
        );

        (self.record_sink)(lane, record);
    }

    fn measure(&self) -> MeasuredData {
        let reactor = self.reactor_box.sensors.snapshot();
        let power = self.power_box.sensors.snapshot();

        let mut voltage_lane = [0.0; 3];
        let mut current_lane = [0.0; 3];
        let mut ir_temp_lane = [0.0; 3];
        for lane in LedLane::ALL {
            let i = lane.index();
            voltage_lane[i] = f64::from(
                power.lane_voltage[i][0].milli_volts + power.lane_voltage[i][1].milli_volts,
            ) / 2.0;
            current_lane[i] = f64::from(
                power.lane_current[i][0].milli_amps + power.lane_current[i][1].milli_amps,
            ) / 2.0;
            ir_temp_lane[i] = reactor.lane_ir_temp[i].celsius();
        }

        MeasuredData {
            temperature_thermocouple: reactor.thermocouple_temp.celsius(),
            ambient_temp_power_box: power.ambient_temperature.celsius(),
            ambient_temp_reactor_box: reactor.ambient_temperature.celsius(),
            voltage_lane,
            current_lane,
            ir_temp_lane,
            uv_index: reactor.uv_index.uvi(),
            ambient_light: reactor.ambient_light.lux(),
        }
    }

    // ── Connection handling ───────────────────────────────────

    fn on_connection_change(&self, side: BoxSide, connected: bool) {
        let both = {
            let mut shared = self.shared.lock().unwrap();
            match side {
                BoxSide::Reactor => shared.reactor_connected = connected,
                BoxSide::Power => shared.power_connected = connected,
            }
            shared.reactor_connected && shared.power_connected
        };
        if connected {
            info!("{side:?} box connected");
        } else {
            warn!("{side:?} box disconnected");
        }
        self.apply_connected_led(both);
    }

    fn apply_connected_led(&self, both_connected: bool) {
        // Deviates from the front-panel legend: blink-fast doubles as the
        // liveness indicator while both boxes are up, solid-off means a
        // link is down.
        PowerPanel::LED_CONNECTED.set(
            self.power_box.panel(),
            if both_connected { LedState::BlinkFast } else { LedState::Low },
        );
    }

    // ── Lane fault fan-out ────────────────────────────────────

    /// Log the event on the lane, latch the record's error flag, and
    /// cancel the lane's experiment.  Safe on idle lanes.
    fn fault_lane(&self, lane: LedLane, event: &str) {
        self.supervisor.add_event_on(lane, event);
        self.supervisor.register_error_on(lane);
        self.supervisor.cancel_experiment_on(lane);
    }

    fn fault_all_lanes(&self, event: &str) {
        for lane in LedLane::ALL {
            self.fault_lane(lane, event);
        }
    }

    fn event_all_lanes(&self, event: &str) {
        for lane in LedLane::ALL {
            self.supervisor.add_event_on(lane, event);
        }
    }

    // ── Reactor-box observer ──────────────────────────────────

    fn on_reactor_field(
        &self,
        old: &ReactorBoxSensorState,
        _new: &ReactorBoxSensorState,
        field: &ReactorBoxField,
    ) {
        match *field {
            ReactorBoxField::ThermocoupleTemp(temp) => self.handle_thermocouple(temp),
            ReactorBoxField::AmbientTemperature(temp) => {
                let action = {
                    let mut shared = self.shared.lock().unwrap();
                    shared.ambient_reactor.advance(temp)
                };
                self.handle_ambient(
                    action,
                    temp,
                    ReactorPanel::LED_WARNING_TEMP_AMBIENT,
                    true,
                );
            }
            ReactorBoxField::LaneIrTemp(lane, temp) => self.handle_ir(lane, temp),
            ReactorBoxField::UvIndex(uv) => {
                let warning = uv.uvi() > self.config.uv_warn_uvi;
                ReactorPanel::LED_UV_WARNING.set(
                    self.reactor_box.panel(),
                    if warning { LedState::Low } else { LedState::High },
                );
            }
            ReactorBoxField::LaneSampleTaken(lane, taken) => {
                let rising = taken && !old.lane_sample_taken[lane.index()];
                if rising {
                    self.shared.lock().unwrap().sample_lane[lane.index()] = false;
                    ReactorPanel::LED_STATE_LANE[lane.index()]
                        .set(self.reactor_box.panel(), LedState::Low);
                    self.supervisor.sample_was_taken_on(lane);
                }
            }
            ReactorBoxField::MaintenanceMode(active) => {
                PowerPanel::LED_MAINTENANCE_ACTIVE.set(
                    self.power_box.panel(),
                    if active { LedState::High } else { LedState::Low },
                );
            }
            ReactorBoxField::AmbientLight(_) | ReactorBoxField::CableControl(_) => {
                // State-only fields: mirrored by the push surface, no policy.
            }
        }
    }

    fn handle_thermocouple(&self, temp: Temperature) {
        let action = {
            let mut shared = self.shared.lock().unwrap();
            shared.thermocouple.advance(temp)
        };
        // TODO: confirm with the hardware owner that the warning LED really
        // should stay high while the threshold is exceeded; the panel
        // legend suggests low.
        let led = match action {
            ThresholdAction::Recovered => LedState::BlinkSlow,
            _ => LedState::High,
        };
        ReactorPanel::LED_WARNING_THERMOCOUPLE.set(self.reactor_box.panel(), led);

        match action {
            ThresholdAction::Warned => {
                warn!("thermocouple temperature exceeded threshold: {temp}");
                for lane in LedLane::ALL {
                    if self.config.thermocouple_affected_lanes[lane.index()] {
                        self.fault_lane(lane, EVENT_THERMOCOUPLE_WARN);
                    }
                }
            }
            ThresholdAction::Recovered => {
                info!("thermocouple temperature back to normal: {temp}");
                for lane in LedLane::ALL {
                    if self.config.thermocouple_affected_lanes[lane.index()] {
                        self.supervisor.add_event_on(lane, EVENT_THERMOCOUPLE_BACK);
                    }
                }
            }
            ThresholdAction::Hold | ThresholdAction::Aborted => {}
        }
    }

    fn handle_ambient(
        &self,
        action: ThresholdAction,
        temp: Temperature,
        led: LedChannel,
        reactor_side: bool,
    ) {
        let panel = if reactor_side {
            self.reactor_box.panel()
        } else {
            self.power_box.panel()
        };
        match action {
            ThresholdAction::Hold => {}
            ThresholdAction::Warned => {
                warn!("ambient temperature exceeded threshold: {temp}");
                led.set(panel, LedState::Low);
                self.event_all_lanes(EVENT_AMBIENT_WARN);
            }
            ThresholdAction::Recovered => {
                info!("ambient temperature back to normal: {temp}");
                led.set(panel, LedState::BlinkSlow);
                self.event_all_lanes(EVENT_AMBIENT_BACK);
            }
            ThresholdAction::Aborted => {
                error!("ambient temperature exceeded critical threshold: {temp}");
                led.set(panel, LedState::Low);
                self.fault_all_lanes(EVENT_AMBIENT_ABORT);
            }
        }
    }

    fn handle_ir(&self, lane: LedLane, temp: Temperature) {
        let action = {
            let mut shared = self.shared.lock().unwrap();
            shared.ir[lane.index()].advance(temp)
        };
        let led = ReactorPanel::LED_WARNING_TEMP_LANE[lane.index()];
        let panel = self.reactor_box.panel();
        match action {
            ThresholdAction::Hold => {}
            ThresholdAction::Warned => {
                warn!("{lane}: IR temperature exceeded threshold: {temp}");
                led.set(panel, LedState::BlinkFast);
                self.supervisor.add_event_on(lane, EVENT_IR_WARN);
            }
            ThresholdAction::Recovered => {
                info!("{lane}: IR temperature back to normal: {temp}");
                led.set(panel, LedState::BlinkSlow);
                self.supervisor.add_event_on(lane, EVENT_IR_BACK);
            }
            ThresholdAction::Aborted => {
                error!("{lane}: IR temperature exceeded critical threshold: {temp}");
                led.set(panel, LedState::Low);
                self.fault_lane(lane, EVENT_IR_ABORT);
            }
        }
    }

    // ── Power-box observer ────────────────────────────────────

    fn on_power_field(
        &self,
        old: &PowerBoxSensorState,
        new: &PowerBoxSensorState,
        field: &PowerBoxField,
    ) {
        match *field {
            PowerBoxField::AmbientTemperature(temp) => {
                let action = {
                    let mut shared = self.shared.lock().unwrap();
                    shared.ambient_power.advance(temp)
                };
                self.handle_ambient(
                    action,
                    temp,
                    PowerPanel::LED_WARNING_TEMP_AMBIENT,
                    false,
                );
            }
            PowerBoxField::LaneVoltage(position, voltage) => {
                self.handle_lane_voltage(position, voltage);
            }
            PowerBoxField::PowerBoxLid(_) | PowerBoxField::ReactorBoxLid(_) => {
                let closed = new.powerbox_lid == CaseLidState::Closed
                    && new.reactorbox_lid == CaseLidState::Closed;
                let was_closed = old.powerbox_lid == CaseLidState::Closed
                    && old.reactorbox_lid == CaseLidState::Closed;
                PowerPanel::LED_BOXES_CLOSED.set(
                    self.power_box.panel(),
                    if closed { LedState::High } else { LedState::Low },
                );
                if closed != was_closed {
                    self.supervisor.set_lids_open(!closed);
                }
            }
            PowerBoxField::WaterDetected(detected) => {
                let rising = detected && !old.water_detected;
                if rising {
                    error!("water leakage detected");
                    PowerPanel::LED_WARNING_WATER
                        .set(self.power_box.panel(), LedState::BlinkFast);
                    self.fault_all_lanes(EVENT_WATER_LEAK);
                } else if !detected && old.water_detected {
                    info!("water sensor dry again");
                    PowerPanel::LED_WARNING_WATER.set(self.power_box.panel(), LedState::High);
                }
            }
            PowerBoxField::VoltageTotal(_)
            | PowerBoxField::CurrentTotal(_)
            | PowerBoxField::LaneCurrent(..)
            | PowerBoxField::LedInstalled(..)
            | PowerBoxField::CableControl(_) => {
                // State-only fields: the current loop lives in the power
                // box, the rest is mirrored by the push surface.
            }
        }
    }

    /// Zero volts on an energised LED means a broken drive chain.
    fn handle_lane_voltage(&self, position: LedPosition, voltage: Voltage) {
        let lane = position.lane;
        let side = position.side;
        let active = self.power_box.is_led_active(position);

        let (newly_faulted, count) = {
            let mut shared = self.shared.lock().unwrap();
            let slot = &mut shared.voltage_faults[lane.index()][side.index()];
            let newly = if voltage.is_zero() && active {
                let fresh = !*slot;
                *slot = true;
                fresh
            } else {
                if !voltage.is_zero() {
                    *slot = false;
                }
                false
            };
            (newly, shared.fault_count())
        };

        let led_state = match count {
            0 => LedState::Low,
            1 => LedState::BlinkSlow,
            _ => LedState::BlinkFast,
        };
        PowerPanel::LED_WARNING_VOLTAGE.set(self.power_box.panel(), led_state);

        if newly_faulted {
            error!("{position}: zero voltage on an energised LED");
            self.fault_lane(lane, EVENT_VOLTAGE_ERROR);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host handle
// ───────────────────────────────────────────────────────────────

/// Non-owning controller handle handed to the runners.
struct ControllerHandle(Weak<Controller>);

impl ExperimentHost for ControllerHandle {
    fn set_led_max_current(&self, position: LedPosition, current: Current) -> Result<()> {
        match self.0.upgrade() {
            Some(controller) => controller.power_box.set_led_max_current(position, current),
            None => Ok(()),
        }
    }

    fn activate_led(&self, position: LedPosition, intensity: f64) -> Result<()> {
        match self.0.upgrade() {
            Some(controller) => controller.power_box.activate_led(position, intensity),
            None => Ok(()),
        }
    }

    fn deactivate_led(&self, position: LedPosition) {
        if let Some(controller) = self.0.upgrade() {
            controller.power_box.deactivate_led(position);
        }
    }

    fn alert_take_sample(&self, lane: LedLane) {
        if let Some(controller) = self.0.upgrade() {
            controller.alert_take_sample(lane);
        }
    }

    fn end_experiment(&self, lane: LedLane, record: Experiment) {
        if let Some(controller) = self.0.upgrade() {
            controller.end_experiment(lane, record);
        } else {
            debug!("record for {lane} dropped, controller already gone");
        }
    }

    fn measure(&self) -> MeasuredData {
        self.0
            .upgrade()
            .map_or_else(MeasuredData::default, |controller| controller.measure())
    }
}
