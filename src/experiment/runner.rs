//! Per-lane experiment runner.
//!
//! A runner is a small state machine: `Idle` until started, then
//! `Running { paused, needs_sample }` while it coordinates the exposure
//! timers, sample prompts and measurement sampling of one lane.
//! Finalization transfers the collected logs into an [`Experiment`] record,
//! hands it to the host, and resets the runner to idle — at most once per
//! run, cancellation included.
//!
//! Locking discipline: every mutation happens under the runner's own mutex,
//! but all host calls are collected as actions and executed after the lock
//! is released.  Timer expiries arriving after finalization find
//! `running == false` and are no-ops.

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use chrono::Local;
use log::{error, info};

use crate::configuration::{EventPair, Experiment, ExperimentTemplate, MeasuredDataAtTimePoint};
use crate::error::{ExperimentError, Result};
use crate::measurements::{Current, LedLane, LedPosition, LedSide};

use super::timer::{LaneTimer, TimerEvent, TimerSlot};
use super::{ExperimentHost, MeasuredData};

pub const EVENT_STARTED: &str = "experiment was started";
pub const EVENT_PAUSED: &str = "experiment was paused";
pub const EVENT_RESUMED: &str = "experiment was resumed";
pub const EVENT_SAMPLE_TAKEN: &str = "sample was taken";

/// Deferred host calls, executed outside the runner lock.
enum Action {
    SetMaxCurrent(LedPosition, Current),
    Activate(LedPosition, f64),
    Deactivate(LedPosition),
    AlertTakeSample(LedLane),
    End(LedLane, Box<Experiment>),
}

struct RunnerInner {
    lane: LedLane,
    running: bool,
    paused: bool,
    needs_sample: bool,
    /// Consumed sample timepoints.
    state_sample: usize,
    /// Exposure not yet finished, `[front, back]`.
    exposing: [bool; 2],

    template: Option<ExperimentTemplate>,
    uid: u64,
    notes: String,
    started_at: Option<Instant>,
    cancelled: bool,
    error: bool,
    finished: bool,

    events: Vec<EventPair>,
    measurements: Vec<MeasuredDataAtTimePoint>,
    neighbours: Vec<u64>,

    timer: Option<LaneTimer>,
}

impl RunnerInner {
    fn elapsed(&self) -> f64 {
        self.started_at.map_or(0.0, |t| t.elapsed().as_secs_f64())
    }

    fn push_event(&mut self, event: &str) {
        self.events.push(EventPair::new(self.elapsed(), event));
    }

    fn template(&self) -> &ExperimentTemplate {
        self.template.as_ref().expect("running without template")
    }

    fn intensity(&self, side: LedSide) -> f64 {
        match side {
            LedSide::Front => self.template().led_front_intensity,
            LedSide::Back => self.template().led_back_intensity,
        }
    }

    /// Deactivate the exposing sides; used by pause and cancel.
    fn deactivate_lit(&self, actions: &mut Vec<Action>) {
        for side in LedSide::ALL {
            if self.exposing[side.index()] {
                actions.push(Action::Deactivate(LedPosition::new(self.lane, side)));
            }
        }
    }

    fn pause_internal(&mut self, actions: &mut Vec<Action>) {
        if let Some(timer) = &self.timer {
            timer.pause();
        }
        self.paused = true;
        self.deactivate_lit(actions);
        self.push_event(EVENT_PAUSED);
    }

    fn resume_internal(&mut self, actions: &mut Vec<Action>) {
        if let Some(timer) = &self.timer {
            timer.resume();
        }
        self.paused = false;
        for side in LedSide::ALL {
            if self.exposing[side.index()] {
                actions.push(Action::Activate(
                    LedPosition::new(self.lane, side),
                    self.intensity(side),
                ));
            }
        }
        self.push_event(EVENT_RESUMED);
    }

    /// Consume the run into its record.  Guarded against double emission.
    fn finalize(&mut self, actions: &mut Vec<Action>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.running = false;
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }

        let template = self.template.take().expect("finalize without template");
        let record = Experiment {
            uid: self.uid,
            name: template.name,
            lab_notebook_entry: std::mem::take(&mut self.notes),
            date: Local::now().format("%Y-%m-%d").to_string(),
            config_file: template.config_file,
            active_lane: self.lane.number(),
            led_front: template.led_front,
            led_front_intensity: template.led_front_intensity,
            led_front_distance_to_vial: template.led_front_distance_to_vial,
            led_front_exposure_time: template.led_front_exposure_time,
            led_back: template.led_back,
            led_back_intensity: template.led_back_intensity,
            led_back_distance_to_vial: template.led_back_distance_to_vial,
            led_back_exposure_time: template.led_back_exposure_time,
            time_points_sample_taking: template.time_points_sample_taking,
            size_sample: template.size_sample,
            parallel_experiments: std::mem::take(&mut self.neighbours),
            position_thermocouple: template.position_thermocouple,
            error_occured: self.error,
            experiment_cancelled: self.cancelled,
            event_log: std::mem::take(&mut self.events),
            measured_data: std::mem::take(&mut self.measurements),
        };
        info!("{}: experiment {} finished", self.lane, self.uid);
        actions.push(Action::End(self.lane, Box::new(record)));
    }

    fn all_samples_consumed(&self) -> bool {
        self.state_sample == self.template().time_points_sample_taking.len()
    }

    fn no_led_exposing(&self) -> bool {
        !self.exposing[0] && !self.exposing[1]
    }
}

/// One lane's experiment state machine.
pub struct ExperimentRunner {
    lane: LedLane,
    host: Arc<dyn ExperimentHost>,
    inner: Arc<Mutex<RunnerInner>>,
}

impl ExperimentRunner {
    pub fn new(lane: LedLane, host: Arc<dyn ExperimentHost>) -> Self {
        Self {
            lane,
            host,
            inner: Arc::new(Mutex::new(RunnerInner {
                lane,
                running: false,
                paused: false,
                needs_sample: false,
                state_sample: 0,
                exposing: [false, false],
                template: None,
                uid: 0,
                notes: String::new(),
                started_at: None,
                cancelled: false,
                error: false,
                finished: false,
                events: Vec::new(),
                measurements: Vec::new(),
                neighbours: Vec::new(),
                timer: None,
            })),
        }
    }

    pub fn lane(&self) -> LedLane {
        self.lane
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn is_paused(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.running && inner.paused
    }

    pub fn needs_sample(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.running && inner.needs_sample
    }

    /// True while the running template drives a UV emitter.
    pub fn uses_uv_led(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.running && inner.template.as_ref().is_some_and(ExperimentTemplate::uses_uv_led)
    }

    // ── Lifecycle commands ────────────────────────────────────

    /// Start a run from `template`.  Requires the runner to be idle.
    pub fn start_experiment(
        &self,
        template: ExperimentTemplate,
        uid: u64,
        notes: impl Into<String>,
    ) -> Result<()> {
        let front_used = template.led_front.is_some();
        let back_used = template.led_back.is_some();
        if !front_used && !back_used {
            return Err(ExperimentError::NoLedConfigured.into());
        }

        let mut actions = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.running {
                return Err(ExperimentError::AlreadyRunning(self.lane).into());
            }

            inner.running = true;
            inner.paused = false;
            inner.needs_sample = false;
            inner.state_sample = 0;
            inner.exposing = [front_used, back_used];
            inner.uid = uid;
            inner.notes = notes.into();
            inner.cancelled = false;
            inner.error = false;
            inner.finished = false;
            inner.events.clear();
            inner.measurements.clear();
            inner.neighbours.clear();
            inner.started_at = Some(Instant::now());

            for side in LedSide::ALL {
                let (led, intensity) = match side {
                    LedSide::Front => (&template.led_front, template.led_front_intensity),
                    LedSide::Back => (&template.led_back, template.led_back_intensity),
                };
                if let Some(led) = led {
                    let position = LedPosition::new(self.lane, side);
                    actions.push(Action::SetMaxCurrent(
                        position,
                        Current::from_milli_amps(led.max_current),
                    ));
                    actions.push(Action::Activate(position, intensity));
                }
            }

            let timer = self.spawn_timer(Duration::from_secs_f64(
                template.measurement_interval.max(0.001),
            ));
            if front_used {
                timer.arm(
                    TimerSlot::LedFront,
                    Duration::from_secs_f64(template.led_front_exposure_time),
                );
            }
            if back_used {
                timer.arm(
                    TimerSlot::LedBack,
                    Duration::from_secs_f64(template.led_back_exposure_time),
                );
            }
            if let Some(first) = template.time_points_sample_taking.first() {
                timer.arm(TimerSlot::Sample, Duration::from_secs_f64(*first));
            }
            inner.timer = Some(timer);

            inner.events.push(EventPair::new(0.0, EVENT_STARTED));
            inner.template = Some(template);
            info!("{}: experiment {} started", self.lane, uid);
        }
        self.execute(actions);
        Ok(())
    }

    /// Operator pause.  No-op unless running and not paused.
    pub fn pause_experiment(&self) {
        let mut actions = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.running || inner.paused {
                return;
            }
            inner.pause_internal(&mut actions);
        }
        self.execute(actions);
    }

    /// Operator resume.  No-op unless running, paused, and not waiting for
    /// a sample.
    pub fn resume_experiment(&self) {
        let mut actions = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.running || !inner.paused || inner.needs_sample {
                return;
            }
            inner.resume_internal(&mut actions);
        }
        self.execute(actions);
    }

    /// The operator confirmed the sample prompt.  No-op unless the runner
    /// is waiting for one.
    pub fn sample_was_taken(&self) {
        let mut actions = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.running || !inner.needs_sample {
                return;
            }
            inner.needs_sample = false;
            inner.push_event(EVENT_SAMPLE_TAKEN);

            if inner.all_samples_consumed() && inner.no_led_exposing() {
                inner.finalize(&mut actions);
            } else {
                if !inner.all_samples_consumed() {
                    let next = inner.template().time_points_sample_taking[inner.state_sample];
                    if let Some(timer) = &inner.timer {
                        timer.arm(TimerSlot::Sample, Duration::from_secs_f64(next));
                    }
                }
                inner.resume_internal(&mut actions);
            }
        }
        self.execute(actions);
    }

    /// Terminal: deactivate both LEDs and finalize with the cancelled flag.
    pub fn cancel(&self) {
        let mut actions = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.running {
                return;
            }
            inner.cancelled = true;
            // While paused the LEDs are already dark.
            if !inner.paused {
                inner.deactivate_lit(&mut actions);
            }
            inner.exposing = [false, false];
            inner.finalize(&mut actions);
        }
        self.execute(actions);
    }

    /// Append a lane-scoped event (safety engine and operator notes).
    pub fn add_event(&self, event: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.running {
            inner.push_event(event);
        }
    }

    /// Latch the error flag into the eventual record.
    pub fn register_error(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.running {
            inner.error = true;
        }
    }

    /// Record an experiment started on another lane while this one runs.
    pub fn register_neighbour_experiment(&self, uid: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.running {
            inner.neighbours.push(uid);
        }
    }

    // ── Timer expiries ────────────────────────────────────────

    fn spawn_timer(&self, measure_interval: Duration) -> LaneTimer {
        let weak: Weak<Mutex<RunnerInner>> = Arc::downgrade(&self.inner);
        let host = Arc::clone(&self.host);
        LaneTimer::start(measure_interval, move |event| {
            let Some(inner) = weak.upgrade() else { return };
            match event {
                TimerEvent::Expired(TimerSlot::Sample) => {
                    Self::on_sample_due(&inner, &host);
                }
                TimerEvent::Expired(TimerSlot::LedFront) => {
                    Self::on_led_done(&inner, &host, LedSide::Front);
                }
                TimerEvent::Expired(TimerSlot::LedBack) => {
                    Self::on_led_done(&inner, &host, LedSide::Back);
                }
                TimerEvent::Measure => {
                    Self::on_measure(&inner, &host);
                }
            }
        })
    }

    fn on_sample_due(inner: &Mutex<RunnerInner>, host: &Arc<dyn ExperimentHost>) {
        let mut actions = Vec::new();
        let lane;
        {
            let mut inner = inner.lock().unwrap();
            if !inner.running {
                return;
            }
            lane = inner.lane;
            inner.needs_sample = true;
            inner.state_sample += 1;
            inner.pause_internal(&mut actions);
            actions.push(Action::AlertTakeSample(lane));
        }
        Self::run_actions(host, actions);
        info!("{lane}: sample prompt raised");
    }

    fn on_led_done(inner: &Mutex<RunnerInner>, host: &Arc<dyn ExperimentHost>, side: LedSide) {
        let mut actions = Vec::new();
        {
            let mut inner = inner.lock().unwrap();
            if !inner.running || !inner.exposing[side.index()] {
                return;
            }
            inner.exposing[side.index()] = false;
            actions.push(Action::Deactivate(LedPosition::new(inner.lane, side)));
            if inner.no_led_exposing() && inner.all_samples_consumed() {
                inner.finalize(&mut actions);
            }
        }
        Self::run_actions(host, actions);
    }

    fn on_measure(inner: &Mutex<RunnerInner>, host: &Arc<dyn ExperimentHost>) {
        // Snapshot outside the runner lock; the host reads its own state.
        let data = host.measure();
        let mut inner = inner.lock().unwrap();
        if !inner.running || inner.paused {
            return;
        }
        let timepoint = inner.elapsed();
        inner.measurements.push(measured_at(timepoint, &data));
    }

    // ── Action execution ──────────────────────────────────────

    fn execute(&self, actions: Vec<Action>) {
        Self::run_actions(&self.host, actions);
    }

    fn run_actions(host: &Arc<dyn ExperimentHost>, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::SetMaxCurrent(position, current) => {
                    if let Err(e) = host.set_led_max_current(position, current) {
                        error!("setting max current for {position} failed: {e}");
                    }
                }
                Action::Activate(position, intensity) => {
                    if let Err(e) = host.activate_led(position, intensity) {
                        error!("activating {position} failed: {e}");
                    }
                }
                Action::Deactivate(position) => host.deactivate_led(position),
                Action::AlertTakeSample(lane) => host.alert_take_sample(lane),
                Action::End(lane, record) => host.end_experiment(lane, *record),
            }
        }
    }
}

fn measured_at(timepoint: f64, data: &MeasuredData) -> MeasuredDataAtTimePoint {
    MeasuredDataAtTimePoint {
        timepoint,
        temperature_thermocouple: data.temperature_thermocouple,
        ambient_temp_power_box: data.ambient_temp_power_box,
        ambient_temp_reactor_box: data.ambient_temp_reactor_box,
        voltage_lane1: data.voltage_lane[0],
        current_lane1: data.current_lane[0],
        ir_temp_lane1: data.ir_temp_lane[0],
        voltage_lane2: data.voltage_lane[1],
        current_lane2: data.current_lane[1],
        ir_temp_lane2: data.ir_temp_lane[1],
        voltage_lane3: data.voltage_lane[2],
        current_lane3: data.current_lane[2],
        ir_temp_lane3: data.ir_temp_lane[2],
        uv_index: data.uv_index,
        ambient_light: data.ambient_light,
    }
}
