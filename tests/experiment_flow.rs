//! Runner and supervisor scenarios against a recording mock host.
//!
//! These run the real timers, so every scenario takes the wall-clock time
//! of the experiment it describes.  Timing assertions allow +-0.15 s
//! around the commanded schedule.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use photoreactor::configuration::{
    Experiment, ExperimentTemplate, HardwareConfig, Led,
};
use photoreactor::experiment::supervisor::ExperimentSupervisor;
use photoreactor::experiment::{ExperimentHost, MeasuredData};
use photoreactor::measurements::{Current, LedLane, LedPosition};

const TOLERANCE: f64 = 0.15;

// ── Recording host ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum HostEvent {
    Activate,
    Deactivate,
    TakeSample,
    Done,
}

#[derive(Default)]
struct HostLog {
    entries: Vec<(f64, LedLane, HostEvent)>,
    records: HashMap<usize, Experiment>,
    led_on: HashMap<LedPosition, bool>,
}

struct MockHost {
    started: Instant,
    log: Mutex<HostLog>,
    supervisor: Mutex<Option<Weak<ExperimentSupervisor>>>,
    /// Auto-confirm sample prompts the way an instant operator would.
    auto_confirm_samples: bool,
}

impl MockHost {
    fn new(auto_confirm_samples: bool) -> Self {
        Self {
            started: Instant::now(),
            log: Mutex::new(HostLog::default()),
            supervisor: Mutex::new(None),
            auto_confirm_samples,
        }
    }

    fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn bind(&self, supervisor: &Arc<ExperimentSupervisor>) {
        *self.supervisor.lock().unwrap() = Some(Arc::downgrade(supervisor));
    }

    fn events_of(&self, lane: LedLane, kind: &HostEvent) -> Vec<f64> {
        self.log
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|(_, l, e)| *l == lane && e == kind)
            .map(|(t, _, _)| *t)
            .collect()
    }

    fn record_of(&self, lane: LedLane) -> Option<Experiment> {
        self.log.lock().unwrap().records.get(&lane.index()).cloned()
    }

    fn is_done(&self, lane: LedLane) -> bool {
        self.log.lock().unwrap().records.contains_key(&lane.index())
    }
}

impl ExperimentHost for MockHost {
    fn set_led_max_current(&self, _position: LedPosition, _current: Current) -> photoreactor::Result<()> {
        Ok(())
    }

    fn activate_led(&self, position: LedPosition, _intensity: f64) -> photoreactor::Result<()> {
        let t = self.elapsed();
        let mut log = self.log.lock().unwrap();
        assert!(
            !log.led_on.get(&position).copied().unwrap_or(false),
            "double activation of {position}"
        );
        log.led_on.insert(position, true);
        log.entries.push((t, position.lane, HostEvent::Activate));
        Ok(())
    }

    fn deactivate_led(&self, position: LedPosition) {
        let t = self.elapsed();
        let mut log = self.log.lock().unwrap();
        assert!(
            log.led_on.get(&position).copied().unwrap_or(false),
            "deactivating inactive {position}"
        );
        log.led_on.insert(position, false);
        log.entries.push((t, position.lane, HostEvent::Deactivate));
    }

    fn alert_take_sample(&self, lane: LedLane) {
        let t = self.elapsed();
        self.log.lock().unwrap().entries.push((t, lane, HostEvent::TakeSample));
        if self.auto_confirm_samples {
            let supervisor = self.supervisor.lock().unwrap().clone();
            if let Some(supervisor) = supervisor.and_then(|weak| weak.upgrade()) {
                supervisor.sample_was_taken_on(lane);
            }
        }
    }

    fn end_experiment(&self, lane: LedLane, record: Experiment) {
        let t = self.elapsed();
        let mut log = self.log.lock().unwrap();
        assert!(
            !log.records.contains_key(&lane.index()),
            "{lane} finalized twice"
        );
        log.records.insert(lane.index(), record);
        log.entries.push((t, lane, HostEvent::Done));
    }

    fn measure(&self) -> MeasuredData {
        MeasuredData {
            temperature_thermocouple: 21.5,
            ..MeasuredData::default()
        }
    }
}

// ── Template builder ──────────────────────────────────────────

fn led(uid: u64) -> Led {
    Led {
        uid,
        name: format!("led-{uid}"),
        fwhm: 12,
        max_of_emission: 455,
        min_wavelength: 440,
        max_wavelength: 470,
        color: "royal blue".into(),
        max_current: 700,
        manufacturer_id: 3,
        order_id: 77,
        date_soldering: "2024-06-01".into(),
        soldered_by: "mv".into(),
        operating_time: 0.0,
        defect: false,
        emission_spectrum: Vec::new(),
        emission_spectrum_recorded_on: String::new(),
    }
}

fn hardware_config() -> HardwareConfig {
    HardwareConfig {
        uid: 1,
        name: "bench rig".into(),
        tinkerforge_bricklets: Vec::new(),
        software_version: "0.2".into(),
        date: "2025-01-10".into(),
        default_distance_led_vial: 1.0,
        default_position_thermocouple: "stage".into(),
        default_pwm_channels: Vec::new(),
        default_temperature_threshold: 20.0,
        default_uv_threshold: 1.0,
        default_sensor_query_interval: 1.0,
        default_reaction_vessel_volume: 1.0,
    }
}

fn template(
    duration_front: f64,
    duration_back: f64,
    samples: &[f64],
    measurement_interval: f64,
) -> ExperimentTemplate {
    ExperimentTemplate {
        uid: 1,
        name: "flow test".into(),
        date: "2025-01-10".into(),
        config_file: hardware_config(),
        active_lane: 1,
        led_front: Some(led(10)),
        led_front_intensity: 1.0,
        led_front_distance_to_vial: 1.0,
        led_front_exposure_time: duration_front,
        led_back: Some(led(11)),
        led_back_intensity: 1.0,
        led_back_distance_to_vial: 1.0,
        led_back_exposure_time: duration_back,
        time_points_sample_taking: samples.to_vec(),
        size_sample: 1.0,
        measurement_interval,
        position_thermocouple: "stage".into(),
    }
}

fn rig(auto_confirm: bool) -> (Arc<MockHost>, Arc<ExperimentSupervisor>) {
    let host = Arc::new(MockHost::new(auto_confirm));
    let supervisor = Arc::new(ExperimentSupervisor::new(
        Arc::clone(&host) as Arc<dyn ExperimentHost>
    ));
    host.bind(&supervisor);
    (host, supervisor)
}

fn run_to_completion(
    duration_front: f64,
    duration_back: f64,
    samples: &[f64],
) -> Arc<MockHost> {
    let (host, supervisor) = rig(true);
    supervisor
        .start_experiment_on(
            LedLane::Lane1,
            template(duration_front, duration_back, samples, 1.0),
            0,
            "",
        )
        .unwrap();

    let sample_total: f64 = samples.iter().sum();
    let deadline = duration_front.max(duration_back).max(sample_total) + 2.0;
    let poll_until = Instant::now() + Duration::from_secs_f64(deadline);
    while Instant::now() < poll_until && !host.is_done(LedLane::Lane1) {
        thread::sleep(Duration::from_millis(50));
    }
    assert!(host.is_done(LedLane::Lane1), "experiment never finished");
    host
}

fn assert_times(actual: &[f64], expected: &[f64]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "expected firings at {expected:?}, got {actual:?}"
    );
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a - e).abs() < TOLERANCE,
            "expected firing near {e}, got {a} (all: {actual:?})"
        );
    }
}

// ── Scenarios ─────────────────────────────────────────────────

#[test]
fn simple_experiment_two_activations() {
    let host = run_to_completion(5.0, 5.0, &[]);
    let lane = LedLane::Lane1;
    assert_eq!(host.events_of(lane, &HostEvent::Activate).len(), 2);
    assert_eq!(host.events_of(lane, &HostEvent::Deactivate).len(), 2);
    assert!(host.events_of(lane, &HostEvent::TakeSample).is_empty());
    let record = host.record_of(lane).unwrap();
    assert!(!record.experiment_cancelled);
    assert!(!record.error_occured);
}

#[test]
fn experiment_with_samples_toggles_both_sides() {
    let host = run_to_completion(5.0, 5.0, &[1.0, 2.0]);
    let lane = LedLane::Lane1;
    assert_eq!(host.events_of(lane, &HostEvent::TakeSample).len(), 2);
    // Start + resume after each of the two samples, both sides.
    assert_eq!(host.events_of(lane, &HostEvent::Activate).len(), 6);
    assert_eq!(host.events_of(lane, &HostEvent::Deactivate).len(), 6);
    let record = host.record_of(lane).unwrap();
    let samples = record
        .event_log
        .iter()
        .filter(|e| e.event == "sample was taken")
        .count();
    assert_eq!(samples, 2);
}

#[test]
fn sample_prompts_follow_the_cumulative_schedule() {
    let host = run_to_completion(10.0, 10.0, &[1.0, 2.0, 3.0, 2.0]);
    let prompts = host.events_of(LedLane::Lane1, &HostEvent::TakeSample);
    assert_times(&prompts, &[1.0, 3.0, 6.0, 8.0]);
}

#[test]
fn led_exposures_end_independently_and_the_longer_one_finalizes() {
    let host = run_to_completion(1.0, 3.0, &[]);
    let lane = LedLane::Lane1;
    let deactivations = host.events_of(lane, &HostEvent::Deactivate);
    assert_times(&deactivations, &[1.0, 3.0]);
    let done = host.events_of(lane, &HostEvent::Done);
    assert_times(&done, &[3.0]);
}

#[test]
fn samples_past_the_exposures_defer_finalization() {
    let host = run_to_completion(5.0, 6.0, &[1.0, 3.0, 4.0, 10.0]);
    let lane = LedLane::Lane1;
    assert_eq!(host.events_of(lane, &HostEvent::TakeSample).len(), 4);
    // Two sample pauses hit lit LEDs (at 1 and 4), the exposures end on
    // their own (5 and 6), and the last two prompts find everything dark.
    assert_eq!(host.events_of(lane, &HostEvent::Deactivate).len(), 6);
    let done = host.events_of(lane, &HostEvent::Done);
    assert_times(&done, &[18.0]);
}

#[test]
fn measurement_log_follows_the_interval() {
    let host = run_to_completion(6.0, 6.0, &[]);
    let record = host.record_of(LedLane::Lane1).unwrap();
    let count = record.measured_data.len();
    assert!((5..=7).contains(&count), "{count} measurements");
    assert!(
        record
            .measured_data
            .iter()
            .all(|m| (m.temperature_thermocouple - 21.5).abs() < 1e-9)
    );
}

#[test]
fn events_and_errors_land_in_the_record() {
    let (host, supervisor) = rig(true);
    supervisor
        .start_experiment_on(LedLane::Lane1, template(5.0, 5.0, &[], 1.0), 0, "notes")
        .unwrap();
    thread::sleep(Duration::from_secs(1));
    supervisor.register_error_on(LedLane::Lane1);
    supervisor.add_event_on(LedLane::Lane1, "/probe/");
    thread::sleep(Duration::from_secs(6));

    let record = host.record_of(LedLane::Lane1).unwrap();
    assert!(record.error_occured);
    assert!(!record.experiment_cancelled);
    assert_eq!(record.lab_notebook_entry, "notes");
    let probe = record
        .event_log
        .iter()
        .find(|e| e.event == "/probe/")
        .expect("custom event missing");
    assert!((probe.timepoint - 1.0).abs() < TOLERANCE);
    assert_eq!(record.event_log.first().unwrap().event, "experiment was started");
}

#[test]
fn pause_resume_preserves_the_whole_schedule() {
    let (host, supervisor) = rig(true);
    supervisor
        .start_experiment_on(
            LedLane::Lane1,
            template(10.0, 10.0, &[2.0, 2.0, 2.0], 1.0),
            0,
            "",
        )
        .unwrap();
    thread::sleep(Duration::from_secs(1));
    supervisor.pause_experiment_on(LedLane::Lane1);
    thread::sleep(Duration::from_secs(1));
    supervisor.resume_experiment_on(LedLane::Lane1);
    thread::sleep(Duration::from_secs(2));
    supervisor.pause_experiment_on(LedLane::Lane1);
    thread::sleep(Duration::from_secs(1));
    supervisor.resume_experiment_on(LedLane::Lane1);
    thread::sleep(Duration::from_secs(9));

    let lane = LedLane::Lane1;
    assert!(host.is_done(lane));
    assert_times(&host.events_of(lane, &HostEvent::TakeSample), &[3.0, 6.0, 8.0]);
    assert_times(
        &host.events_of(lane, &HostEvent::Activate),
        &[0.0, 0.0, 2.0, 2.0, 3.0, 3.0, 5.0, 5.0, 6.0, 6.0, 8.0, 8.0],
    );
    assert_times(
        &host.events_of(lane, &HostEvent::Deactivate),
        &[1.0, 1.0, 3.0, 3.0, 4.0, 4.0, 6.0, 6.0, 8.0, 8.0, 12.0, 12.0],
    );
}

#[test]
fn cancel_finalizes_once_with_leds_dark() {
    let (host, supervisor) = rig(true);
    supervisor
        .start_experiment_on(
            LedLane::Lane1,
            template(10.0, 10.0, &[1.0, 2.0, 5.0], 1.0),
            0,
            "",
        )
        .unwrap();
    thread::sleep(Duration::from_secs(5));
    supervisor.cancel_experiment_on(LedLane::Lane1);
    thread::sleep(Duration::from_secs(1));

    let lane = LedLane::Lane1;
    assert!(host.is_done(lane));
    assert_eq!(host.events_of(lane, &HostEvent::TakeSample).len(), 2);
    let record = host.record_of(lane).unwrap();
    assert!(record.experiment_cancelled);
    {
        let log = host.log.lock().unwrap();
        assert!(log.led_on.values().all(|on| !on), "an LED stayed energised");
    }
    // Wait out the rest of the schedule: no second finalization may arrive
    // (end_experiment asserts on duplicates).
    thread::sleep(Duration::from_secs(6));
    assert_eq!(host.events_of(lane, &HostEvent::Done).len(), 1);
}

#[test]
fn double_pause_and_double_resume_are_no_ops() {
    let (host, supervisor) = rig(true);
    supervisor
        .start_experiment_on(LedLane::Lane1, template(3.0, 3.0, &[], 1.0), 0, "")
        .unwrap();
    thread::sleep(Duration::from_secs(1));
    supervisor.pause_experiment_on(LedLane::Lane1);
    supervisor.pause_experiment_on(LedLane::Lane1);
    thread::sleep(Duration::from_secs(1));
    supervisor.resume_experiment_on(LedLane::Lane1);
    supervisor.resume_experiment_on(LedLane::Lane1);
    thread::sleep(Duration::from_secs(4));
    assert!(host.is_done(LedLane::Lane1));
}

#[test]
fn parallel_experiments_reference_each_other() {
    let (host, supervisor) = rig(true);
    supervisor
        .start_experiment_on(LedLane::Lane1, template(4.0, 4.0, &[], 1.0), 100, "")
        .unwrap();
    thread::sleep(Duration::from_millis(500));
    supervisor
        .start_experiment_on(LedLane::Lane2, template(2.0, 2.0, &[], 1.0), 200, "")
        .unwrap();
    thread::sleep(Duration::from_secs(5));

    let record_1 = host.record_of(LedLane::Lane1).unwrap();
    let record_2 = host.record_of(LedLane::Lane2).unwrap();
    assert_eq!(record_1.parallel_experiments, vec![200]);
    // Lane 2 started second; nothing new was announced to it.
    assert!(record_2.parallel_experiments.is_empty());
    assert_eq!(record_1.active_lane, 1);
    assert_eq!(record_2.active_lane, 2);
}

#[test]
fn starting_a_running_lane_is_rejected() {
    let (_host, supervisor) = rig(true);
    supervisor
        .start_experiment_on(LedLane::Lane1, template(3.0, 3.0, &[], 1.0), 1, "")
        .unwrap();
    let second = supervisor.start_experiment_on(LedLane::Lane1, template(3.0, 3.0, &[], 1.0), 2, "");
    assert!(second.is_err());
    thread::sleep(Duration::from_secs(4));
}
