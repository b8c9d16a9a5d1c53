//! Experiment supervisor: the three lane runners plus the lid
//! coordination that pauses and resumes them as the enclosures open and
//! close.
//!
//! Auto-pause bookkeeping: when either lid opens, exactly the
//! running-and-not-paused lanes are paused and remembered.  While open,
//! operator pause/resume commands edit the remembered set instead of
//! touching the runners, and sample confirmations are buffered.  When both
//! lids are closed again the remembered lanes resume, then the buffered
//! samples are delivered.

use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::configuration::ExperimentTemplate;
use crate::error::Result;
use crate::measurements::LedLane;

use super::runner::ExperimentRunner;
use super::ExperimentHost;

struct LidCoordination {
    open: bool,
    /// Lanes to resume once both lids are closed.
    auto_paused: [bool; 3],
    /// Sample confirmations received while open, in arrival order.
    buffered_samples: Vec<LedLane>,
}

pub struct ExperimentSupervisor {
    host: Arc<dyn ExperimentHost>,
    lanes: [Mutex<ExperimentRunner>; 3],
    lids: Mutex<LidCoordination>,
}

impl ExperimentSupervisor {
    pub fn new(host: Arc<dyn ExperimentHost>) -> Self {
        let runner = |lane| Mutex::new(ExperimentRunner::new(lane, Arc::clone(&host)));
        Self {
            lanes: [
                runner(LedLane::Lane1),
                runner(LedLane::Lane2),
                runner(LedLane::Lane3),
            ],
            host,
            lids: Mutex::new(LidCoordination {
                open: false,
                auto_paused: [false; 3],
                buffered_samples: Vec::new(),
            }),
        }
    }

    // ── Commands ──────────────────────────────────────────────

    /// Replace the lane's runner with a fresh one and start it, then
    /// announce the new UID to the other running lanes.
    pub fn start_experiment_on(
        &self,
        lane: LedLane,
        template: ExperimentTemplate,
        uid: u64,
        notes: impl Into<String>,
    ) -> Result<()> {
        {
            let mut runner = self.lanes[lane.index()].lock().unwrap();
            if runner.is_running() {
                return Err(crate::error::ExperimentError::AlreadyRunning(lane).into());
            }
            *runner = ExperimentRunner::new(lane, Arc::clone(&self.host));
            runner.start_experiment(template, uid, notes)?;
        }
        for other in LedLane::ALL {
            if other != lane {
                let runner = self.lanes[other.index()].lock().unwrap();
                if runner.is_running() {
                    runner.register_neighbour_experiment(uid);
                }
            }
        }
        Ok(())
    }

    /// Operator pause.  While a lid is open this only removes the lane from
    /// the auto-resume set.
    pub fn pause_experiment_on(&self, lane: LedLane) {
        {
            let mut lids = self.lids.lock().unwrap();
            if lids.open {
                lids.auto_paused[lane.index()] = false;
                info!("{lane}: pause while open, lane will stay paused on lid close");
                return;
            }
        }
        self.lanes[lane.index()].lock().unwrap().pause_experiment();
    }

    /// Operator resume.  While a lid is open this only adds the lane to the
    /// auto-resume set.
    pub fn resume_experiment_on(&self, lane: LedLane) {
        {
            let mut lids = self.lids.lock().unwrap();
            if lids.open {
                lids.auto_paused[lane.index()] = true;
                info!("{lane}: resume while open, lane will resume on lid close");
                return;
            }
        }
        self.lanes[lane.index()].lock().unwrap().resume_experiment();
    }

    pub fn cancel_experiment_on(&self, lane: LedLane) {
        self.lanes[lane.index()].lock().unwrap().cancel();
    }

    /// The operator confirmed a sample.  Buffered while a lid is open.
    pub fn sample_was_taken_on(&self, lane: LedLane) {
        {
            let mut lids = self.lids.lock().unwrap();
            if lids.open {
                lids.buffered_samples.push(lane);
                return;
            }
        }
        self.lanes[lane.index()].lock().unwrap().sample_was_taken();
    }

    pub fn add_event_on(&self, lane: LedLane, event: &str) {
        self.lanes[lane.index()].lock().unwrap().add_event(event);
    }

    pub fn register_error_on(&self, lane: LedLane) {
        self.lanes[lane.index()].lock().unwrap().register_error();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running_on(&self, lane: LedLane) -> bool {
        self.lanes[lane.index()].lock().unwrap().is_running()
    }

    pub fn running_lanes(&self) -> [bool; 3] {
        let mut lanes = [false; 3];
        for lane in LedLane::ALL {
            lanes[lane.index()] = self.is_running_on(lane);
        }
        lanes
    }

    /// True while any running lane drives a UV emitter.
    pub fn uv_led_active(&self) -> bool {
        LedLane::ALL
            .into_iter()
            .any(|lane| self.lanes[lane.index()].lock().unwrap().uses_uv_led())
    }

    // ── Lid coordination ──────────────────────────────────────

    /// Driven by the controller on every lid transition: `open` is true
    /// while *either* enclosure is open.
    pub fn set_lids_open(&self, open: bool) {
        let buffered = {
            let mut lids = self.lids.lock().unwrap();
            if lids.open == open {
                return;
            }
            lids.open = open;

            if open {
                for lane in LedLane::ALL {
                    let runner = self.lanes[lane.index()].lock().unwrap();
                    if runner.is_running() && !runner.is_paused() {
                        warn!("{lane}: auto-pausing, an enclosure lid is open");
                        runner.pause_experiment();
                        lids.auto_paused[lane.index()] = true;
                    }
                }
                return;
            }

            // Both lids closed again: resume the remembered lanes.
            for lane in LedLane::ALL {
                if std::mem::take(&mut lids.auto_paused[lane.index()]) {
                    info!("{lane}: resuming after lid close");
                    self.lanes[lane.index()].lock().unwrap().resume_experiment();
                }
            }
            std::mem::take(&mut lids.buffered_samples)
        };

        for lane in buffered {
            self.lanes[lane.index()].lock().unwrap().sample_was_taken();
        }
    }
}
