//! Per-runner deadline timer.
//!
//! One dedicated thread per active runner drives three one-shot slots
//! (next sample, LED front done, LED back done) and the periodic
//! measurement tick from a small deadline table.  The thread sleeps until
//! the earliest armed deadline (capped at one second), fires the due
//! events through the runner callback, and goes back to sleep.
//!
//! `pause` converts every armed deadline into a remaining delta and stops
//! the measurement tick; `resume` re-arms from the deltas.  Wall-clock
//! time since start keeps running across pauses — event-log and
//! measurement timepoints include paused time.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

/// One-shot slots of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSlot {
    Sample,
    LedFront,
    LedBack,
}

impl TimerSlot {
    const ALL: [TimerSlot; 3] = [TimerSlot::Sample, TimerSlot::LedFront, TimerSlot::LedBack];

    const fn index(self) -> usize {
        match self {
            TimerSlot::Sample => 0,
            TimerSlot::LedFront => 1,
            TimerSlot::LedBack => 2,
        }
    }
}

/// What fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Expired(TimerSlot),
    Measure,
}

struct TimerState {
    running: bool,
    paused: bool,
    deadlines: [Option<Instant>; 3],
    remaining: [Option<Duration>; 3],
    measure_interval: Duration,
    next_measure: Instant,
    measure_remaining: Option<Duration>,
}

impl TimerState {
    /// Earliest wake-up needed from `now`, capped at one second.
    fn next_wake(&self, now: Instant) -> Duration {
        let mut wake = Duration::from_secs(1);
        if !self.paused {
            let mut consider = |deadline: Instant| {
                let until = deadline.saturating_duration_since(now);
                if until < wake {
                    wake = until;
                }
            };
            for deadline in self.deadlines.iter().flatten() {
                consider(*deadline);
            }
            consider(self.next_measure);
        }
        wake.max(Duration::from_millis(1))
    }
}

/// Deadline timer bound to one runner.  Dropping it stops the thread.
pub struct LaneTimer {
    shared: Arc<(Mutex<TimerState>, Condvar)>,
    started: Instant,
}

impl LaneTimer {
    /// Spawn the timer thread.  `callback` receives every fired event; it
    /// runs on the timer thread with no timer lock held, so it may freely
    /// call back into the timer.
    pub fn start(
        measure_interval: Duration,
        callback: impl Fn(TimerEvent) + Send + 'static,
    ) -> Self {
        let started = Instant::now();
        let shared = Arc::new((
            Mutex::new(TimerState {
                running: true,
                paused: false,
                deadlines: [None; 3],
                remaining: [None; 3],
                measure_interval,
                next_measure: started + measure_interval,
                measure_remaining: None,
            }),
            Condvar::new(),
        ));

        let thread_shared = Arc::clone(&shared);
        thread::spawn(move || Self::run(&thread_shared, &callback));

        Self { shared, started }
    }

    /// Wall-clock seconds since `start`, pauses included.
    pub fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Arm a one-shot slot `delay` from now (or from the resume point while
    /// paused).  Re-arming an armed slot replaces its deadline.
    pub fn arm(&self, slot: TimerSlot, delay: Duration) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        if state.paused {
            state.remaining[slot.index()] = Some(delay);
        } else {
            state.deadlines[slot.index()] = Some(Instant::now() + delay);
        }
        cvar.notify_one();
    }

    /// Convert armed deadlines into remaining deltas and suspend firing.
    pub fn pause(&self) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        if state.paused {
            return;
        }
        let now = Instant::now();
        for slot in TimerSlot::ALL {
            if let Some(deadline) = state.deadlines[slot.index()].take() {
                state.remaining[slot.index()] = Some(deadline.saturating_duration_since(now));
            }
        }
        state.measure_remaining = Some(state.next_measure.saturating_duration_since(now));
        state.paused = true;
        cvar.notify_one();
    }

    /// Re-arm every held slot from its remaining delta.
    pub fn resume(&self) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        if !state.paused {
            return;
        }
        let now = Instant::now();
        for slot in TimerSlot::ALL {
            if let Some(delta) = state.remaining[slot.index()].take() {
                state.deadlines[slot.index()] = Some(now + delta);
            }
        }
        let measure_delta = state.measure_remaining.take().unwrap_or(state.measure_interval);
        state.next_measure = now + measure_delta;
        state.paused = false;
        cvar.notify_one();
    }

    /// Stop the thread.  Events already due but not yet delivered are
    /// discarded.  Safe to call from within the timer callback.
    pub fn stop(&self) {
        let (lock, cvar) = &*self.shared;
        lock.lock().unwrap().running = false;
        cvar.notify_one();
        debug!("lane timer stopped after {:.1} s", self.elapsed());
    }

    fn run(shared: &(Mutex<TimerState>, Condvar), callback: &(impl Fn(TimerEvent) + Send)) {
        let (lock, cvar) = shared;
        let mut state = lock.lock().unwrap();
        loop {
            if !state.running {
                return;
            }

            let mut due = Vec::new();
            if !state.paused {
                let now = Instant::now();
                if now >= state.next_measure {
                    due.push(TimerEvent::Measure);
                    while state.next_measure <= now {
                        let interval = state.measure_interval;
                        state.next_measure += interval;
                    }
                }
                for slot in TimerSlot::ALL {
                    if let Some(deadline) = state.deadlines[slot.index()] {
                        if now >= deadline {
                            state.deadlines[slot.index()] = None;
                            due.push(TimerEvent::Expired(slot));
                        }
                    }
                }
            }

            if due.is_empty() {
                let wake = state.next_wake(Instant::now());
                state = cvar.wait_timeout(state, wake).unwrap().0;
            } else {
                drop(state);
                for event in due {
                    callback(event);
                }
                state = lock.lock().unwrap();
            }
        }
    }
}

impl Drop for LaneTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn collect_events() -> (Arc<StdMutex<Vec<(f64, TimerEvent)>>>, Instant) {
        (Arc::new(StdMutex::new(Vec::new())), Instant::now())
    }

    #[test]
    fn one_shot_fires_once_near_deadline() {
        let (events, t0) = collect_events();
        let sink = Arc::clone(&events);
        let timer = LaneTimer::start(Duration::from_secs(60), move |e| {
            sink.lock().unwrap().push((t0.elapsed().as_secs_f64(), e));
        });
        timer.arm(TimerSlot::Sample, Duration::from_millis(300));
        thread::sleep(Duration::from_millis(700));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let (at, event) = events[0];
        assert_eq!(event, TimerEvent::Expired(TimerSlot::Sample));
        assert!((0.25..0.45).contains(&at), "fired at {at}");
    }

    #[test]
    fn pause_preserves_remaining_delta() {
        let (events, t0) = collect_events();
        let sink = Arc::clone(&events);
        let timer = LaneTimer::start(Duration::from_secs(60), move |e| {
            sink.lock().unwrap().push((t0.elapsed().as_secs_f64(), e));
        });
        timer.arm(TimerSlot::LedFront, Duration::from_millis(400));
        thread::sleep(Duration::from_millis(200));
        timer.pause();
        thread::sleep(Duration::from_millis(500));
        timer.resume();
        thread::sleep(Duration::from_millis(400));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let (at, _) = events[0];
        // 200 ms elapsed + 500 ms paused + ~200 ms remaining
        assert!((0.8..1.05).contains(&at), "fired at {at}");
    }

    #[test]
    fn measurement_ticks_periodically() {
        let (events, _) = collect_events();
        let sink = Arc::clone(&events);
        let timer = LaneTimer::start(Duration::from_millis(100), move |e| {
            sink.lock().unwrap().push((0.0, e));
        });
        thread::sleep(Duration::from_millis(550));
        timer.stop();

        let ticks = events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| *e == TimerEvent::Measure)
            .count();
        assert!((4..=6).contains(&ticks), "{ticks} ticks");
    }

    #[test]
    fn no_events_after_stop() {
        let (events, _) = collect_events();
        let sink = Arc::clone(&events);
        let timer = LaneTimer::start(Duration::from_secs(60), move |e| {
            sink.lock().unwrap().push((0.0, e));
        });
        timer.arm(TimerSlot::LedBack, Duration::from_millis(200));
        timer.stop();
        thread::sleep(Duration::from_millis(400));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn arm_while_paused_takes_effect_on_resume() {
        let (events, t0) = collect_events();
        let sink = Arc::clone(&events);
        let timer = LaneTimer::start(Duration::from_secs(60), move |e| {
            sink.lock().unwrap().push((t0.elapsed().as_secs_f64(), e));
        });
        timer.pause();
        timer.arm(TimerSlot::Sample, Duration::from_millis(200));
        thread::sleep(Duration::from_millis(300));
        timer.resume();
        thread::sleep(Duration::from_millis(350));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let (at, _) = events[0];
        assert!((0.45..0.65).contains(&at), "fired at {at}");
    }
}
