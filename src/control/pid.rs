//! PID controller for LED drive current
//!
//! One regulator per energised LED position, closing the loop from the
//! measured current onto the commanded PWM intensity.  A fresh activation
//! starts as a [`PidBootstrapper`] that only knows the target; the first
//! measurement sample turns it into an initialised [`PidCurrentRegulator`].

use std::time::Instant;

use crate::measurements::Current;

/// Default proportional gain.  Negative because the PWM mapping is
/// inverted (higher intensity -> shorter low phase); measured above target
/// must reduce the duty.
// TODO: bench-verify the sign on the rig before enabling the outer safety
// loop on regulator output.
pub const DEFAULT_KP: f64 = -0.2;
/// Default integral time constant (seconds).
pub const DEFAULT_TI: f64 = 100_000.0;
/// Default derivative time constant (seconds).
pub const DEFAULT_TD: f64 = 0.5;

/// Initialised PID current regulator
#[derive(Debug, Clone)]
pub struct PidCurrentRegulator {
    target: Current,
    last_timepoint: Instant,
    last_error: f64,
    integral_error: f64,
    intensity: f64,

    k_p: f64,
    t_i: f64,
    t_d: f64,
}

impl PidCurrentRegulator {
    /// Error in amps; positive means the LED draws more than commanded.
    fn error(&self, measured: Current) -> f64 {
        measured.amps() - self.target.amps()
    }

    /// Feed one current sample and return the new absolute intensity.
    ///
    /// The caller clamps the result to [0, 1] before applying it — the
    /// regulator itself integrates unclamped.
    pub fn update_with_new_measurement(&mut self, measured: Current) -> f64 {
        self.update_at(measured, Instant::now())
    }

    fn update_at(&mut self, measured: Current, now: Instant) -> f64 {
        let delta_seconds = now.duration_since(self.last_timepoint).as_secs_f64().max(f64::MIN_POSITIVE);

        let new_error = self.error(measured);
        let derivative_error = (new_error - self.last_error) / delta_seconds;

        self.integral_error += new_error * delta_seconds;
        self.last_timepoint = now;
        self.last_error = new_error;

        self.intensity +=
            self.k_p * (new_error + self.integral_error / self.t_i + self.t_d * derivative_error);

        self.intensity
    }

    pub fn target(&self) -> Current {
        self.target
    }
}

/// Holds the target current until the first measurement arrives.
#[derive(Debug, Clone, Copy)]
pub struct PidBootstrapper {
    pub target: Current,
}

impl PidBootstrapper {
    pub fn new(target: Current) -> Self {
        Self { target }
    }

    /// First sample: produce the initial intensity and the live regulator.
    pub fn initialize(self, _measured: Current) -> (f64, PidCurrentRegulator) {
        let initial_intensity = self.target.amps() * 0.5;
        let regulator = PidCurrentRegulator {
            target: self.target,
            last_timepoint: Instant::now(),
            last_error: 0.0,
            integral_error: 0.0,
            intensity: initial_intensity,
            k_p: DEFAULT_KP,
            t_i: DEFAULT_TI,
            t_d: DEFAULT_TD,
        };
        (initial_intensity, regulator)
    }
}

/// Per-position regulator slot in the power box's drive table.
#[derive(Debug, Clone)]
pub enum LedPid {
    Bootstrap(PidBootstrapper),
    Running(PidCurrentRegulator),
}

impl LedPid {
    pub fn new(target: Current) -> Self {
        LedPid::Bootstrap(PidBootstrapper::new(target))
    }

    /// Feed one measurement, transitioning out of bootstrap on the first.
    /// Returns the unclamped intensity.
    pub fn step(&mut self, measured: Current) -> f64 {
        match self {
            LedPid::Bootstrap(bootstrap) => {
                let (intensity, regulator) = bootstrap.initialize(measured);
                *self = LedPid::Running(regulator);
                intensity
            }
            LedPid::Running(regulator) => regulator.update_with_new_measurement(measured),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bootstrap_starts_at_half_target() {
        let mut pid = LedPid::new(Current::from_milli_amps(800));
        let intensity = pid.step(Current::from_milli_amps(0));
        assert!((intensity - 0.4).abs() < 1e-9);
        assert!(matches!(pid, LedPid::Running(_)));
    }

    #[test]
    fn overcurrent_reduces_intensity() {
        let bootstrap = PidBootstrapper::new(Current::from_milli_amps(500));
        let (start, mut regulator) = bootstrap.initialize(Current::from_milli_amps(500));
        let later = regulator.last_timepoint + Duration::from_millis(100);
        // 200 mA above target: with Kp < 0 the intensity must drop.
        let next = regulator.update_at(Current::from_milli_amps(700), later);
        assert!(next < start);
    }

    #[test]
    fn undercurrent_raises_intensity() {
        let bootstrap = PidBootstrapper::new(Current::from_milli_amps(500));
        let (start, mut regulator) = bootstrap.initialize(Current::from_milli_amps(500));
        let later = regulator.last_timepoint + Duration::from_millis(100);
        let next = regulator.update_at(Current::from_milli_amps(300), later);
        assert!(next > start);
    }

    #[test]
    fn on_target_holds_roughly_steady() {
        let bootstrap = PidBootstrapper::new(Current::from_milli_amps(400));
        let (start, mut regulator) = bootstrap.initialize(Current::from_milli_amps(400));
        let mut at = regulator.last_timepoint;
        for _ in 0..10 {
            at += Duration::from_millis(100);
            regulator.update_at(Current::from_milli_amps(400), at);
        }
        assert!((regulator.intensity - start).abs() < 1e-6);
    }
}
