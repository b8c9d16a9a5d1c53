//! Threshold state machines for temperature-like signals.
//!
//! Every supervised signal tracks its relationship to a warn threshold and
//! an optional abort threshold:
//!
//! ```text
//!        v > warn              v <= warn
//!   OK ───────────▶ EXCEEDED ───────────▶ OK_AGAIN
//!    \                  │
//!     \                 │ v > abort          (any state)
//!      ─────────────────┴───────────────▶ ABORT  (latched)
//! ```
//!
//! ABORT is terminal: once latched, every further reading re-emits the
//! abort action so an experiment started into an abort condition is torn
//! down on the next reading.

use crate::measurements::Temperature;

/// Relationship of a supervised signal to its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdStatus {
    Ok,
    Exceeded,
    OkAgain,
    Abort,
}

impl ThresholdStatus {
    /// Wire name used by the push surface.
    pub const fn name(self) -> &'static str {
        match self {
            ThresholdStatus::Ok => "OK",
            ThresholdStatus::Exceeded => "EXCEEDED",
            ThresholdStatus::OkAgain => "OK_AGAIN",
            ThresholdStatus::Abort => "ABORT",
        }
    }
}

/// What a reading did to the machine; drives events, LEDs and lane actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdAction {
    /// No transition of interest.
    Hold,
    /// OK -> EXCEEDED.
    Warned,
    /// EXCEEDED -> OK_AGAIN.
    Recovered,
    /// Entered (or re-asserted) ABORT.
    Aborted,
}

/// One warn/abort machine.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdMachine {
    warn: Temperature,
    abort: Option<Temperature>,
    status: ThresholdStatus,
}

impl ThresholdMachine {
    pub fn new(warn: Temperature, abort: Option<Temperature>) -> Self {
        debug_assert!(abort.is_none_or(|a| warn < a));
        Self {
            warn,
            abort,
            status: ThresholdStatus::Ok,
        }
    }

    pub fn status(&self) -> ThresholdStatus {
        self.status
    }

    /// Feed one reading.
    pub fn advance(&mut self, value: Temperature) -> ThresholdAction {
        let above_abort = self.abort.is_some_and(|a| value > a);

        if self.status == ThresholdStatus::Abort || above_abort {
            self.status = ThresholdStatus::Abort;
            return ThresholdAction::Aborted;
        }

        match self.status {
            ThresholdStatus::Ok if value > self.warn => {
                self.status = ThresholdStatus::Exceeded;
                ThresholdAction::Warned
            }
            ThresholdStatus::Exceeded if value <= self.warn => {
                self.status = ThresholdStatus::OkAgain;
                ThresholdAction::Recovered
            }
            _ => ThresholdAction::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(warn: f64, abort: Option<f64>) -> ThresholdMachine {
        ThresholdMachine::new(
            Temperature::from_celsius(warn),
            abort.map(Temperature::from_celsius),
        )
    }

    fn feed(m: &mut ThresholdMachine, celsius: f64) -> ThresholdAction {
        m.advance(Temperature::from_celsius(celsius))
    }

    #[test]
    fn warn_then_recover() {
        let mut m = machine(50.0, Some(70.0));
        assert_eq!(feed(&mut m, 40.0), ThresholdAction::Hold);
        assert_eq!(feed(&mut m, 60.0), ThresholdAction::Warned);
        assert_eq!(m.status(), ThresholdStatus::Exceeded);
        assert_eq!(feed(&mut m, 60.0), ThresholdAction::Hold);
        assert_eq!(feed(&mut m, 45.0), ThresholdAction::Recovered);
        assert_eq!(m.status(), ThresholdStatus::OkAgain);
    }

    #[test]
    fn abort_is_latched_and_reasserts() {
        let mut m = machine(50.0, Some(70.0));
        assert_eq!(feed(&mut m, 60.0), ThresholdAction::Warned);
        assert_eq!(feed(&mut m, 75.0), ThresholdAction::Aborted);
        assert_eq!(m.status(), ThresholdStatus::Abort);
        // Cooling down does not leave ABORT.
        assert_eq!(feed(&mut m, 20.0), ThresholdAction::Aborted);
        assert_eq!(m.status(), ThresholdStatus::Abort);
    }

    #[test]
    fn abort_directly_from_ok() {
        let mut m = machine(50.0, Some(70.0));
        assert_eq!(feed(&mut m, 80.0), ThresholdAction::Aborted);
    }

    #[test]
    fn warn_only_machine_never_aborts() {
        let mut m = machine(100.0, None);
        assert_eq!(feed(&mut m, 150.0), ThresholdAction::Warned);
        assert_eq!(feed(&mut m, 200.0), ThresholdAction::Hold);
        assert_eq!(m.status(), ThresholdStatus::Exceeded);
        assert_eq!(feed(&mut m, 90.0), ThresholdAction::Recovered);
    }

    #[test]
    fn ok_again_holds_below_warn() {
        let mut m = machine(50.0, Some(70.0));
        feed(&mut m, 60.0);
        feed(&mut m, 40.0);
        assert_eq!(feed(&mut m, 41.0), ThresholdAction::Hold);
        assert_eq!(m.status(), ThresholdStatus::OkAgain);
    }
}
