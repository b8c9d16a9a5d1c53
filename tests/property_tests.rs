//! Property tests for the core data structures: typed quantities,
//! threshold machines, and the persisted-object serialization laws.

use proptest::prelude::*;

use photoreactor::configuration::{EmissionPair, Led};
use photoreactor::control::thresholds::{ThresholdAction, ThresholdMachine, ThresholdStatus};
use photoreactor::measurements::{Current, Temperature};

// ── Typed quantities ──────────────────────────────────────────

proptest! {
    /// `from_celsius` keeps exactly two decimals: converting back yields
    /// the value rounded to hundredths.
    #[test]
    fn temperature_round_trips_to_hundredths(celsius in -300.0f64..1000.0) {
        let quantized = (celsius * 100.0).round() / 100.0;
        let temp = Temperature::from_celsius(celsius);
        prop_assert!((temp.celsius() - quantized).abs() < 1e-9);
    }

    /// Ordering of temperatures agrees with ordering of the raw values.
    #[test]
    fn temperature_ordering_is_value_ordering(a in -30000i32..100_000, b in -30000i32..100_000) {
        let ta = Temperature::from_hundredth_celsius(a);
        let tb = Temperature::from_hundredth_celsius(b);
        prop_assert_eq!(ta.cmp(&tb), a.cmp(&b));
    }

    /// Current scaling never leaves the [0, max] interval for intensities
    /// in [0, 1] and is monotone in the intensity.
    #[test]
    fn current_scaling_is_bounded_and_monotone(
        max_ma in 0i32..=1000,
        i1 in 0.0f64..=1.0,
        i2 in 0.0f64..=1.0,
    ) {
        let max = Current::from_milli_amps(max_ma);
        let c1 = max * i1;
        let c2 = max * i2;
        prop_assert!(c1.milli_amps >= 0 && c1.milli_amps <= max_ma);
        if i1 < i2 {
            prop_assert!(c1 <= c2);
        }
    }
}

// ── Threshold machines ────────────────────────────────────────

fn celsius(v: f64) -> Temperature {
    Temperature::from_celsius(v)
}

proptest! {
    /// Readings that never exceed the warn threshold keep the machine OK.
    #[test]
    fn below_warn_stays_ok(readings in proptest::collection::vec(-50.0f64..=50.0, 1..40)) {
        let mut machine = ThresholdMachine::new(celsius(50.0), Some(celsius(70.0)));
        for reading in readings {
            prop_assert_eq!(machine.advance(celsius(reading)), ThresholdAction::Hold);
        }
        prop_assert_eq!(machine.status(), ThresholdStatus::Ok);
    }

    /// ABORT is absorbing: whatever follows a reading above the abort
    /// threshold, the machine re-asserts the abort.
    #[test]
    fn abort_is_absorbing(
        tail in proptest::collection::vec(-50.0f64..=200.0, 0..40),
    ) {
        let mut machine = ThresholdMachine::new(celsius(50.0), Some(celsius(70.0)));
        machine.advance(celsius(90.0));
        prop_assert_eq!(machine.status(), ThresholdStatus::Abort);
        for reading in tail {
            prop_assert_eq!(machine.advance(celsius(reading)), ThresholdAction::Aborted);
            prop_assert_eq!(machine.status(), ThresholdStatus::Abort);
        }
    }

    /// A warn-only machine never reaches ABORT.
    #[test]
    fn warn_only_never_aborts(readings in proptest::collection::vec(-50.0f64..=500.0, 1..40)) {
        let mut machine = ThresholdMachine::new(celsius(100.0), None);
        for reading in readings {
            let action = machine.advance(celsius(reading));
            prop_assert_ne!(action, ThresholdAction::Aborted);
            prop_assert_ne!(machine.status(), ThresholdStatus::Abort);
        }
    }

    /// Every Recovered follows a Warned, and a warn-only machine emits at
    /// most one Warned (OK_AGAIN never returns to OK).
    #[test]
    fn warn_and_recover_alternate(readings in proptest::collection::vec(0.0f64..=60.0, 1..60)) {
        let mut machine = ThresholdMachine::new(celsius(50.0), None);
        let mut warned = 0usize;
        let mut recovered = 0usize;
        for reading in readings {
            match machine.advance(celsius(reading)) {
                ThresholdAction::Warned => warned += 1,
                ThresholdAction::Recovered => recovered += 1,
                _ => {}
            }
            prop_assert!(recovered <= warned);
            prop_assert!(warned <= 1);
        }
    }
}

// ── Serialization laws ────────────────────────────────────────

fn arb_led() -> impl Strategy<Value = Led> {
    (
        any::<u64>(),
        "[a-z0-9 ]{0,16}",
        200i32..=500,
        0i32..=1000,
        proptest::collection::vec((200i32..=800, 0.0f64..=1.0), 0..4),
    )
        .prop_map(|(uid, name, min_wavelength, max_current, spectrum)| Led {
            uid,
            name,
            fwhm: 12,
            max_of_emission: min_wavelength + 15,
            min_wavelength,
            max_wavelength: min_wavelength + 30,
            color: "blue".into(),
            max_current,
            manufacturer_id: 1,
            order_id: 2,
            date_soldering: "2024-01-01".into(),
            soldered_by: "qa".into(),
            operating_time: 1.25,
            defect: false,
            emission_spectrum: spectrum
                .into_iter()
                .map(|(wavelength, intensity)| EmissionPair {
                    wavelength,
                    intensity,
                })
                .collect(),
            emission_spectrum_recorded_on: "2024-01-02".into(),
        })
}

proptest! {
    /// Serialize -> deserialize of a persisted object is identity.
    #[test]
    fn led_json_round_trip(led in arb_led()) {
        let json = serde_json::to_string(&led).unwrap();
        let back: Led = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(led, back);
    }

    /// The UV classification boundary sits exactly at 400 nm.
    #[test]
    fn uv_boundary_is_400nm(led in arb_led()) {
        prop_assert_eq!(led.is_uv(), led.min_wavelength <= 400);
    }
}
