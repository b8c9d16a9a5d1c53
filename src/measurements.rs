//! Fixed-point typed quantities.
//!
//! Every sensor reading travels through the system as a newtype over its
//! integral wire representation (hundredth-degrees, millivolts, ...).
//! Conversions go through unit-named constructors so a raw `i32` can never
//! silently cross a unit boundary.  All quantities are totally ordered by
//! their integral value.

use std::fmt;
use std::ops::Mul;

// ---------------------------------------------------------------------------
// Temperature
// ---------------------------------------------------------------------------

/// Temperature in hundredths of a degree Celsius, signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Temperature {
    pub hundredth_celsius: i32,
}

impl Temperature {
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            hundredth_celsius: (celsius * 100.0).round() as i32,
        }
    }

    /// From the tenth-degree scale the IR thermometers report.
    pub const fn from_tenth_celsius(tenth: i32) -> Self {
        Self {
            hundredth_celsius: tenth * 10,
        }
    }

    pub const fn from_hundredth_celsius(hundredth: i32) -> Self {
        Self {
            hundredth_celsius: hundredth,
        }
    }

    pub fn celsius(self) -> f64 {
        f64::from(self.hundredth_celsius) / 100.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} degC", self.celsius())
    }
}

// ---------------------------------------------------------------------------
// Illuminance
// ---------------------------------------------------------------------------

/// Illuminance in hundredths of a lux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Illuminance {
    pub hundredth_lux: i64,
}

impl Illuminance {
    pub fn from_lux(lux: f64) -> Self {
        Self {
            hundredth_lux: (lux * 100.0).round() as i64,
        }
    }

    pub const fn from_hundredth_lux(hundredth: i64) -> Self {
        Self {
            hundredth_lux: hundredth,
        }
    }

    pub fn lux(self) -> f64 {
        self.hundredth_lux as f64 / 100.0
    }
}

impl fmt::Display for Illuminance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} lx", self.lux())
    }
}

// ---------------------------------------------------------------------------
// UV index
// ---------------------------------------------------------------------------

/// UV index in tenths of a UVI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UvIndex {
    pub tenth_uvi: i32,
}

impl UvIndex {
    pub const fn from_tenth_uvi(tenth: i32) -> Self {
        Self { tenth_uvi: tenth }
    }

    pub fn uvi(self) -> f64 {
        f64::from(self.tenth_uvi) / 10.0
    }
}

impl fmt::Display for UvIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} UVI", self.uvi())
    }
}

// ---------------------------------------------------------------------------
// Voltage
// ---------------------------------------------------------------------------

/// Voltage in millivolts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Voltage {
    pub milli_volts: i32,
}

impl Voltage {
    pub const fn from_milli_volts(milli_volts: i32) -> Self {
        Self { milli_volts }
    }

    pub fn volts(self) -> f64 {
        f64::from(self.milli_volts) / 1000.0
    }

    pub const fn is_zero(self) -> bool {
        self.milli_volts == 0
    }
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mV", self.milli_volts)
    }
}

// ---------------------------------------------------------------------------
// Current
// ---------------------------------------------------------------------------

/// Current in milliamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Current {
    pub milli_amps: i32,
}

impl Current {
    pub const fn from_milli_amps(milli_amps: i32) -> Self {
        Self { milli_amps }
    }

    pub fn amps(self) -> f64 {
        f64::from(self.milli_amps) / 1000.0
    }
}

/// Scaling a current by an intensity factor yields a current
/// (PID setpoint = max current x target intensity).
impl Mul<f64> for Current {
    type Output = Current;

    fn mul(self, rhs: f64) -> Current {
        Current {
            milli_amps: (f64::from(self.milli_amps) * rhs).round() as i32,
        }
    }
}

impl fmt::Display for Current {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mA", self.milli_amps)
    }
}

// ---------------------------------------------------------------------------
// Lanes and LED positions
// ---------------------------------------------------------------------------

/// One of the three parallel reaction lanes on the sample stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedLane {
    Lane1,
    Lane2,
    Lane3,
}

impl LedLane {
    pub const ALL: [LedLane; 3] = [LedLane::Lane1, LedLane::Lane2, LedLane::Lane3];

    /// Zero-based index for lane-keyed arrays.
    pub const fn index(self) -> usize {
        match self {
            LedLane::Lane1 => 0,
            LedLane::Lane2 => 1,
            LedLane::Lane3 => 2,
        }
    }

    /// One-based lane number as it appears on the rig and in records.
    pub const fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(LedLane::Lane1),
            1 => Some(LedLane::Lane2),
            2 => Some(LedLane::Lane3),
            _ => None,
        }
    }
}

impl fmt::Display for LedLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane {}", self.number())
    }
}

/// Front or back LED socket of a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedSide {
    Front,
    Back,
}

impl LedSide {
    pub const ALL: [LedSide; 2] = [LedSide::Front, LedSide::Back];

    pub const fn index(self) -> usize {
        match self {
            LedSide::Front => 0,
            LedSide::Back => 1,
        }
    }
}

/// One of the six physical LED sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedPosition {
    pub lane: LedLane,
    pub side: LedSide,
}

impl LedPosition {
    pub const fn new(lane: LedLane, side: LedSide) -> Self {
        Self { lane, side }
    }

    /// All six positions, lane-major.
    pub fn iter() -> impl Iterator<Item = LedPosition> {
        LedLane::ALL
            .into_iter()
            .flat_map(|lane| LedSide::ALL.into_iter().map(move |side| LedPosition { lane, side }))
    }
}

impl fmt::Display for LedPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            LedSide::Front => "front",
            LedSide::Back => "back",
        };
        write!(f, "{} {}", self.lane, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_round_trip() {
        let t = Temperature::from_celsius(23.456);
        assert_eq!(t.hundredth_celsius, 2346);
        assert!((t.celsius() - 23.46).abs() < 1e-9);
    }

    #[test]
    fn tenth_celsius_scales_to_hundredths() {
        assert_eq!(
            Temperature::from_tenth_celsius(251),
            Temperature::from_celsius(25.1)
        );
    }

    #[test]
    fn temperatures_are_ordered() {
        assert!(Temperature::from_celsius(-5.0) < Temperature::from_celsius(0.0));
        assert!(Temperature::from_celsius(70.1) > Temperature::from_celsius(70.0));
    }

    #[test]
    fn current_scales_by_intensity() {
        let max = Current::from_milli_amps(700);
        assert_eq!(max * 0.5, Current::from_milli_amps(350));
        assert_eq!(max * 0.0, Current::from_milli_amps(0));
        assert_eq!(max * 1.0, max);
    }

    #[test]
    fn led_position_iter_covers_all_six() {
        let all: Vec<_> = LedPosition::iter().collect();
        assert_eq!(all.len(), 6);
        for lane in LedLane::ALL {
            for side in LedSide::ALL {
                assert!(all.contains(&LedPosition::new(lane, side)));
            }
        }
    }

    #[test]
    fn lane_index_round_trip() {
        for lane in LedLane::ALL {
            assert_eq!(LedLane::from_index(lane.index()), Some(lane));
        }
        assert_eq!(LedLane::from_index(3), None);
    }
}
