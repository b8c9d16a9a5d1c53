//! Unified error types for the control core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! command surface's error handling uniform.  All variants are `Copy` so they
//! can be cheaply passed through callback handlers without allocation.
//! Sensor-callback handlers never return errors into the transport layer;
//! they log and update state instead.

use core::fmt;

use crate::measurements::{LedLane, LedPosition};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the control core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transport or peripheral operation failed.
    Device(DeviceError),
    /// An LED drive command was rejected.
    Power(PowerError),
    /// An experiment lifecycle command was rejected.
    Experiment(ExperimentError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(e) => write!(f, "device: {e}"),
            Self::Power(e) => write!(f, "power: {e}"),
            Self::Experiment(e) => write!(f, "experiment: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Device / transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The TCP connection to the box could not be established.
    ConnectFailed,
    /// A command was issued while the transport was down.
    NotConnected,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::NotConnected => write!(f, "not connected"),
        }
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

// ---------------------------------------------------------------------------
// LED drive errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    /// `activate_led` was called without a prior `set_led_max_current`.
    MaxCurrentNotSet(LedPosition),
    /// The requested max current is outside the 0..=1000 mA drive range.
    MaxCurrentOutOfRange,
    /// The requested intensity is outside [0, 1].
    IntensityOutOfRange,
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxCurrentNotSet(pos) => write!(f, "no max current set for {pos}"),
            Self::MaxCurrentOutOfRange => write!(f, "max current outside 0..=1000 mA"),
            Self::IntensityOutOfRange => write!(f, "intensity outside 0..=1"),
        }
    }
}

impl From<PowerError> for Error {
    fn from(e: PowerError) -> Self {
        Self::Power(e)
    }
}

// ---------------------------------------------------------------------------
// Experiment lifecycle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentError {
    /// The lane already runs an experiment.
    AlreadyRunning(LedLane),
    /// The command needs a running experiment on the lane.
    NotRunning(LedLane),
    /// The template enables neither the front nor the back LED.
    NoLedConfigured,
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning(lane) => write!(f, "{lane} already runs an experiment"),
            Self::NotRunning(lane) => write!(f, "no experiment running on {lane}"),
            Self::NoLedConfigured => write!(f, "template configures no LED"),
        }
    }
}

impl From<ExperimentError> for Error {
    fn from(e: ExperimentError) -> Self {
        Self::Experiment(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
