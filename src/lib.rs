//! Photo-reactor control core library.
//!
//! Layered bottom-up: typed quantities and the peripheral port traits at
//! the base, the two box abstractions and the PID current loop above
//! them, and the controller plus the per-lane experiment machinery on
//! top.  The HTTP/WebSocket surface and the vendor-protocol transport are
//! external collaborators; they consume this crate through
//! [`control::controller::Controller`], [`snapshots`], and
//! [`config_folder`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod boxes;
pub mod config;
pub mod config_folder;
pub mod configuration;
pub mod control;
pub mod device;
pub mod experiment;
pub mod measurements;
pub mod observable;
pub mod snapshots;

mod error;

pub use error::{DeviceError, Error, ExperimentError, PowerError, Result};
