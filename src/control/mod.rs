//! Control layer: closed-loop current regulation and the safety/threshold
//! engine.

pub mod controller;
pub mod pid;
pub mod thresholds;
