//! Device layer: peripheral port traits, the declarative bricklet
//! manifolds for both boxes, and the status-LED panel.

pub mod manifold;
pub mod panel;
pub mod ports;
