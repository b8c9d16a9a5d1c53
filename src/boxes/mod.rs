//! The two physical enclosures: the reactor box (sample stage, status
//! panel, environmental sensors) and the power box (LED drive, relays,
//! per-position power monitoring).

pub mod power;
pub mod reactor;
