//! Status-LED panel on a 16-channel digital I/O bricklet.
//!
//! Steady levels are plain channel writes; blinking is built on the
//! bricklet's monoflop: arm `monoflop(ch, v, period)`, and when the done
//! callback reports `(ch, v)` re-arm it with the opposite level implied by
//! the hardware.  Removing the channel from the blink registry stops the
//! oscillation on the next edge — no timer thread on the host side.
//!
//! Assignments are idempotent: writing the state a channel already has
//! produces no peripheral traffic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use super::ports::{DigitalIo16, PortDirection};

/// Commanded state of one panel LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    /// Not driven yet (power-on state of every channel).
    Undefined,
    Low,
    High,
    /// 500 ms monoflop period.
    BlinkSlow,
    /// 200 ms monoflop period.
    BlinkFast,
}

impl LedState {
    /// Monoflop period for the blinking states.
    pub const fn blink_period_ms(self) -> Option<u32> {
        match self {
            LedState::BlinkSlow => Some(500),
            LedState::BlinkFast => Some(200),
            _ => None,
        }
    }
}

struct PanelInner {
    states: [LedState; 16],
    /// channel -> blink period in ms; presence keeps the monoflop re-arming.
    blinking: HashMap<u8, u32>,
    /// The monoflop-done callback must only be registered once, even when
    /// a reconnect re-runs `initialize`.
    callback_registered: bool,
}

/// Channel-addressed LED surface over one I/O bricklet.
pub struct StatusLedPanel {
    io: Arc<dyn DigitalIo16>,
    inner: Arc<Mutex<PanelInner>>,
}

impl StatusLedPanel {
    pub fn new(io: Arc<dyn DigitalIo16>) -> Self {
        Self {
            io,
            inner: Arc::new(Mutex::new(PanelInner {
                states: [LedState::Undefined; 16],
                blinking: HashMap::new(),
                callback_registered: false,
            })),
        }
    }

    /// Configure channel directions, register the monoflop-done callback
    /// once, and configure change-driven callbacks on every input channel.
    pub fn initialize(&self, is_output_channel: fn(u8) -> bool, input_period_ms: u32) {
        for channel in 0..16 {
            let direction = if is_output_channel(channel) {
                PortDirection::Output
            } else {
                PortDirection::Input
            };
            self.io.set_configuration(channel, direction, true);
            if direction == PortDirection::Input {
                // value_has_to_change: steady inputs are not worth logging
                self.io
                    .set_input_value_callback_configuration(channel, input_period_ms, true);
            }
        }

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.callback_registered {
                return;
            }
            inner.callback_registered = true;
        }
        let inner = Arc::clone(&self.inner);
        let io = Arc::clone(&self.io);
        self.io.on_monoflop_done(Box::new(move |channel, value| {
            let period = inner.lock().unwrap().blinking.get(&channel).copied();
            if let Some(period_ms) = period {
                io.set_monoflop(channel, value, period_ms);
            }
        }));
    }

    /// Drive one channel to `state`.  No-op when the channel already has it.
    pub fn set(&self, channel: u8, state: LedState) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.states[channel as usize] == state {
                return;
            }
            inner.states[channel as usize] = state;
            match state {
                LedState::BlinkSlow | LedState::BlinkFast => {
                    let period = state.blink_period_ms().unwrap();
                    inner.blinking.insert(channel, period);
                }
                _ => {
                    inner.blinking.remove(&channel);
                }
            }
        }
        debug!("panel channel {channel} -> {state:?}");
        match state {
            LedState::Undefined => {}
            LedState::Low => self.io.set_selected_value(channel, false),
            LedState::High => self.io.set_selected_value(channel, true),
            LedState::BlinkSlow | LedState::BlinkFast => {
                // Bootstrap the oscillation; the done callback keeps it going.
                self.io
                    .set_monoflop(channel, true, state.blink_period_ms().unwrap());
            }
        }
    }

    /// Last commanded state of a channel.
    pub fn state(&self, channel: u8) -> LedState {
        self.inner.lock().unwrap().states[channel as usize]
    }
}

/// One panel LED that knows its channel number.
///
/// Boxes expose their panel legend as `LedChannel` constants; the
/// controller drives them with `led.set(&panel, state)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedChannel(pub u8);

impl LedChannel {
    pub fn set(self, panel: &StatusLedPanel, state: LedState) {
        panel.set(self.0, state);
    }

    pub fn get(self, panel: &StatusLedPanel) -> LedState {
        panel.state(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum IoCall {
        Config(u8, PortDirection, bool),
        Value(u8, bool),
        Monoflop(u8, bool, u32),
        InputConfig(u8, u32, bool),
    }

    #[derive(Default)]
    struct RecordingIo {
        calls: Mutex<Vec<IoCall>>,
        monoflop_done: Mutex<Option<Box<dyn Fn(u8, bool) + Send + Sync>>>,
    }

    impl RecordingIo {
        fn calls(&self) -> Vec<IoCall> {
            self.calls.lock().unwrap().clone()
        }

        fn fire_monoflop_done(&self, channel: u8, value: bool) {
            let cb = self.monoflop_done.lock().unwrap();
            if let Some(cb) = cb.as_ref() {
                cb(channel, value);
            }
        }
    }

    impl DigitalIo16 for RecordingIo {
        fn set_configuration(&self, channel: u8, direction: PortDirection, init: bool) {
            self.calls
                .lock()
                .unwrap()
                .push(IoCall::Config(channel, direction, init));
        }

        fn set_selected_value(&self, channel: u8, value: bool) {
            self.calls.lock().unwrap().push(IoCall::Value(channel, value));
        }

        fn set_monoflop(&self, channel: u8, value: bool, duration_ms: u32) {
            self.calls
                .lock()
                .unwrap()
                .push(IoCall::Monoflop(channel, value, duration_ms));
        }

        fn set_input_value_callback_configuration(
            &self,
            channel: u8,
            period_ms: u32,
            value_has_to_change: bool,
        ) {
            self.calls
                .lock()
                .unwrap()
                .push(IoCall::InputConfig(channel, period_ms, value_has_to_change));
        }

        fn get_value(&self) -> [bool; 16] {
            [false; 16]
        }

        fn on_input_value(&self, _callback: Box<dyn Fn(u8, bool, bool) + Send + Sync>) {}

        fn on_monoflop_done(&self, callback: Box<dyn Fn(u8, bool) + Send + Sync>) {
            *self.monoflop_done.lock().unwrap() = Some(callback);
        }
    }

    fn panel_with_io() -> (Arc<RecordingIo>, StatusLedPanel) {
        let io = Arc::new(RecordingIo::default());
        let panel = StatusLedPanel::new(Arc::clone(&io) as Arc<dyn DigitalIo16>);
        (io, panel)
    }

    #[test]
    fn high_and_low_drive_the_channel() {
        let (io, panel) = panel_with_io();
        panel.set(3, LedState::High);
        panel.set(3, LedState::Low);
        assert_eq!(io.calls(), vec![IoCall::Value(3, true), IoCall::Value(3, false)]);
    }

    #[test]
    fn same_state_twice_is_silent() {
        let (io, panel) = panel_with_io();
        panel.set(5, LedState::High);
        panel.set(5, LedState::High);
        assert_eq!(io.calls(), vec![IoCall::Value(5, true)]);
    }

    #[test]
    fn blink_bootstraps_a_monoflop_and_rearms_on_done() {
        let (io, panel) = panel_with_io();
        panel.initialize(|_| true, 200);
        panel.set(7, LedState::BlinkFast);
        io.fire_monoflop_done(7, false);
        io.fire_monoflop_done(7, true);

        let calls: Vec<_> = io
            .calls()
            .into_iter()
            .filter(|c| matches!(c, IoCall::Monoflop(..)))
            .collect();
        assert_eq!(
            calls,
            vec![
                IoCall::Monoflop(7, true, 200),
                IoCall::Monoflop(7, false, 200),
                IoCall::Monoflop(7, true, 200),
            ]
        );
    }

    #[test]
    fn steady_state_stops_the_oscillation() {
        let (io, panel) = panel_with_io();
        panel.initialize(|_| true, 200);
        panel.set(7, LedState::BlinkSlow);
        panel.set(7, LedState::Low);
        // Late done callback from the still-in-flight monoflop: must not re-arm.
        io.fire_monoflop_done(7, false);

        let rearms = io
            .calls()
            .into_iter()
            .filter(|c| matches!(c, IoCall::Monoflop(..)))
            .count();
        assert_eq!(rearms, 1); // only the bootstrap
    }

    #[test]
    fn initialize_configures_directions_and_input_callbacks() {
        let (io, panel) = panel_with_io();
        panel.initialize(|ch| ch >= 8, 150);

        let calls = io.calls();
        assert!(calls.contains(&IoCall::Config(0, PortDirection::Input, true)));
        assert!(calls.contains(&IoCall::Config(15, PortDirection::Output, true)));
        assert!(calls.contains(&IoCall::InputConfig(0, 150, true)));
        // Outputs get no input callback configuration.
        assert!(!calls.iter().any(|c| matches!(c, IoCall::InputConfig(ch, ..) if *ch >= 8)));
    }
}
