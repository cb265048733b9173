//! The core→host boundary: the abstract operations the virtual pipeline
//! chain's tail calls to actually affect what the host reports over HID.
//!
//! The core never talks to a USB stack; it only ever calls through this
//! trait, which the host implements however its transport works.

use crate::keycode::Keycode;

/// The four operations a fully-drained virtual event stream (plus layer
/// changes) can produce.
pub trait HidReporter {
    /// Press and hold `keycode`.
    fn register_key(&mut self, keycode: Keycode);
    /// Release a previously registered `keycode`.
    fn unregister_key(&mut self, keycode: Keycode);
    /// Press and immediately release `keycode` within one report.
    fn tap_key(&mut self, keycode: Keycode);
    /// Inform the host which layer is now active, for UI/indicator use.
    fn set_active_layer(&mut self, layer: u8);
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use super::*;
    use arrayvec::ArrayVec;

    /// Records every call for assertions in executor/scenario tests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ReportedEvent {
        Register(Keycode),
        Unregister(Keycode),
        Tap(Keycode),
        Layer(u8),
    }

    #[derive(Debug, Default)]
    pub struct FakeReporter {
        pub events: ArrayVec<ReportedEvent, 64>,
    }

    impl FakeReporter {
        pub fn new() -> Self {
            FakeReporter::default()
        }
    }

    impl HidReporter for FakeReporter {
        fn register_key(&mut self, keycode: Keycode) {
            let _ = self.events.try_push(ReportedEvent::Register(keycode));
        }

        fn unregister_key(&mut self, keycode: Keycode) {
            let _ = self.events.try_push(ReportedEvent::Unregister(keycode));
        }

        fn tap_key(&mut self, keycode: Keycode) {
            let _ = self.events.try_push(ReportedEvent::Tap(keycode));
        }

        fn set_active_layer(&mut self, layer: u8) {
            let _ = self.events.try_push(ReportedEvent::Layer(layer));
        }
    }
}
