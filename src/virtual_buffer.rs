//! The virtual buffer: synthetic key events emitted by pipelines during a
//! single executor tick, drained by the virtual pipeline chain.

use arrayvec::ArrayVec;

use crate::keycode::Keycode;

/// Fixed capacity of the virtual buffer.
pub const CAPACITY: usize = 10;

/// One synthetic key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualEvent {
    /// The keycode being registered or unregistered.
    pub keycode: Keycode,
    /// `true` for a press, `false` for a release.
    pub is_press: bool,
}

/// Append-only queue of virtual events for the current tick.
#[derive(Debug, Default)]
pub struct VirtualBuffer {
    events: ArrayVec<VirtualEvent, CAPACITY>,
}

impl VirtualBuffer {
    /// An empty virtual buffer.
    pub const fn new() -> Self {
        VirtualBuffer {
            events: ArrayVec::new_const(),
        }
    }

    /// Append a virtual press. Returns `false` if the buffer is full.
    pub fn add_press(&mut self, keycode: Keycode) -> bool {
        self.push(VirtualEvent {
            keycode,
            is_press: true,
        })
    }

    /// Append a virtual release. Returns `false` if the buffer is full.
    pub fn add_release(&mut self, keycode: Keycode) -> bool {
        self.push(VirtualEvent {
            keycode,
            is_press: false,
        })
    }

    fn push(&mut self, event: VirtualEvent) -> bool {
        if self.events.is_full() {
            log::warn!("virtual buffer: capacity exhausted, dropping event");
            return false;
        }
        self.events.push(event);
        true
    }

    /// Iterate events in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &VirtualEvent> {
        self.events.iter()
    }

    /// The event at `index`, if in bounds. Used by the virtual pipeline
    /// chain, which drains by index while pipelines may still be appending.
    pub fn get(&self, index: usize) -> Option<&VirtualEvent> {
        self.events.get(index)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` if no event is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear the buffer, typically at the end of a tick once the virtual
    /// chain has drained it.
    pub fn reset(&mut self) {
        self.events.clear();
    }
}
