//! The event buffer: an ordered, replayable history of press/release events,
//! paired with the press buffer that tracks which keys are currently down.
//!
//! A pipeline may scan this history multiple times (to recognize a tap-hold
//! or combo pattern) before deciding how to act on it, which is why this is
//! kept distinct from the press buffer: the press buffer is the current
//! truth, the event buffer is the replayable past.

use arrayvec::ArrayVec;

use crate::keycode::Keycode;
use crate::keymap::Keymap;
use crate::keypos::Keypos;
use crate::press_buffer::PressBuffer;
use crate::time::PlatformTime;

/// Fixed capacity of the event buffer.
pub const CAPACITY: usize = 20;

/// One recorded press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    /// Where the key is.
    pub keypos: Keypos,
    /// The keycode in effect when this event was recorded.
    pub keycode: Keycode,
    /// `true` for a press, `false` for a release.
    pub is_press: bool,
    /// When the event occurred.
    pub time: PlatformTime,
    /// Id shared with the matching press/release in this buffer (or with
    /// the press-record in the press buffer, if the press event itself has
    /// already been consumed).
    pub press_id: u8,
}

/// The position an event was found at, returned by the by-press-id removal
/// operations so a pipeline can track where it resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPosition {
    /// Index within the event buffer at the time of the call.
    pub position: usize,
    /// Whether a matching record was found at all.
    pub found: bool,
}

/// Ordered event history plus the press buffer it is derived from.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: ArrayVec<EventRecord, CAPACITY>,
    press_buffer: PressBuffer,
    press_id_cursor: u8,
}

impl EventBuffer {
    /// An empty event buffer with a fresh press buffer.
    pub const fn new() -> Self {
        EventBuffer {
            events: ArrayVec::new_const(),
            press_buffer: PressBuffer::new(),
            press_id_cursor: 0,
        }
    }

    /// The underlying press buffer (the live, non-replayable state).
    pub fn press_buffer(&self) -> &PressBuffer {
        &self.press_buffer
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` if no event is recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate events oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.iter()
    }

    /// The event record at `index`, if in bounds.
    pub fn get(&self, index: usize) -> Option<&EventRecord> {
        self.events.get(index)
    }

    /// Clear the event history but keep the press buffer (a pipeline is
    /// done replaying and wants a clean slate without losing what is
    /// physically held down).
    pub fn remove_event_keys(&mut self) {
        self.events.clear();
    }

    /// Clear both the event history and the press buffer.
    pub fn reset(&mut self) {
        self.events.clear();
        self.press_buffer.reset();
        self.press_id_cursor = 0;
    }

    /// Allocate a press_id not currently live in either buffer: 1..=255,
    /// wrapping, advancing the shared cursor. Both buffers are scanned
    /// newest-first, matching the firmware's bias toward recently-seen ids.
    fn next_press_id(&mut self) -> u8 {
        loop {
            self.press_id_cursor = (self.press_id_cursor % 255) + 1;
            let candidate = self.press_id_cursor;
            let in_press_buffer = self.press_buffer.contains_press_id(candidate);
            let in_event_buffer = self.events.iter().rev().any(|e| e.press_id == candidate);
            if !in_press_buffer && !in_event_buffer {
                return candidate;
            }
        }
    }

    fn push_event(&mut self, record: EventRecord) -> bool {
        if self.events.is_full() {
            log::warn!("event buffer: capacity exhausted, dropping event");
            return false;
        }
        self.events.push(record);
        true
    }

    /// Record a physical press at `keypos`. Resolves the keycode from the
    /// current layer via `keymap`, allocates a fresh press_id, and inserts
    /// both a press-buffer record and a press event atomically: if either
    /// insertion fails the other is rolled back. Returns the new press_id,
    /// or 0 on failure (misfire or capacity exhaustion).
    pub fn add_physical_press(
        &mut self,
        time: PlatformTime,
        keypos: Keypos,
        layer: u8,
        keymap: &dyn Keymap,
    ) -> u8 {
        let press_id = self.next_press_id();
        let keycode = keymap.lookup(layer, keypos);

        if self.press_buffer.add(keypos, keycode, press_id).is_none() {
            return 0;
        }
        let added = self.push_event(EventRecord {
            keypos,
            keycode,
            is_press: true,
            time,
            press_id,
        });
        if !added {
            self.press_buffer.remove(keypos);
            return 0;
        }
        press_id
    }

    /// Record a physical release at `keypos`. Returns `false` if there was
    /// no live press at `keypos`, or if the press had `ignore_release` set
    /// (in which case the press record is still removed, but silently, with
    /// no release event appended).
    pub fn add_physical_release(&mut self, time: PlatformTime, keypos: Keypos) -> bool {
        let Some(press) = self.press_buffer.find_by_keypos(keypos).copied() else {
            log::debug!("event buffer: release with no matching press, ignored");
            return false;
        };
        if press.ignore_release {
            self.press_buffer.remove(press.keypos);
            return false;
        }
        let added = self.push_event(EventRecord {
            keypos: press.keypos,
            keycode: press.keycode,
            is_press: false,
            time,
            press_id: press.press_id,
        });
        // The press record is removed either way: even if the release event
        // could not be appended, the physical key is no longer held, and
        // keeping the stale press record around would leave state
        // inconsistent (a "press" with no way to ever release it).
        self.press_buffer.remove(press.keypos);
        added
    }

    fn position_by_press_id(&self, press_id: u8, is_press: bool) -> Option<usize> {
        self.events
            .iter()
            .enumerate()
            .rev()
            .find(|(_, e)| e.press_id == press_id && e.is_press == is_press)
            .map(|(i, _)| i)
    }

    fn remove_at(&mut self, position: usize) {
        self.events.remove(position);
    }

    /// Remove the newest press event with this id from the history
    /// (without touching the press buffer). Used by a pipeline that has
    /// decided it owns this press and will re-emit it as something else.
    pub fn remove_press_event_by_press_id(&mut self, press_id: u8) -> EventPosition {
        match self.position_by_press_id(press_id, true) {
            Some(position) => {
                self.remove_at(position);
                EventPosition {
                    position,
                    found: true,
                }
            }
            None => EventPosition {
                position: 0,
                found: false,
            },
        }
    }

    /// Remove the newest release event with this id. If no release event
    /// exists yet (the key hasn't been released), falls back to marking the
    /// live press `ignore_release` so the eventual release is suppressed.
    pub fn remove_release_event_by_press_id(&mut self, press_id: u8) -> EventPosition {
        match self.position_by_press_id(press_id, false) {
            Some(position) => {
                self.remove_at(position);
                EventPosition {
                    position,
                    found: true,
                }
            }
            None => {
                let found = self.press_buffer.mark_ignore_release(press_id);
                EventPosition { position: 0, found }
            }
        }
    }

    /// Remove both the physical press-buffer record and whichever of its
    /// press/release events remain, for a pipeline that wants a physical
    /// key pair to simply disappear (e.g. a combo member).
    pub fn remove_physical_press_and_release(&mut self, keypos: Keypos) {
        if let Some(press) = self.press_buffer.find_by_keypos(keypos).copied() {
            self.remove_press_event_by_press_id(press.press_id);
            self.remove_release_event_by_press_id(press.press_id);
            self.press_buffer.remove(keypos);
        }
    }

    /// Update the keycode for `press_id` wherever it still has standing:
    /// always on the press-buffer record if live, always on the press
    /// event, but on the release event only if the press event for the
    /// same id is still present in the buffer at scan time — once a
    /// pipeline has consumed the press, the release keeps whatever keycode
    /// it already carries.
    pub fn change_keycode(&mut self, press_id: u8, keycode: Keycode) {
        if let Some(press) = self.press_buffer.find_by_press_id_mut(press_id) {
            press.keycode = keycode;
        }
        let mut press_found = false;
        for event in self.events.iter_mut() {
            if event.press_id != press_id {
                continue;
            }
            if event.is_press {
                press_found = true;
                event.keycode = keycode;
            } else if press_found {
                event.keycode = keycode;
            }
            // else: the press has already been consumed; leave the release
            // event's keycode untouched.
        }
    }

    /// Recompute the keycode for every event from `from_pos` onward against
    /// `layer`, propagating each through [`Self::change_keycode`]. Used
    /// after a layer change to retroactively re-resolve events still
    /// waiting in a capturing pipeline.
    pub fn update_layer_for_physical_events(
        &mut self,
        layer: u8,
        from_pos: usize,
        keymap: &dyn Keymap,
    ) {
        if from_pos >= self.events.len() {
            return;
        }
        // Collect (press_id, keypos) first: change_keycode mutates events,
        // and a naive index-based loop would skip/repeat entries whose
        // press_id collides after a keycode rewrite reorders nothing but
        // still invalidates borrow assumptions mid-iteration.
        let targets: ArrayVec<(u8, Keypos), CAPACITY> = self.events[from_pos..]
            .iter()
            .map(|e| (e.press_id, e.keypos))
            .collect();
        for (press_id, keypos) in targets {
            let keycode = keymap.lookup(layer, keypos);
            self.change_keycode(press_id, keycode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::FlatKeymap;

    fn kp(i: u16) -> Keypos {
        #[cfg(feature = "keypos-flat")]
        {
            Keypos::new(i)
        }
        #[cfg(feature = "keypos-rowcol")]
        {
            Keypos::new(i as u8, 0)
        }
    }

    fn keymap() -> FlatKeymap<'static> {
        static LAYER0: &[Keycode] = &[0x04, 0x05, 0x06, 0x07, 0x08];
        static LAYER1: &[Keycode] = &[0x10, 0x11, 0x12, 0x13, 0x14];
        FlatKeymap::new(&[LAYER0, LAYER1]).unwrap()
    }

    #[test]
    fn first_press_id_is_one() {
        let mut buf = EventBuffer::new();
        let id = buf.add_physical_press(0, kp(0), 0, &keymap());
        assert_eq!(id, 1);
    }

    #[test]
    fn press_then_release_share_press_id() {
        let mut buf = EventBuffer::new();
        let id = buf.add_physical_press(0, kp(0), 0, &keymap());
        assert!(buf.add_physical_release(10, kp(0)));
        assert_eq!(buf.get(1).unwrap().press_id, id);
        assert!(!buf.get(1).unwrap().is_press);
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut buf = EventBuffer::new();
        assert!(!buf.add_physical_release(0, kp(0)));
        assert!(buf.is_empty());
    }

    #[test]
    fn duplicate_press_is_misfire() {
        let mut buf = EventBuffer::new();
        let km = keymap();
        let id1 = buf.add_physical_press(0, kp(0), 0, &km);
        let id2 = buf.add_physical_press(1, kp(0), 0, &km);
        assert_ne!(id1, 0);
        assert_eq!(id2, 0);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn press_id_wraps_after_255_cycles_when_consumed_entries_are_truncated() {
        // The raw buffer has 20 slots and never truncates on its own: a
        // caller that never removes a fully-processed press/release pair
        // saturates it after 10 cycles (see `capacity_exhaustion_stops_new_presses`
        // below). A consumer that truncates each pair once it is fully
        // processed, the way the pipeline executor does per §4.7.4, keeps
        // the buffer bounded indefinitely, and the press_id cursor still
        // wraps at 255.
        let mut buf = EventBuffer::new();
        let km = keymap();
        let mut last = 0;
        for _ in 0..255 {
            last = buf.add_physical_press(0, kp(0), 0, &km);
            assert_ne!(last, 0, "buffer should never saturate once consumed pairs are truncated");
            buf.add_physical_release(0, kp(0));
            buf.remove_press_event_by_press_id(last);
            buf.remove_release_event_by_press_id(last);
        }
        assert_eq!(last, 255);
    }

    #[test]
    fn capacity_exhaustion_stops_new_presses() {
        // Without truncation, the 20-slot buffer saturates after 10
        // press/release cycles and further presses misfire (return 0).
        let mut buf = EventBuffer::new();
        let km = keymap();
        let mut last = 0;
        for _ in 0..12 {
            last = buf.add_physical_press(0, kp(0), 0, &km);
            buf.add_physical_release(0, kp(0));
        }
        assert_eq!(last, 0);
        assert_eq!(buf.len(), CAPACITY);
    }

    #[test]
    fn press_id_does_not_collide_with_live_event() {
        let mut buf = EventBuffer::new();
        let km = keymap();
        let mut last = 0;
        for i in 0..10u16 {
            last = buf.add_physical_press(0, kp(i), 0, &km);
        }
        assert_eq!(last, 10);
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn ignore_release_suppresses_release_event() {
        let mut buf = EventBuffer::new();
        let km = keymap();
        let id = buf.add_physical_press(0, kp(0), 0, &km);
        assert!(buf
            .press_buffer()
            .find_by_press_id(id)
            .map(|p| !p.ignore_release)
            .unwrap_or(false));
        // simulate a pipeline deciding this press will never surface a
        // release event (e.g. it consumed the press and wants the eventual
        // physical release silently dropped)
        let pos = buf.remove_release_event_by_press_id(id);
        assert!(pos.found); // falls back to ignore_release since no release event exists yet
        assert!(!buf.add_physical_release(5, kp(0)));
        assert!(buf.press_buffer().find_by_keypos(kp(0)).is_none());
    }

    #[test]
    fn change_keycode_updates_release_when_press_still_present() {
        let mut buf = EventBuffer::new();
        let km = keymap();
        let id = buf.add_physical_press(0, kp(0), 0, &km);
        buf.add_physical_release(5, kp(0));
        buf.change_keycode(id, 0x99);
        assert_eq!(buf.get(0).unwrap().keycode, 0x99);
        assert_eq!(buf.get(1).unwrap().keycode, 0x99);
    }

    #[test]
    fn change_keycode_leaves_release_alone_once_press_consumed() {
        let mut buf = EventBuffer::new();
        let km = keymap();
        let id = buf.add_physical_press(0, kp(0), 0, &km);
        // a pipeline consumes the press event from the buffer
        buf.remove_press_event_by_press_id(id);
        buf.add_physical_release(5, kp(0));
        let original = buf.get(0).unwrap().keycode;
        buf.change_keycode(id, 0x99);
        assert_eq!(buf.get(0).unwrap().keycode, original);
        assert_ne!(buf.get(0).unwrap().keycode, 0x99);
    }

    #[test]
    fn update_layer_for_physical_events_recomputes_keycodes() {
        let mut buf = EventBuffer::new();
        let km = keymap();
        buf.add_physical_press(0, kp(0), 0, &km);
        buf.update_layer_for_physical_events(1, 0, &km);
        assert_eq!(buf.get(0).unwrap().keycode, 0x10);
    }

    #[test]
    fn remove_at_preserves_order() {
        let mut buf = EventBuffer::new();
        let km = keymap();
        let id0 = buf.add_physical_press(0, kp(0), 0, &km);
        let id1 = buf.add_physical_press(1, kp(1), 0, &km);
        let id2 = buf.add_physical_press(2, kp(2), 0, &km);
        buf.remove_press_event_by_press_id(id1);
        assert_eq!(buf.get(0).unwrap().press_id, id0);
        assert_eq!(buf.get(1).unwrap().press_id, id2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut buf = EventBuffer::new();
        let km = keymap();
        buf.add_physical_press(0, kp(0), 0, &km);
        buf.reset();
        assert!(buf.is_empty());
        assert!(buf.press_buffer().is_empty());
    }
}
