//! The press buffer: the real-time physical-press state of the keyboard.
//!
//! At most one record exists per keypos. The event buffer consults this
//! buffer to ignore misfires (a second press with no intervening release,
//! or a release with no matching press) and to carry a press's identity
//! forward after its press event has been consumed from the event history.

use arrayvec::ArrayVec;

use crate::keycode::Keycode;
use crate::keypos::Keypos;

/// Fixed capacity of the press buffer.
pub const CAPACITY: usize = 10;

/// One live physical press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressRecord {
    /// Where the key is.
    pub keypos: Keypos,
    /// Unique id shared with the matching event-buffer press/release pair.
    pub press_id: u8,
    /// The keycode resolved at press time (or last updated by `change_keycode`).
    pub keycode: Keycode,
    /// When set, the eventual release of this key is suppressed entirely.
    pub ignore_release: bool,
}

/// The bounded, order-preserving set of currently-pressed keys.
#[derive(Debug, Default)]
pub struct PressBuffer {
    records: ArrayVec<PressRecord, CAPACITY>,
}

impl PressBuffer {
    /// An empty press buffer.
    pub const fn new() -> Self {
        PressBuffer {
            records: ArrayVec::new_const(),
        }
    }

    /// Number of live presses.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if no key is currently pressed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a new press. Fails (returning `None`) if `keypos` is already
    /// pressed or the buffer is full; this is the normal recovery path for a
    /// misfire or for capacity exhaustion, not a `CoreError`.
    pub fn add(&mut self, keypos: Keypos, keycode: Keycode, press_id: u8) -> Option<&PressRecord> {
        if self.records.iter().any(|r| r.keypos == keypos) {
            log::debug!("press buffer: misfire, keypos already pressed");
            return None;
        }
        if self.records.is_full() {
            log::warn!("press buffer: capacity exhausted, dropping press");
            return None;
        }
        self.records.push(PressRecord {
            keypos,
            press_id,
            keycode,
            ignore_release: false,
        });
        self.records.last()
    }

    /// Remove the record at `keypos`, shifting later records down to
    /// preserve insertion order. Returns whether a record was removed.
    pub fn remove(&mut self, keypos: Keypos) -> bool {
        if let Some(pos) = self.records.iter().position(|r| r.keypos == keypos) {
            self.records.remove(pos);
            true
        } else {
            false
        }
    }

    /// Find the live press at `keypos`.
    pub fn find_by_keypos(&self, keypos: Keypos) -> Option<&PressRecord> {
        self.records.iter().find(|r| r.keypos == keypos)
    }

    /// Find the live press at `keypos`, mutably.
    pub fn find_by_keypos_mut(&mut self, keypos: Keypos) -> Option<&mut PressRecord> {
        self.records.iter_mut().find(|r| r.keypos == keypos)
    }

    /// Find the live press with the given id.
    pub fn find_by_press_id(&self, press_id: u8) -> Option<&PressRecord> {
        self.records.iter().find(|r| r.press_id == press_id)
    }

    /// Find the live press with the given id, mutably.
    pub fn find_by_press_id_mut(&mut self, press_id: u8) -> Option<&mut PressRecord> {
        self.records.iter_mut().find(|r| r.press_id == press_id)
    }

    /// Set `ignore_release` on the press with this id. Returns whether a
    /// matching record was found.
    pub fn mark_ignore_release(&mut self, press_id: u8) -> bool {
        if let Some(record) = self.find_by_press_id_mut(press_id) {
            record.ignore_release = true;
            true
        } else {
            false
        }
    }

    /// `true` if a press_id is currently live in this buffer (used by the
    /// event buffer's press-id allocator).
    pub fn contains_press_id(&self, press_id: u8) -> bool {
        self.records.iter().any(|r| r.press_id == press_id)
    }

    /// An iterator over live presses, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PressRecord> {
        self.records.iter()
    }

    /// Clear every live press.
    pub fn reset(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn add_and_find() {
        let mut buf = PressBuffer::new();
        buf.add(kp(0), 0x04, 1).unwrap();
        assert_eq!(buf.find_by_keypos(kp(0)).unwrap().press_id, 1);
        assert_eq!(buf.find_by_press_id(1).unwrap().keypos, kp(0));
    }

    #[test]
    fn duplicate_press_is_ignored() {
        let mut buf = PressBuffer::new();
        buf.add(kp(0), 0x04, 1).unwrap();
        assert!(buf.add(kp(0), 0x05, 2).is_none());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut buf = PressBuffer::new();
        for i in 0..CAPACITY as u16 {
            assert!(buf.add(kp(i), 0x04, (i + 1) as u8).is_some());
        }
        assert!(buf.add(kp(CAPACITY as u16), 0x04, 255).is_none());
    }

    #[test]
    fn remove_preserves_order() {
        let mut buf = PressBuffer::new();
        buf.add(kp(0), 0x04, 1).unwrap();
        buf.add(kp(1), 0x05, 2).unwrap();
        buf.add(kp(2), 0x06, 3).unwrap();
        assert!(buf.remove(kp(1)));
        let remaining: arrayvec::ArrayVec<u8, 4> =
            buf.iter().map(|r| r.press_id).collect();
        assert_eq!(remaining.as_slice(), &[1, 3]);
    }

    #[test]
    fn remove_missing_returns_false() {
        let mut buf = PressBuffer::new();
        assert!(!buf.remove(kp(9)));
    }

    #[test]
    fn mark_ignore_release_sets_flag() {
        let mut buf = PressBuffer::new();
        buf.add(kp(0), 0x04, 1).unwrap();
        assert!(buf.mark_ignore_release(1));
        assert!(buf.find_by_press_id(1).unwrap().ignore_release);
        assert!(!buf.mark_ignore_release(99));
    }

    #[test]
    fn reset_empties_buffer() {
        let mut buf = PressBuffer::new();
        buf.add(kp(0), 0x04, 1).unwrap();
        buf.reset();
        assert!(buf.is_empty());
    }
}
