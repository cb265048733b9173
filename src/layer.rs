//! The layer manager: a stack of nested layer activations on top of a base
//! ("original") layer.
//!
//! Only popping the topmost entry (or the sole entry) changes the active
//! layer; popping a layer buried under others leaves the currently active
//! layer untouched, since a layer further down the stack was never active
//! to begin with.

use arrayvec::ArrayVec;

use crate::keypos::Keypos;

/// Fixed capacity of the nested-layer stack.
pub const CAPACITY: usize = 10;

/// One nested-layer activation, tracking which key pushed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerActivation {
    /// The key whose press pushed this layer.
    pub keypos: Keypos,
    /// The press id of that key, for correlation with the event buffer.
    pub press_id: u8,
    /// The layer this activation switches to.
    pub layer: u8,
}

/// Nested-layer stack plus the base layer.
#[derive(Debug)]
pub struct LayerManager {
    original_layer: u8,
    current_layer: u8,
    stack: ArrayVec<LayerActivation, CAPACITY>,
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerManager {
    /// A layer manager with layer 0 as both original and current, no
    /// nested activations.
    pub const fn new() -> Self {
        LayerManager {
            original_layer: 0,
            current_layer: 0,
            stack: ArrayVec::new_const(),
        }
    }

    /// The layer new key presses should resolve against.
    pub fn current_layer(&self) -> u8 {
        self.current_layer
    }

    /// The base layer (active when the nested stack is empty).
    pub fn original_layer(&self) -> u8 {
        self.original_layer
    }

    /// Set the base layer directly, clearing every nested activation.
    pub fn set_absolute_layer(&mut self, layer: u8) {
        self.original_layer = layer;
        self.stack.clear();
        self.current_layer = layer;
    }

    /// Push a nested layer activation, activating it immediately. No-ops if
    /// the stack is full (capacity exhaustion is logged and recovered, not
    /// surfaced as a `CoreError`).
    pub fn push_layer(&mut self, keypos: Keypos, press_id: u8, layer: u8) {
        if self.stack.is_full() {
            log::warn!("layer stack: capacity exhausted, dropping layer push");
            return;
        }
        self.stack.push(LayerActivation {
            keypos,
            press_id,
            layer,
        });
        self.current_layer = layer;
    }

    /// Remove the nested activation pushed by `keypos`, if any. Only
    /// changes the active layer when the removed entry was the sole entry
    /// (activates `original_layer`) or the topmost entry (activates the new
    /// top, i.e. the entry that was just beneath it).
    pub fn pop_layer_by_keypos(&mut self, keypos: Keypos) -> bool {
        let Some(index) = self.stack.iter().position(|a| a.keypos == keypos) else {
            return false;
        };
        let is_sole = self.stack.len() == 1;
        let is_top = index == self.stack.len() - 1;
        let new_active = if is_sole {
            Some(self.original_layer)
        } else if is_top {
            Some(self.stack[index - 1].layer)
        } else {
            None
        };
        self.stack.remove(index);
        if let Some(layer) = new_active {
            self.current_layer = layer;
        }
        true
    }

    /// Number of nested activations.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Clear every nested activation and reset to layer 0, matching
    /// firmware bringup.
    pub fn reset(&mut self) {
        self.original_layer = 0;
        self.current_layer = 0;
        self.stack.clear();
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
    fn fresh_manager_is_layer_zero() {
        let mgr = LayerManager::new();
        assert_eq!(mgr.current_layer(), 0);
    }

    #[test]
    fn push_activates_immediately() {
        let mut mgr = LayerManager::new();
        mgr.push_layer(kp(0), 1, 2);
        assert_eq!(mgr.current_layer(), 2);
    }

    #[test]
    fn pop_sole_entry_restores_original() {
        let mut mgr = LayerManager::new();
        mgr.push_layer(kp(0), 1, 2);
        assert!(mgr.pop_layer_by_keypos(kp(0)));
        assert_eq!(mgr.current_layer(), 0);
    }

    #[test]
    fn pop_top_activates_new_top() {
        let mut mgr = LayerManager::new();
        mgr.push_layer(kp(0), 1, 1);
        mgr.push_layer(kp(1), 2, 2);
        assert_eq!(mgr.current_layer(), 2);
        assert!(mgr.pop_layer_by_keypos(kp(1)));
        assert_eq!(mgr.current_layer(), 1);
    }

    #[test]
    fn pop_non_top_does_not_change_active_layer() {
        let mut mgr = LayerManager::new();
        mgr.push_layer(kp(0), 1, 1);
        mgr.push_layer(kp(1), 2, 2);
        mgr.push_layer(kp(2), 3, 3);
        assert_eq!(mgr.current_layer(), 3);
        assert!(mgr.pop_layer_by_keypos(kp(0)));
        assert_eq!(mgr.current_layer(), 3);
        assert_eq!(mgr.depth(), 2);
    }

    #[test]
    fn set_absolute_layer_clears_stack() {
        let mut mgr = LayerManager::new();
        mgr.push_layer(kp(0), 1, 1);
        mgr.set_absolute_layer(5);
        assert_eq!(mgr.current_layer(), 5);
        assert_eq!(mgr.original_layer(), 5);
        assert_eq!(mgr.depth(), 0);
    }

    #[test]
    fn pop_missing_keypos_returns_false() {
        let mut mgr = LayerManager::new();
        assert!(!mgr.pop_layer_by_keypos(kp(9)));
    }

    #[test]
    fn stack_capacity_is_enforced() {
        let mut mgr = LayerManager::new();
        for i in 0..CAPACITY as u16 {
            mgr.push_layer(kp(i), i as u8 + 1, 1);
        }
        assert_eq!(mgr.depth(), CAPACITY);
        mgr.push_layer(kp(200), 250, 9);
        assert_eq!(mgr.depth(), CAPACITY);
        assert_ne!(mgr.current_layer(), 9);
    }
}
