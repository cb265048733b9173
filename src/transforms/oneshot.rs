//! One-shot modifier: a virtual-chain key that latches a modifier set onto
//! exactly the next basic keycode, then clears itself.
//!
//! Grounded on the original one-shot modifier pipeline: modifiers accumulate
//! in a bitmask on each trigger press, get tapped around the next basic
//! keycode, and are cleared at the start of the following callback.

use crate::executor::{CallbackType, VirtualActions, VirtualCallbackParams, VirtualPipeline};
use crate::keycode::{Keycode, MOD_LALT, MOD_LCTL, MOD_LGUI, MOD_LSFT, MOD_RALT, MOD_RCTL, MOD_RGUI, MOD_RSFT};

/// HID keycodes for the eight standard modifier keys, in the same bit
/// order as the `MOD_*` constants in [`crate::keycode`].
const LCTL_KC: Keycode = 0xE0;
const LSFT_KC: Keycode = 0xE1;
const LALT_KC: Keycode = 0xE2;
const LGUI_KC: Keycode = 0xE3;
const RCTL_KC: Keycode = 0xE4;
const RSFT_KC: Keycode = 0xE5;
const RALT_KC: Keycode = 0xE6;
const RGUI_KC: Keycode = 0xE7;

const MOD_TABLE: [(u8, Keycode); 8] = [
    (MOD_LCTL, LCTL_KC),
    (MOD_LSFT, LSFT_KC),
    (MOD_LALT, LALT_KC),
    (MOD_LGUI, LGUI_KC),
    (MOD_RCTL, RCTL_KC),
    (MOD_RSFT, RSFT_KC),
    (MOD_RALT, RALT_KC),
    (MOD_RGUI, RGUI_KC),
];

/// Maximum number of distinct trigger keycodes one pipeline tracks.
pub const MAX_TRIGGERS: usize = 8;

/// Static configuration: which trigger keycodes latch which modifier bits.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct OneshotModifierConfig {
    /// `(trigger_keycode, modifier_bits)` pairs.
    pub triggers: [(Keycode, u8); MAX_TRIGGERS],
    /// How many entries of `triggers` are in use.
    pub trigger_count: usize,
}

impl OneshotModifierConfig {
    fn lookup(&self, keycode: Keycode) -> Option<u8> {
        self.triggers[..self.trigger_count]
            .iter()
            .find(|(kc, _)| *kc == keycode)
            .map(|(_, bits)| *bits)
    }
}

/// Latches a modifier bitmask from trigger presses onto the next basic
/// keycode typed.
pub struct OneshotModifierPipeline {
    config: OneshotModifierConfig,
    pending_modifiers: u8,
    applied: bool,
}

impl OneshotModifierPipeline {
    /// Build a fresh pipeline from `config`, with no modifiers pending.
    pub const fn new(config: OneshotModifierConfig) -> Self {
        OneshotModifierPipeline {
            config,
            pending_modifiers: 0,
            applied: false,
        }
    }

    fn release_applied(&mut self, actions: &mut VirtualActions) {
        if !self.applied {
            return;
        }
        for (bit, keycode) in MOD_TABLE {
            if self.pending_modifiers & bit != 0 {
                actions.add_untap(keycode);
            }
        }
        self.pending_modifiers = 0;
        self.applied = false;
    }

    fn apply(&mut self, actions: &mut VirtualActions) {
        for (bit, keycode) in MOD_TABLE {
            if self.pending_modifiers & bit != 0 {
                actions.add_tap(keycode);
            }
        }
        self.applied = true;
    }
}

impl VirtualPipeline for OneshotModifierPipeline {
    fn process(&mut self, params: &VirtualCallbackParams, actions: &mut VirtualActions) {
        self.release_applied(actions);

        if params.callback_type != CallbackType::KeyEvent {
            return;
        }

        if let Some(bits) = self.config.lookup(params.event.keycode) {
            if params.event.is_press {
                self.pending_modifiers |= bits;
            }
            return;
        }

        if self.pending_modifiers != 0
            && params.event.keycode <= 0xFF
            && params.event.is_press
        {
            self.apply(actions);
        }
    }

    fn reset(&mut self) {
        self.pending_modifiers = 0;
        self.applied = false;
    }
}
