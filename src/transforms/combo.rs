//! Combo: several keys pressed together within a window resolve to one
//! output keycode instead of their individual ones.
//!
//! The waiting/active bookkeeping follows the original combo pipeline's
//! `COMBO_WAITING_FOR_KEYS` / `COMBO_ACTIVE` split; `activate_combo` and
//! `process_active_combo`, only referenced by name in the source this was
//! distilled from, are given concrete bodies here.

use arrayvec::ArrayVec;

use crate::executor::{
    CallbackType, PhysicalActions, PhysicalCallbackParams, PhysicalPipeline, ReturnAction,
};
use crate::keycode::Keycode;
use crate::keypos::Keypos;
use crate::time::PlatformTime;

/// Maximum number of member keys in one combo.
pub const MAX_KEYS: usize = 4;

/// Static configuration for one combo.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ComboConfig {
    /// The member keys, all of which must be held together to activate.
    pub keys: [Keypos; MAX_KEYS],
    /// How many of `keys` are actually in use (the rest are ignored).
    pub key_count: usize,
    /// Keycode registered while the combo is active.
    pub output_keycode: Keycode,
    /// Milliseconds to wait for the remaining members before giving up.
    pub timeout: PlatformTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    WaitingForKeys,
    Active,
}

/// Tracks one combo's partial-press and activation state.
pub struct ComboPipeline {
    config: ComboConfig,
    state: State,
    pressed: [bool; MAX_KEYS],
}

impl ComboPipeline {
    /// Build a fresh, idle combo pipeline from `config`.
    pub const fn new(config: ComboConfig) -> Self {
        ComboPipeline {
            config,
            state: State::Idle,
            pressed: [false; MAX_KEYS],
        }
    }

    fn member_index(&self, keypos: Keypos) -> Option<usize> {
        self.config.keys[..self.config.key_count]
            .iter()
            .position(|k| *k == keypos)
    }

    fn all_pressed(&self) -> bool {
        self.pressed[..self.config.key_count].iter().all(|p| *p)
    }

    fn any_pressed(&self) -> bool {
        self.pressed[..self.config.key_count].iter().any(|p| *p)
    }

    fn activate_combo(&mut self, keypos: Keypos, actions: &mut PhysicalActions) {
        let mut consumed: ArrayVec<Keypos, MAX_KEYS> = ArrayVec::new();
        for k in &self.config.keys[..self.config.key_count] {
            if *k != keypos {
                consumed.push(*k);
            }
        }
        for k in consumed {
            actions.remove_physical_press_and_release(k);
        }
        actions.register(self.config.output_keycode);
        self.state = State::Active;
    }

    fn process_active_combo(&mut self, is_press: bool, actions: &mut PhysicalActions) {
        if !is_press {
            self.pressed = [false; MAX_KEYS];
            actions.unregister(self.config.output_keycode);
            self.state = State::Idle;
        }
    }
}

impl PhysicalPipeline for ComboPipeline {
    fn process(
        &mut self,
        params: &PhysicalCallbackParams,
        actions: &mut PhysicalActions,
    ) -> ReturnAction {
        if params.callback_type != CallbackType::KeyEvent {
            if self.state == State::WaitingForKeys {
                self.pressed = [false; MAX_KEYS];
                self.state = State::Idle;
                return ReturnAction::NoCapture;
            }
            return ReturnAction::MarkAsProcessed;
        }
        let Some(event) = params.event else {
            return ReturnAction::NoCapture;
        };

        match self.state {
            State::Active => {
                let Some(_) = self.member_index(event.keypos) else {
                    return ReturnAction::NoCapture;
                };
                self.process_active_combo(event.is_press, actions);
                ReturnAction::MarkAsProcessed
            }
            State::Idle | State::WaitingForKeys => {
                let Some(index) = self.member_index(event.keypos) else {
                    return ReturnAction::NoCapture;
                };
                if !event.is_press {
                    self.pressed[index] = false;
                    if !self.any_pressed() {
                        self.state = State::Idle;
                    }
                    return ReturnAction::NoCapture;
                }

                self.pressed[index] = true;
                self.state = State::WaitingForKeys;

                if self.all_pressed() {
                    self.activate_combo(event.keypos, actions);
                    ReturnAction::MarkAsProcessed
                } else {
                    ReturnAction::CaptureNextKeysOrCallbackOnTimeout(
                        params.callback_time.wrapping_add(self.config.timeout),
                    )
                }
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.pressed = [false; MAX_KEYS];
    }
}
