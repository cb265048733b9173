//! Tap-dance: one physical key resolves to a tap or hold outcome depending
//! on timing, and each outcome may be a keycode or a layer push, indexed by
//! how many times in a row the key has been tapped.
//!
//! The phase enum and threshold bookkeeping follow the teacher's tap-hold
//! state machine; unlike the teacher's standalone state object this is
//! wired directly into the pipeline executor as a [`PhysicalPipeline`], so
//! resolution is driven by `ReturnAction` rather than polled externally.

use crate::executor::{
    CallbackType, PhysicalActions, PhysicalCallbackParams, PhysicalPipeline, ReturnAction,
};
use crate::keycode::Keycode;
use crate::keypos::Keypos;
use crate::time::PlatformTime;

/// How many distinct tap-count outcomes one pipeline can hold.
pub const MAX_TAP_ACTIONS: usize = 3;

/// How a tap-dance key decides between its tap and hold outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TapDanceResolution {
    /// Always resolves to hold once the threshold elapses, even if the key
    /// is released first (early release still becomes a hold).
    HoldPreferred,
    /// Resolves to tap unless another key is pressed while this one is
    /// still held (a following keystroke is read as confirmation the user
    /// meant to hold).
    TapPreferred,
    /// Resolves to hold as soon as another key is pressed while this one is
    /// still held, regardless of elapsed time; resolves to tap on release
    /// before the threshold with no interrupting key.
    Balanced,
}

/// What a resolved tap-dance outcome emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TapDanceAction {
    /// Tap (or, for a hold, register/unregister) this keycode.
    Key(Keycode),
    /// Push this layer; popped again on release for a hold outcome, or
    /// pushed then immediately popped for a tap outcome.
    Layer(u8),
}

/// Static configuration for one tap-dance key.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct TapDanceConfig {
    /// The physical key this pipeline governs.
    pub keypos: Keypos,
    /// `tap_actions[n - 1]` is the outcome for `n` consecutive taps. Once
    /// the configured entries run out, the highest configured count
    /// repeats.
    pub tap_actions: [Option<TapDanceAction>; MAX_TAP_ACTIONS],
    /// Outcome applied once `hold_timeout` elapses before release.
    pub hold_action: TapDanceAction,
    /// Milliseconds to wait for an additional tap before committing to the
    /// tap count reached so far.
    pub tap_timeout: PlatformTime,
    /// Milliseconds held before a hold resolves on its own.
    pub hold_timeout: PlatformTime,
    /// Resolution strategy for ambiguous (not yet timed out) interruptions.
    pub resolution: TapDanceResolution,
}

impl TapDanceConfig {
    fn action_for_count(&self, tap_count: usize) -> Option<TapDanceAction> {
        let idx = tap_count.saturating_sub(1).min(MAX_TAP_ACTIONS - 1);
        self.tap_actions[..=idx].iter().rev().find_map(|a| *a)
    }

    fn has_action_for(&self, tap_count: usize) -> bool {
        tap_count < MAX_TAP_ACTIONS && self.tap_actions[tap_count].is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pending {
        press_time: PlatformTime,
        tap_count: usize,
        press_id: u8,
    },
    WaitingForNextTap {
        tap_count: usize,
    },
    Held,
}

/// Resolves one tap-dance key to a tap-count-indexed keycode/layer outcome
/// or to its hold outcome.
pub struct TapDancePipeline {
    config: TapDanceConfig,
    phase: Phase,
}

impl TapDancePipeline {
    /// Build a fresh, idle tap-dance pipeline from `config`.
    pub const fn new(config: TapDanceConfig) -> Self {
        TapDancePipeline {
            config,
            phase: Phase::Idle,
        }
    }

    fn emit_tap(&self, tap_count: usize, actions: &mut PhysicalActions) {
        match self.config.action_for_count(tap_count) {
            Some(TapDanceAction::Key(keycode)) => actions.tap(keycode),
            Some(TapDanceAction::Layer(layer)) => {
                actions.push_layer(self.config.keypos, 0, layer);
                actions.pop_layer(self.config.keypos);
            }
            None => {}
        }
    }

    fn apply_hold_press(&self, press_id: u8, actions: &mut PhysicalActions) {
        match self.config.hold_action {
            TapDanceAction::Key(keycode) => actions.register(keycode),
            TapDanceAction::Layer(layer) => {
                actions.push_layer(self.config.keypos, press_id, layer)
            }
        }
    }

    fn apply_hold_release(&self, actions: &mut PhysicalActions) {
        match self.config.hold_action {
            TapDanceAction::Key(keycode) => actions.unregister(keycode),
            TapDanceAction::Layer(_) => {
                actions.pop_layer(self.config.keypos);
            }
        }
    }
}

impl PhysicalPipeline for TapDancePipeline {
    fn process(
        &mut self,
        params: &PhysicalCallbackParams,
        actions: &mut PhysicalActions,
    ) -> ReturnAction {
        match params.callback_type {
            CallbackType::KeyEvent => {
                let Some(event) = params.event else {
                    return ReturnAction::NoCapture;
                };

                match self.phase {
                    Phase::Idle => {
                        if !event.is_press || event.keypos != self.config.keypos {
                            return ReturnAction::NoCapture;
                        }
                        self.phase = Phase::Pending {
                            press_time: params.callback_time,
                            tap_count: 1,
                            press_id: event.press_id,
                        };
                        ReturnAction::CaptureNextKeysOrCallbackOnTimeout(
                            params.callback_time.wrapping_add(self.config.hold_timeout),
                        )
                    }
                    Phase::Pending {
                        press_time,
                        tap_count,
                        press_id,
                    } => {
                        if event.keypos == self.config.keypos && !event.is_press {
                            if self.config.has_action_for(tap_count) {
                                self.phase = Phase::WaitingForNextTap { tap_count };
                                return ReturnAction::CaptureNextKeysOrCallbackOnTimeout(
                                    params.callback_time.wrapping_add(self.config.tap_timeout),
                                );
                            }
                            self.emit_tap(tap_count, actions);
                            self.phase = Phase::Idle;
                            return ReturnAction::MarkAsProcessed;
                        }

                        // A different key arrived while still pending.
                        match self.config.resolution {
                            TapDanceResolution::TapPreferred => {
                                ReturnAction::CaptureNextKeysOrCallbackOnTimeout(
                                    press_time.wrapping_add(self.config.hold_timeout),
                                )
                            }
                            TapDanceResolution::Balanced | TapDanceResolution::HoldPreferred => {
                                self.apply_hold_press(press_id, actions);
                                self.phase = Phase::Held;
                                ReturnAction::MarkAsProcessed
                            }
                        }
                    }
                    Phase::WaitingForNextTap { tap_count } => {
                        if event.keypos == self.config.keypos && event.is_press {
                            self.phase = Phase::Pending {
                                press_time: params.callback_time,
                                tap_count: tap_count + 1,
                                press_id: event.press_id,
                            };
                            return ReturnAction::CaptureNextKeysOrCallbackOnTimeout(
                                params.callback_time.wrapping_add(self.config.hold_timeout),
                            );
                        }
                        // Any other event settles the tap count reached so far.
                        self.emit_tap(tap_count, actions);
                        self.phase = Phase::Idle;
                        ReturnAction::MarkAsProcessed
                    }
                    Phase::Held => {
                        if event.keypos == self.config.keypos && !event.is_press {
                            self.apply_hold_release(actions);
                            self.phase = Phase::Idle;
                            return ReturnAction::MarkAsProcessed;
                        }
                        ReturnAction::NoCapture
                    }
                }
            }
            CallbackType::Timer => {
                match self.phase {
                    Phase::Pending { press_id, .. } => {
                        self.apply_hold_press(press_id, actions);
                        self.phase = Phase::Held;
                    }
                    Phase::WaitingForNextTap { tap_count } => {
                        self.emit_tap(tap_count, actions);
                        self.phase = Phase::Idle;
                    }
                    Phase::Idle | Phase::Held => {}
                }
                ReturnAction::MarkAsProcessed
            }
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
    }
}
