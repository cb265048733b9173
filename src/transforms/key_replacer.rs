//! Key replacer: substitutes one trigger keycode for a fixed sequence of
//! output keycodes, 1:N, on both press and release.
//!
//! Grounded directly on the original key replacer pipeline: a press of the
//! trigger registers every configured output keycode, a release
//! unregisters them, in the same order.

use arrayvec::ArrayVec;

use crate::executor::{CallbackType, VirtualActions, VirtualCallbackParams, VirtualPipeline};
use crate::keycode::Keycode;

/// Maximum number of output keycodes one substitution may expand to.
pub const MAX_OUTPUTS: usize = 6;
/// Maximum number of distinct trigger keycodes one pipeline tracks.
pub const MAX_TRIGGERS: usize = 8;

/// One trigger keycode and the keycodes it expands to.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct KeyReplacement {
    /// The keycode that triggers the substitution.
    pub trigger: Keycode,
    /// Output keycodes, registered/unregistered in this order.
    pub outputs: [Keycode; MAX_OUTPUTS],
    /// How many of `outputs` are in use.
    pub output_count: usize,
}

/// Static configuration for one key-replacer pipeline.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct KeyReplacerConfig {
    /// The configured substitutions.
    pub replacements: [KeyReplacement; MAX_TRIGGERS],
    /// How many of `replacements` are in use.
    pub replacement_count: usize,
}

impl KeyReplacerConfig {
    fn lookup(&self, keycode: Keycode) -> Option<&KeyReplacement> {
        self.replacements[..self.replacement_count]
            .iter()
            .find(|r| r.trigger == keycode)
    }
}

/// Expands trigger keycodes into their configured output sequence.
pub struct KeyReplacerPipeline {
    config: KeyReplacerConfig,
}

impl KeyReplacerPipeline {
    /// Build a pipeline from `config`.
    pub const fn new(config: KeyReplacerConfig) -> Self {
        KeyReplacerPipeline { config }
    }
}

impl VirtualPipeline for KeyReplacerPipeline {
    fn process(&mut self, params: &VirtualCallbackParams, actions: &mut VirtualActions) {
        if params.callback_type != CallbackType::KeyEvent {
            return;
        }
        let Some(replacement) = self.config.lookup(params.event.keycode) else {
            return;
        };
        let outputs: ArrayVec<Keycode, MAX_OUTPUTS> =
            replacement.outputs[..replacement.output_count]
                .iter()
                .copied()
                .collect();
        if params.event.is_press {
            for keycode in outputs {
                actions.add_tap(keycode);
            }
        } else {
            for keycode in outputs {
                actions.add_untap(keycode);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_buffer::{VirtualBuffer, VirtualEvent};

    fn config() -> KeyReplacerConfig {
        let mut outputs = [0; MAX_OUTPUTS];
        outputs[0] = 0x04;
        outputs[1] = 0x05;
        let replacement = KeyReplacement {
            trigger: 0x20_0000,
            outputs,
            output_count: 2,
        };
        let mut replacements = [KeyReplacement {
            trigger: 0,
            outputs: [0; MAX_OUTPUTS],
            output_count: 0,
        }; MAX_TRIGGERS];
        replacements[0] = replacement;
        KeyReplacerConfig {
            replacements,
            replacement_count: 1,
        }
    }

    #[test]
    fn press_expands_to_configured_sequence() {
        let mut pipeline = KeyReplacerPipeline::new(config());
        let mut virt = VirtualBuffer::new();
        let params = VirtualCallbackParams {
            event: VirtualEvent {
                keycode: 0x20_0000,
                is_press: true,
            },
            callback_type: CallbackType::KeyEvent,
            callback_time: 0,
        };
        let mut actions = VirtualActions {
            virtual_buffer: &mut virt,
        };
        pipeline.process(&params, &mut actions);
        let events: ArrayVec<_, 4> = virt.iter().copied().collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_press));
        assert_eq!(events[0].keycode, 0x04);
        assert_eq!(events[1].keycode, 0x05);
    }

    #[test]
    fn release_unregisters_in_same_order() {
        let mut pipeline = KeyReplacerPipeline::new(config());
        let mut virt = VirtualBuffer::new();
        let params = VirtualCallbackParams {
            event: VirtualEvent {
                keycode: 0x20_0000,
                is_press: false,
            },
            callback_type: CallbackType::KeyEvent,
            callback_time: 0,
        };
        let mut actions = VirtualActions {
            virtual_buffer: &mut virt,
        };
        pipeline.process(&params, &mut actions);
        let events: ArrayVec<_, 4> = virt.iter().copied().collect();
        assert!(events.iter().all(|e| !e.is_press));
    }

    #[test]
    fn non_trigger_keycode_is_untouched() {
        let mut pipeline = KeyReplacerPipeline::new(config());
        let mut virt = VirtualBuffer::new();
        let params = VirtualCallbackParams {
            event: VirtualEvent {
                keycode: 0x05,
                is_press: true,
            },
            callback_type: CallbackType::KeyEvent,
            callback_time: 0,
        };
        let mut actions = VirtualActions {
            virtual_buffer: &mut virt,
        };
        pipeline.process(&params, &mut actions);
        assert!(virt.is_empty());
    }
}
