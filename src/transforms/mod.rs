//! First-party pipeline implementations: the transformation plugins every
//! keymap is built from, each a concrete [`crate::executor::PhysicalPipeline`]
//! or [`crate::executor::VirtualPipeline`].

pub mod combo;
pub mod key_replacer;
pub mod oneshot;
pub mod tap_dance;

pub use combo::{ComboConfig, ComboPipeline};
pub use key_replacer::{KeyReplacerConfig, KeyReplacerPipeline};
pub use oneshot::{OneshotModifierConfig, OneshotModifierPipeline};
pub use tap_dance::{
    TapDanceAction, TapDanceConfig, TapDancePipeline, TapDanceResolution, MAX_TAP_ACTIONS,
};
