#![no_std]
#![cfg_attr(not(test), warn(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! Single-threaded input-processing core for programmable mechanical-keyboard
//! firmware: the event/press buffer pair, the pipeline executor, the layer
//! manager and the keycode taxonomy that every transformation plugin builds
//! on top of.

pub mod deferred;
pub mod error;
pub mod event_buffer;
pub mod executor;
pub mod keycode;
pub mod keymap;
pub mod keypos;
pub mod layer;
pub mod press_buffer;
pub mod reporter;
pub mod time;
pub mod transforms;
pub mod virtual_buffer;

pub use deferred::{DeferredScheduler, DeferredToken};
pub use error::{CoreError, CoreResult};
pub use event_buffer::{EventBuffer, EventRecord};
pub use executor::{
    PhysicalActions, PhysicalCallbackParams, PhysicalPipeline, PipelineExecutor, ReturnAction,
    VirtualActions, VirtualCallbackParams, VirtualPipeline,
};
pub use keycode::{Keycode, KeycodeInfo, KeycodeKind};
pub use keymap::Keymap;
pub use keypos::Keypos;
pub use layer::LayerManager;
pub use press_buffer::{PressBuffer, PressRecord};
pub use reporter::HidReporter;
pub use time::{PlatformTime, TimeExt};
pub use virtual_buffer::VirtualBuffer;
