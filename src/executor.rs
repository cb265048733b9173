//! The pipeline executor: drives the physical and virtual pipeline chains,
//! owns every buffer, and implements the capture/timeout state machine.
//!
//! There is exactly one capture slot for the whole executor (mirroring the
//! original firmware's single `pipeline_index` / `deferred_exec_callback_token`
//! pair): at most one pipeline can be mid-capture at a time. A pipeline
//! starting a new capture while another's deferred callback is still
//! pending cancels the older one — pipelines are expected not to rely on
//! overlapping captures.

use arrayvec::ArrayVec;

use crate::deferred::{DeferredScheduler, DeferredToken};
use crate::error::{CoreError, CoreResult};
use crate::event_buffer::{EventBuffer, EventRecord};
use crate::keycode::Keycode;
use crate::keymap::Keymap;
use crate::keypos::Keypos;
use crate::layer::LayerManager;
use crate::reporter::HidReporter;
use crate::time::PlatformTime;
use crate::virtual_buffer::VirtualBuffer;

/// Whether a pipeline is being invoked for a live key event or a fired
/// deferred timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackType {
    /// A physical press or release just happened.
    KeyEvent,
    /// A previously scheduled deferred callback just fired.
    Timer,
}

/// What a physical pipeline decided to do with the event it was just
/// shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnAction {
    /// The event is fully handled; stop the chain, do not capture further
    /// events.
    MarkAsProcessed,
    /// This pipeline declines the event; continue to the next pipeline in
    /// the chain. If every pipeline declines, the executor forwards the
    /// event to the host unmodified (a bare keyboard with zero pipelines
    /// installed must still type).
    NoCapture,
    /// Pin this pipeline: every subsequent physical event is routed
    /// straight to it (bypassing the rest of the chain) until it returns
    /// anything other than this variant.
    CaptureNextKeys,
    /// The event is handled for now, but schedule a deferred callback at
    /// the given time; subsequent key events go through the normal chain,
    /// but the timer fire re-invokes this same pipeline.
    NoCaptureWithDeferredCallback(PlatformTime),
    /// Combine `CaptureNextKeys` with a deferred callback: pin this
    /// pipeline for both subsequent key events and the timer fire.
    CaptureNextKeysOrCallbackOnTimeout(PlatformTime),
}

/// What a physical pipeline is shown on each invocation.
#[derive(Debug, Clone, Copy)]
pub struct PhysicalCallbackParams {
    /// The event being processed, or `None` on a timer fire with no
    /// associated key event.
    pub event: Option<EventRecord>,
    /// Whether this call is for a key event or a timer fire.
    pub callback_type: CallbackType,
    /// The time of the event, or of the timer fire.
    pub callback_time: PlatformTime,
}

/// What a virtual pipeline is shown on each invocation.
#[derive(Debug, Clone, Copy)]
pub struct VirtualCallbackParams {
    /// The virtual event being processed.
    pub event: crate::virtual_buffer::VirtualEvent,
    /// Always `KeyEvent`: the virtual chain is not timer-driven.
    pub callback_type: CallbackType,
    /// The time of the originating physical event.
    pub callback_time: PlatformTime,
}

/// The side effects a physical pipeline may produce, borrowing every
/// buffer it is allowed to touch for the duration of one callback.
pub struct PhysicalActions<'e> {
    pub(crate) event_buffer: &'e mut EventBuffer,
    pub(crate) virtual_buffer: &'e mut VirtualBuffer,
    pub(crate) layer: &'e mut LayerManager,
    pub(crate) keymap: &'e dyn Keymap,
}

impl<'e> PhysicalActions<'e> {
    /// Emit a virtual press for `keycode`.
    pub fn register(&mut self, keycode: Keycode) {
        self.virtual_buffer.add_press(keycode);
    }

    /// Emit a virtual release for `keycode`.
    pub fn unregister(&mut self, keycode: Keycode) {
        self.virtual_buffer.add_release(keycode);
    }

    /// Emit a virtual press immediately followed by a virtual release.
    pub fn tap(&mut self, keycode: Keycode) {
        self.virtual_buffer.add_press(keycode);
        self.virtual_buffer.add_release(keycode);
    }

    /// Make a physical press/release pair (by keypos) disappear from both
    /// the press buffer and the event history, e.g. a consumed combo
    /// member.
    pub fn remove_physical_press_and_release(&mut self, keypos: Keypos) {
        self.event_buffer.remove_physical_press_and_release(keypos);
    }

    /// Push a nested layer activation.
    pub fn push_layer(&mut self, keypos: Keypos, press_id: u8, layer: u8) {
        self.layer.push_layer(keypos, press_id, layer);
    }

    /// Pop the nested layer activation pushed by `keypos`.
    pub fn pop_layer(&mut self, keypos: Keypos) -> bool {
        self.layer.pop_layer_by_keypos(keypos)
    }

    /// Recompute the keycode of every event from `from_pos` onward against
    /// `layer`.
    pub fn update_layer_for_physical_events(&mut self, layer: u8, from_pos: usize) {
        self.event_buffer
            .update_layer_for_physical_events(layer, from_pos, self.keymap);
    }

    /// The layer currently in effect.
    pub fn current_layer(&self) -> u8 {
        self.layer.current_layer()
    }

    /// Read-only access to the event history, for pattern matching.
    pub fn event_buffer(&self) -> &EventBuffer {
        self.event_buffer
    }

    /// Remove the press event with this id from the history.
    pub fn remove_press_event_by_press_id(&mut self, press_id: u8) {
        self.event_buffer.remove_press_event_by_press_id(press_id);
    }

    /// Remove the release event with this id, falling back to suppressing
    /// the eventual release if it hasn't happened yet.
    pub fn remove_release_event_by_press_id(&mut self, press_id: u8) {
        self.event_buffer.remove_release_event_by_press_id(press_id);
    }

    /// Overwrite the keycode recorded for a press/release pair.
    pub fn change_keycode(&mut self, press_id: u8, keycode: Keycode) {
        self.event_buffer.change_keycode(press_id, keycode);
    }
}

/// The side effects a virtual pipeline may produce.
pub struct VirtualActions<'e> {
    pub(crate) virtual_buffer: &'e mut VirtualBuffer,
}

impl<'e> VirtualActions<'e> {
    /// Emit a further virtual press (e.g. wrapping a modifier around the
    /// event just seen).
    pub fn add_tap(&mut self, keycode: Keycode) {
        self.virtual_buffer.add_press(keycode);
    }

    /// Emit a further virtual release.
    pub fn add_untap(&mut self, keycode: Keycode) {
        self.virtual_buffer.add_release(keycode);
    }
}

/// A first-party or host-provided physical-chain transformation.
pub trait PhysicalPipeline {
    /// Handle one physical event or timer fire.
    fn process(
        &mut self,
        params: &PhysicalCallbackParams,
        actions: &mut PhysicalActions,
    ) -> ReturnAction;

    /// Clear any internal state, e.g. on a firmware-level reset.
    fn reset(&mut self) {}
}

/// A first-party or host-provided virtual-chain transformation.
pub trait VirtualPipeline {
    /// Handle one virtual event.
    fn process(&mut self, params: &VirtualCallbackParams, actions: &mut VirtualActions);

    /// Clear any internal state.
    fn reset(&mut self) {}
}

#[derive(Debug, Clone, Copy)]
struct CaptureState {
    pipeline_index: usize,
    captures_keys: bool,
    deferred_token: Option<DeferredToken>,
}

/// Drives the physical and virtual pipeline chains over a fixed number of
/// pipeline slots (`NP` physical, `NV` virtual), reserved at construction.
pub struct PipelineExecutor<'a, const NP: usize, const NV: usize, D, R>
where
    D: DeferredScheduler,
    R: HidReporter,
{
    physical: ArrayVec<&'a mut dyn PhysicalPipeline, NP>,
    virtual_pipelines: ArrayVec<&'a mut dyn VirtualPipeline, NV>,
    event_buffer: EventBuffer,
    virtual_buffer: VirtualBuffer,
    layer: LayerManager,
    keymap: &'a dyn Keymap,
    scheduler: D,
    reporter: R,
    capture: Option<CaptureState>,
    last_reported_layer: u8,
}

impl<'a, const NP: usize, const NV: usize, D, R> PipelineExecutor<'a, NP, NV, D, R>
where
    D: DeferredScheduler,
    R: HidReporter,
{
    /// Build an executor with no pipelines installed yet. `keymap` must
    /// outlive the executor.
    pub fn new(keymap: &'a dyn Keymap, scheduler: D, reporter: R) -> Self {
        PipelineExecutor {
            physical: ArrayVec::new(),
            virtual_pipelines: ArrayVec::new(),
            event_buffer: EventBuffer::new(),
            virtual_buffer: VirtualBuffer::new(),
            layer: LayerManager::new(),
            keymap,
            scheduler,
            reporter,
            capture: None,
            last_reported_layer: 0,
        }
    }

    /// Install a physical pipeline at the next free slot.
    pub fn add_physical_pipeline(
        &mut self,
        pipeline: &'a mut dyn PhysicalPipeline,
    ) -> CoreResult<()> {
        if self.physical.is_full() {
            return Err(CoreError::TooManyPipelines {
                requested: self.physical.len() + 1,
                capacity: NP,
            });
        }
        self.physical.push(pipeline);
        Ok(())
    }

    /// Install a virtual pipeline at the next free slot.
    pub fn add_virtual_pipeline(
        &mut self,
        pipeline: &'a mut dyn VirtualPipeline,
    ) -> CoreResult<()> {
        if self.virtual_pipelines.is_full() {
            return Err(CoreError::TooManyPipelines {
                requested: self.virtual_pipelines.len() + 1,
                capacity: NV,
            });
        }
        self.virtual_pipelines.push(pipeline);
        Ok(())
    }

    /// Read-only access to the event history.
    pub fn event_buffer(&self) -> &EventBuffer {
        &self.event_buffer
    }

    /// Read-only access to the layer manager.
    pub fn layer_manager(&self) -> &LayerManager {
        &self.layer
    }

    /// Read-only access to the reporter, for host-side introspection and
    /// tests.
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// The scanner's single entry point: a physical press or release at
    /// `keypos` and `time`.
    pub fn process_key(&mut self, time: PlatformTime, keypos: Keypos, pressed: bool) {
        let layer = self.layer.current_layer();
        let record = if pressed {
            let press_id = self
                .event_buffer
                .add_physical_press(time, keypos, layer, self.keymap);
            if press_id == 0 {
                return;
            }
            self.last_event()
        } else {
            if !self.event_buffer.add_physical_release(time, keypos) {
                return;
            }
            self.last_event()
        };
        let Some(record) = record else {
            return;
        };

        self.run_key_event(record, time);
        self.drain_virtual_chain(time);
        self.report_layer_change();
    }

    /// Fire the deferred callback scheduled for `time`. A no-op if no
    /// capture is pending, or if the pending capture has no deferred token
    /// (idempotent: a stale or duplicate fire changes nothing).
    pub fn on_timer(&mut self, time: PlatformTime) {
        let Some(capture) = self.capture else {
            return;
        };
        if capture.deferred_token.is_none() {
            return;
        }
        let action = self.dispatch_physical(capture.pipeline_index, None, CallbackType::Timer, time);
        self.apply_return_action(capture.pipeline_index, action);
        self.drain_virtual_chain(time);
        self.report_layer_change();
    }

    fn last_event(&self) -> Option<EventRecord> {
        if self.event_buffer.is_empty() {
            return None;
        }
        self.event_buffer.get(self.event_buffer.len() - 1).copied()
    }

    fn run_key_event(&mut self, record: EventRecord, time: PlatformTime) {
        let resume = self
            .capture
            .filter(|c| c.captures_keys)
            .map(|c| c.pipeline_index);

        if let Some(index) = resume {
            let action = self.dispatch_physical(index, Some(record), CallbackType::KeyEvent, time);
            self.apply_return_action(index, action);
            self.truncate_if_processed(record);
            return;
        }

        for index in 0..self.physical.len() {
            let action = self.dispatch_physical(index, Some(record), CallbackType::KeyEvent, time);
            let declined = matches!(action, ReturnAction::NoCapture);
            self.apply_return_action(index, action);
            if !declined {
                self.truncate_if_processed(record);
                return;
            }
        }

        self.default_passthrough(record);
        self.truncate_if_processed(record);
    }

    /// Drop `record` from the event history once no pipeline is holding a
    /// capture over it: a fully-processed event will never be replayed
    /// again, so there is no reason to keep it in the bounded history
    /// (§4.7.4). Left alone while a capture is pending, since a capturing
    /// pipeline may still scan this record on a later callback.
    fn truncate_if_processed(&mut self, record: EventRecord) {
        if self.capture.is_some() {
            return;
        }
        if record.is_press {
            self.event_buffer.remove_press_event_by_press_id(record.press_id);
        } else {
            self.event_buffer.remove_release_event_by_press_id(record.press_id);
        }
    }

    fn default_passthrough(&mut self, record: EventRecord) {
        if record.is_press {
            self.virtual_buffer.add_press(record.keycode);
        } else {
            self.virtual_buffer.add_release(record.keycode);
        }
    }

    fn dispatch_physical(
        &mut self,
        index: usize,
        event: Option<EventRecord>,
        callback_type: CallbackType,
        time: PlatformTime,
    ) -> ReturnAction {
        let params = PhysicalCallbackParams {
            event,
            callback_type,
            callback_time: time,
        };
        let mut actions = PhysicalActions {
            event_buffer: &mut self.event_buffer,
            virtual_buffer: &mut self.virtual_buffer,
            layer: &mut self.layer,
            keymap: self.keymap,
        };
        let pipeline = self
            .physical
            .get_mut(index)
            .expect("dispatch_physical called with an installed pipeline index");
        pipeline.process(&params, &mut actions)
    }

    fn apply_return_action(&mut self, index: usize, action: ReturnAction) {
        if let Some(old) = self.capture.take() {
            if let Some(token) = old.deferred_token {
                log::trace!("executor: canceling superseded deferred callback");
                self.scheduler.cancel(token);
            }
        }
        self.capture = match action {
            ReturnAction::MarkAsProcessed | ReturnAction::NoCapture => None,
            ReturnAction::CaptureNextKeys => {
                log::trace!("executor: pipeline {index} captured key events");
                Some(CaptureState {
                    pipeline_index: index,
                    captures_keys: true,
                    deferred_token: None,
                })
            }
            ReturnAction::CaptureNextKeysOrCallbackOnTimeout(at) => {
                let token = self.scheduler.schedule(at);
                log::trace!("executor: pipeline {index} captured key events and a timeout");
                Some(CaptureState {
                    pipeline_index: index,
                    captures_keys: true,
                    deferred_token: Some(token),
                })
            }
            ReturnAction::NoCaptureWithDeferredCallback(at) => {
                let token = self.scheduler.schedule(at);
                log::trace!("executor: pipeline {index} scheduled a deferred callback");
                Some(CaptureState {
                    pipeline_index: index,
                    captures_keys: false,
                    deferred_token: Some(token),
                })
            }
        };
    }

    fn drain_virtual_chain(&mut self, time: PlatformTime) {
        let mut index = 0;
        while index < self.virtual_buffer.len() {
            let event = *self
                .virtual_buffer
                .get(index)
                .expect("index bounded by the loop condition");
            for pipeline in self.virtual_pipelines.iter_mut() {
                let params = VirtualCallbackParams {
                    event,
                    callback_type: CallbackType::KeyEvent,
                    callback_time: time,
                };
                let mut actions = VirtualActions {
                    virtual_buffer: &mut self.virtual_buffer,
                };
                pipeline.process(&params, &mut actions);
            }
            index += 1;
        }

        for event in self.virtual_buffer.iter() {
            if event.is_press {
                self.reporter.register_key(event.keycode);
            } else {
                self.reporter.unregister_key(event.keycode);
            }
        }
        self.virtual_buffer.reset();
    }

    fn report_layer_change(&mut self) {
        let layer = self.layer.current_layer();
        if layer != self.last_reported_layer {
            self.reporter.set_active_layer(layer);
            self.last_reported_layer = layer;
        }
    }

    /// Reset every pipeline, buffer and layer activation, as on firmware
    /// bringup.
    pub fn reset(&mut self) {
        self.event_buffer.reset();
        self.virtual_buffer.reset();
        self.layer.reset();
        self.capture = None;
        self.last_reported_layer = 0;
        for pipeline in self.physical.iter_mut() {
            pipeline.reset();
        }
        for pipeline in self.virtual_pipelines.iter_mut() {
            pipeline.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::test_support::FakeScheduler;
    use crate::keymap::FlatKeymap;
    use crate::reporter::test_support::{FakeReporter, ReportedEvent};

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
        static LAYER0: &[Keycode] = &[0x04, 0x05, 0x06];
        FlatKeymap::new(&[LAYER0]).unwrap()
    }

    #[test]
    fn zero_pipelines_still_types() {
        let km = keymap();
        let mut exec: PipelineExecutor<0, 0, _, _> =
            PipelineExecutor::new(&km, FakeScheduler::new(), FakeReporter::new());
        exec.process_key(0, kp(0), true);
        exec.process_key(10, kp(0), false);
        assert_eq!(
            exec.reporter.events.as_slice(),
            &[
                ReportedEvent::Register(0x04),
                ReportedEvent::Unregister(0x04),
            ]
        );
    }

    struct MarkProcessedPipeline;
    impl PhysicalPipeline for MarkProcessedPipeline {
        fn process(
            &mut self,
            _params: &PhysicalCallbackParams,
            _actions: &mut PhysicalActions,
        ) -> ReturnAction {
            ReturnAction::MarkAsProcessed
        }
    }

    #[test]
    fn mark_as_processed_suppresses_passthrough() {
        let km = keymap();
        let mut pipeline = MarkProcessedPipeline;
        let mut exec: PipelineExecutor<1, 0, _, _> =
            PipelineExecutor::new(&km, FakeScheduler::new(), FakeReporter::new());
        exec.add_physical_pipeline(&mut pipeline).unwrap();
        exec.process_key(0, kp(0), true);
        assert!(exec.reporter.events.is_empty());
    }

    struct CaptureOncePipeline {
        captured: bool,
    }
    impl PhysicalPipeline for CaptureOncePipeline {
        fn process(
            &mut self,
            params: &PhysicalCallbackParams,
            _actions: &mut PhysicalActions,
        ) -> ReturnAction {
            if !self.captured {
                self.captured = true;
                return ReturnAction::CaptureNextKeys;
            }
            let _ = params;
            ReturnAction::MarkAsProcessed
        }
    }

    #[test]
    fn capture_next_keys_routes_subsequent_events_to_same_pipeline() {
        let km = keymap();
        let mut pipeline = CaptureOncePipeline { captured: false };
        let mut exec: PipelineExecutor<1, 0, _, _> =
            PipelineExecutor::new(&km, FakeScheduler::new(), FakeReporter::new());
        exec.add_physical_pipeline(&mut pipeline).unwrap();
        exec.process_key(0, kp(0), true);
        exec.process_key(1, kp(1), true);
        // neither event reaches the default passthrough: the first press
        // captures, the second is routed straight to the same pipeline.
        assert!(exec.reporter.events.is_empty());
    }

    struct TimeoutPipeline;
    impl PhysicalPipeline for TimeoutPipeline {
        fn process(
            &mut self,
            params: &PhysicalCallbackParams,
            _actions: &mut PhysicalActions,
        ) -> ReturnAction {
            match params.callback_type {
                CallbackType::KeyEvent => {
                    ReturnAction::CaptureNextKeysOrCallbackOnTimeout(200)
                }
                CallbackType::Timer => ReturnAction::MarkAsProcessed,
            }
        }
    }

    #[test]
    fn timer_fire_reenters_captured_pipeline() {
        let km = keymap();
        let mut pipeline = TimeoutPipeline;
        let mut exec: PipelineExecutor<1, 0, _, _> =
            PipelineExecutor::new(&km, FakeScheduler::new(), FakeReporter::new());
        exec.add_physical_pipeline(&mut pipeline).unwrap();
        exec.process_key(0, kp(0), true);
        assert!(exec.capture.is_some());
        exec.on_timer(200);
        assert!(exec.capture.is_none());
    }
}
