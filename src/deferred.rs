//! The deferred-execution boundary: scheduling and cancelling a single
//! timer callback that re-enters the pipeline executor.
//!
//! The core never owns a real timer; it is handed a scheduler by the host
//! (the platform's timer source, out of scope per `SPEC_FULL.md` §1) and
//! only ever holds an opaque token identifying the pending callback.

use crate::time::PlatformTime;

/// An opaque handle to a scheduled deferred callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredToken(pub u32);

/// Host-provided deferred-execution boundary.
///
/// Implementations must make `cancel` idempotent: canceling a token whose
/// callback has already fired (or that was never scheduled) must not panic
/// and must not double-fire anything.
pub trait DeferredScheduler {
    /// Schedule a callback to fire at `at`. The returned token is later
    /// passed back to [`Self::cancel`] if the capture that requested it
    /// resolves before the timeout.
    fn schedule(&mut self, at: PlatformTime) -> DeferredToken;

    /// Cancel a previously scheduled callback. A no-op if it already fired
    /// or was already canceled.
    fn cancel(&mut self, token: DeferredToken);
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use super::*;
    use arrayvec::ArrayVec;

    /// An in-memory scheduler for unit/integration tests: records
    /// schedule/cancel calls instead of driving a real timer.
    #[derive(Debug, Default)]
    pub struct FakeScheduler {
        next_id: u32,
        pending: ArrayVec<(DeferredToken, PlatformTime), 8>,
        canceled: ArrayVec<DeferredToken, 8>,
    }

    impl FakeScheduler {
        pub fn new() -> Self {
            FakeScheduler::default()
        }

        pub fn is_pending(&self, token: DeferredToken) -> bool {
            self.pending.iter().any(|(t, _)| *t == token) && !self.canceled.contains(&token)
        }
    }

    impl DeferredScheduler for FakeScheduler {
        fn schedule(&mut self, at: PlatformTime) -> DeferredToken {
            let token = DeferredToken(self.next_id);
            self.next_id += 1;
            let _ = self.pending.try_push((token, at));
            token
        }

        fn cancel(&mut self, token: DeferredToken) {
            let _ = self.canceled.try_push(token);
        }
    }
}
