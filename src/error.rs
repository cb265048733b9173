//! Error types for keyrx_core.
//!
//! Only configuration-time and programmer-error conditions are routed
//! through `CoreError`. Capacity exhaustion, misfires and out-of-range
//! lookups at runtime are recovered locally (see each module's doc comment)
//! and never appear here.

/// Core library error type.
///
/// Every field is a `&'static str` rather than an owned `String`: this crate
/// is `no_std` without `alloc`, so error messages are always literals chosen
/// at the call site, not formatted at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A fallible constructor observed a state that should be unreachable.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: &'static str,
    },

    /// A configuration value failed validation.
    #[error("validation error in '{field}': {reason}")]
    Validation {
        /// Field that failed validation.
        field: &'static str,
        /// Reason for the failure.
        reason: &'static str,
    },

    /// The pipeline executor was configured with more pipelines than slots
    /// reserved at construction.
    #[error("pipeline slot count exceeded: requested {requested}, capacity {capacity}")]
    TooManyPipelines {
        /// Number of pipelines the caller tried to install.
        requested: usize,
        /// Fixed capacity of the executor's pipeline array.
        capacity: usize,
    },

    /// A keymap was constructed with dimensions that cannot address any
    /// keypos (zero rows, zero columns, or zero layers).
    #[error("invalid keymap dimensions: {message}")]
    InvalidKeymapDimensions {
        /// Description of the invalid dimension.
        message: &'static str,
    },
}

/// Result type alias for core library operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_message() {
        let err = CoreError::InvalidState {
            message: "layer stack already full",
        };
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[test]
    fn too_many_pipelines_carries_counts() {
        let err = CoreError::TooManyPipelines {
            requested: 5,
            capacity: 3,
        };
        match err {
            CoreError::TooManyPipelines {
                requested,
                capacity,
            } => {
                assert_eq!(requested, 5);
                assert_eq!(capacity, 3);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn core_result_ok() {
        fn returns_ok() -> CoreResult<i32> {
            Ok(42)
        }
        assert_eq!(returns_ok().unwrap(), 42);
    }

    #[test]
    fn core_result_err() {
        fn returns_err() -> CoreResult<i32> {
            Err(CoreError::Validation {
                field: "tap_timeout_ms",
                reason: "must be non-zero",
            })
        }
        assert!(returns_err().is_err());
    }
}
