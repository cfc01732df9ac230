//! Progress reporting for wait loops
//!
//! Waiting on an operation can take minutes. A CLI wants to drive a spinner
//! while that happens; a library consumer usually wants nothing. The callback
//! is therefore optional and receives plain events.

use std::time::Duration;

use crate::operation::{OperationError, OperationId, OperationState};

/// Progress events emitted while waiting for an operation
#[derive(Debug, Clone, PartialEq)]
pub enum WaitEvent {
    /// The wait loop is about to issue its first refresh
    Started { operation: OperationId },
    /// A refresh returned; `next_delay` is set when another round follows
    Polling {
        operation: OperationId,
        attempt: u32,
        state: OperationState,
        elapsed: Duration,
        next_delay: Option<Duration>,
    },
    /// The operation finished successfully
    Completed {
        operation: OperationId,
        attempts: u32,
        elapsed: Duration,
    },
    /// The operation finished unsuccessfully; this is a result, not a wait error
    Failed {
        operation: OperationId,
        error: OperationError,
        elapsed: Duration,
    },
}

/// Callback type for wait progress updates
pub type WaitCallback = Box<dyn Fn(WaitEvent) + Send + Sync>;

/// Helper to emit progress events
pub(crate) fn emit(callback: &Option<WaitCallback>, event: WaitEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_without_callback_is_noop() {
        emit(
            &None,
            WaitEvent::Started {
                operation: OperationId::from("op-1"),
            },
        );
    }

    #[test]
    fn test_emit_forwards_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: Option<WaitCallback> =
            Some(Box::new(move |event: WaitEvent| sink.lock().unwrap().push(event)));

        emit(
            &callback,
            WaitEvent::Started {
                operation: OperationId::from("op-1"),
            },
        );

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![WaitEvent::Started {
                operation: OperationId::from("op-1")
            }]
        );
    }
}
