//! # optrack-core
//!
//! Client-side tracking of long-running server operations.
//!
//! Many cloud APIs answer a "create" or "update" call with an *operation*
//! instead of the finished resource. The operation has to be polled through a
//! separate operation service until it either succeeds (carrying the resource)
//! or fails (carrying an error). This crate turns that protocol into a small
//! state machine:
//!
//! ```text
//!          refresh: still running
//!            ┌──────────┐
//!            ▼          │
//!       ┌─────────┐     │   refresh: success    ┌───────────┐
//!       │ Pending │─────┴──────────────────────▶│ Succeeded │
//!       └─────────┘                             └───────────┘
//!            │          refresh: failure        ┌───────────┐
//!            └─────────────────────────────────▶│  Failed   │
//!                                               └───────────┘
//! ```
//!
//! Terminal states never change again, no matter what later refreshes return.
//!
//! ## Layers
//!
//! - **[`OperationService`]** - implemented by the application on top of
//!   whatever RPC client it already has; one `fetch_status` round-trip
//! - **[`OperationHandle`]** - the cached snapshot plus `refresh`,
//!   `wait_until_done` and typed `result` decoding
//! - **[`BackoffPolicy`] / [`PollingConfig`]** - how long to sleep between
//!   refreshes, optionally loaded from TOML
//!
//! ## Errors
//!
//! Only failed round-trips are errors ([`CoreError::Service`]). An operation
//! that finished unsuccessfully is an ordinary outcome: `is_error()` returns
//! true and `error()` carries the server's cause.
//!
//! ## Logging
//!
//! The crate emits `tracing` events (`debug` per refresh, `info` on state
//! changes) and never installs a subscriber.

pub mod backoff;
pub mod config;
pub mod decoder;
pub mod error;
pub mod handle;
pub mod operation;
pub mod progress;
pub mod service;

// Re-export main types for convenience
pub use backoff::{BackoffPolicy, Delays, MIN_DELAY};
pub use config::{ConfigError, PollingConfig};
pub use decoder::{ResultDecoder, json_decoder, payload_decoder};
pub use error::{CoreError, Result, ServiceError};
pub use handle::{OperationHandle, WaitOptions};
pub use operation::{
    OperationError, OperationId, OperationSnapshot, OperationState, OperationStatus, Payload,
};
pub use progress::{WaitCallback, WaitEvent};
pub use service::OperationService;

#[cfg(test)]
mod tests {
    /// Rows of the state diagram in the crate docs
    fn diagram_rows() -> Vec<Vec<char>> {
        include_str!("lib.rs")
            .lines()
            .skip_while(|line| *line != "//! ```text")
            .skip(1)
            .take_while(|line| *line != "//! ```")
            .map(|line| line.chars().collect())
            .collect()
    }

    #[test]
    fn test_state_diagram_arrows_touch_boxes() {
        let rows = diagram_rows();
        assert!(!rows.is_empty());

        let mut box_columns = Vec::new();
        for row in &rows {
            for (i, c) in row.iter().enumerate() {
                if *c == '▶' {
                    assert_eq!(row.get(i + 1), Some(&'│'), "{}", row.iter().collect::<String>());
                    box_columns.push(i + 1);
                }
            }
        }
        assert_eq!(box_columns.len(), 2);
        assert_eq!(box_columns[0], box_columns[1]);

        // Box corners share the arrow target column
        for row in &rows {
            if let Some(i) = row.iter().rposition(|c| *c == '┌' || *c == '└')
                && i > box_columns[0] - 2
            {
                assert_eq!(i, box_columns[0]);
            }
        }
    }
}
