//! Operation snapshot types
//!
//! A snapshot is the client's cached view of a server-side operation as of the
//! last status fetch. The status is a tagged variant so that a success payload
//! and a failure cause can never coexist.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw, untyped wire data carried by an operation
pub type Payload = serde_json::Value;

/// Opaque server-issued identifier of an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OperationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Failure cause reported by the server for an operation that did not succeed
///
/// `code` follows the canonical RPC status numbering (e.g. 6 = already exists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Payload>,
}

impl OperationError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Status of an operation as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationStatus {
    /// Still running
    Pending,
    /// Finished; `result` is the wire representation of the outcome
    Succeeded { result: Payload },
    /// Finished unsuccessfully
    Failed { error: OperationError },
}

impl OperationStatus {
    /// Payload-free view of this status
    #[must_use]
    pub fn state(&self) -> OperationState {
        match self {
            OperationStatus::Pending => OperationState::Pending,
            OperationStatus::Succeeded { .. } => OperationState::Succeeded,
            OperationStatus::Failed { .. } => OperationState::Failed,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

/// Payload-free discriminant of [`OperationStatus`], handy for logs and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed,
}

impl OperationState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationState::Pending)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationState::Pending => "pending",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a server-side operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    /// Identifier assigned by the server at creation time
    pub name: OperationId,

    #[serde(flatten)]
    pub status: OperationStatus,

    /// Server-reported progress information, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Payload>,
}

impl OperationSnapshot {
    /// Snapshot of an operation that has not finished yet
    pub fn pending(name: impl Into<OperationId>) -> Self {
        Self {
            name: name.into(),
            status: OperationStatus::Pending,
            metadata: None,
        }
    }

    /// Snapshot of an operation that finished with `result`
    pub fn succeeded(name: impl Into<OperationId>, result: Payload) -> Self {
        Self {
            name: name.into(),
            status: OperationStatus::Succeeded { result },
            metadata: None,
        }
    }

    /// Snapshot of an operation that finished with `error`
    pub fn failed(name: impl Into<OperationId>, error: OperationError) -> Self {
        Self {
            name: name.into(),
            status: OperationStatus::Failed { error },
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Payload) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn state(&self) -> OperationState {
        self.status.state()
    }
}
