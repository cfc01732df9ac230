//! The operation-service collaborator
//!
//! Handles never talk to the network themselves. Whatever client library the
//! application already uses implements [`OperationService`] and is shared by
//! every handle through an `Arc`.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::operation::{OperationId, OperationSnapshot};

/// Fetches the current status of a server-side operation
///
/// Implementations must be safe to call concurrently from many handles. They
/// should not retry on their own behalf beyond what their transport already
/// does; handles propagate any error unchanged.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use optrack_core::{OperationId, OperationService, OperationSnapshot, ServiceError};
///
/// struct AlwaysPending;
///
/// #[async_trait]
/// impl OperationService for AlwaysPending {
///     async fn fetch_status(&self, id: &OperationId) -> Result<OperationSnapshot, ServiceError> {
///         Ok(OperationSnapshot::pending(id.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait OperationService: Send + Sync {
    /// Issue one status round-trip for `id`
    async fn fetch_status(&self, id: &OperationId) -> Result<OperationSnapshot, ServiceError>;
}
