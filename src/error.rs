//! Error types used by the slotvisor collaborators.
//!
//! Expected outcomes of the allocators (capacity exhaustion, identity mismatch,
//! missing partitions) are **not** errors: they come back as `Option`/`bool`
//! and are reported on the event bus. The enums below cover the boundaries
//! where an external collaborator can fail:
//!
//! - [`StoreError`]: the durable recovery store could not be read or written.
//! - [`ProcessError`]: the OS process-control collaborator failed.
//! - [`TransportError`]: the RPC transport to the owner process failed.
//!
//! All types provide `as_label` (stable snake_case for logs/metrics), mirroring
//! the rest of the runtime.

use std::io;

use thiserror::Error;

/// # Errors produced by a [`RecoveryStore`](crate::RecoveryStore).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("store io failed: {0}")]
    Io(#[from] io::Error),

    /// Stored content could not be encoded or decoded.
    #[error("store codec failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// The store lock was poisoned by a panicking writer.
    #[error("store poisoned")]
    Poisoned,
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use slotvisor::StoreError;
    ///
    /// assert_eq!(StoreError::Poisoned.as_label(), "store_poisoned");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Codec(_) => "store_codec",
            StoreError::Poisoned => "store_poisoned",
        }
    }
}

/// # Errors produced by a [`ProcessControl`](crate::ProcessControl) collaborator.
///
/// A failed process listing is transient: the scheduler gives up on the current
/// allocation and the caller may retry later.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The live process list could not be obtained (or came back empty).
    #[error("process list unavailable: {reason}")]
    ListUnavailable {
        /// Collaborator supplied detail.
        reason: String,
    },

    /// Termination signal could not be delivered.
    #[error("failed to kill pid {pid}: {reason}")]
    KillFailed {
        /// Target OS process id.
        pid: u32,
        /// Collaborator supplied detail.
        reason: String,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::ListUnavailable { .. } => "process_list_unavailable",
            ProcessError::KillFailed { .. } => "process_kill_failed",
        }
    }
}

/// # Errors produced by an RPC [`Transport`](crate::Transport).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The owner process is unreachable (channel closed or host shut down).
    #[error("transport closed")]
    Closed,

    /// Request or response could not be encoded or decoded.
    #[error("transport codec failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// The owner answered with a response that does not match the request.
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use slotvisor::TransportError;
    ///
    /// assert_eq!(TransportError::Closed.as_label(), "transport_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Closed => "transport_closed",
            TransportError::Codec(_) => "transport_codec",
            TransportError::Unexpected(_) => "transport_unexpected",
        }
    }

    /// Indicates whether retrying the call may succeed.
    ///
    /// Only [`TransportError::Closed`] is retryable: the owner may come back.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}
