//! Error kinds produced across the composition root, partition service,
//! session manager, and proxy stack.
//!
//! Each variant corresponds to a row of the error table in the system
//! design: `kind`, `source`, and whether a proxy adapter may recover from it
//! locally. [`AtomixError::is_transient`] encodes that last column so the
//! `Retrying` adapter (see [`crate::proxy`]) does not need to duplicate the
//! table.

use thiserror::Error;

use crate::node::NodeId;

/// The crate-wide result alias.
pub type AtomixResult<T> = Result<T, AtomixError>;

#[derive(Debug, Error)]
pub enum AtomixError {
    /// Builder-time configuration failure. Never surfaced after `build()`.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// A user-facing operation was attempted before `open()` completed.
    #[error("atomix runtime is not open")]
    NotOpen,

    /// No reachable leader could be found for a partition within the
    /// configured deadline.
    #[error("no leader reachable for partition {partition}")]
    Unavailable { partition: u64 },

    /// The session manager's cached leader hint was stale and no
    /// replacement hint was available.
    #[error("leader for partition {partition} is currently unknown")]
    LeaderUnknown { partition: u64 },

    /// A communication target was not found in the current membership
    /// snapshot. Unrelated to partition leadership; distinct from
    /// `LeaderUnknown` so a caller retrying a specific partition's leader
    /// lookup does not also catch this.
    #[error("no known endpoint for node {0}")]
    UnknownTarget(NodeId),

    /// An operation's deadline (derived from `minTimeout..maxTimeout`)
    /// elapsed. Never retried by the `Retrying` adapter.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The session's leader could not be reached within `sessionTimeout`;
    /// the session may still return to `OPEN` on leader rediscovery.
    #[error("session {session} is suspended")]
    SessionSuspended { session: u64 },

    /// The server declared the session expired. Terminal for that session;
    /// recoverable only by opening a fresh one.
    #[error("session {session} has expired")]
    SessionExpired { session: u64 },

    /// Raised by the `Recovering` adapter after it transparently replaces
    /// an expired session: the in-flight operation at the moment of
    /// failure is lost and must be retried by the caller (or by
    /// `Retrying`, which sits above `Recovering` for exactly this reason).
    #[error("operation lost during session recovery")]
    OperationLost,

    /// A verbatim error surfaced by the state machine. Never retried,
    /// never transformed.
    #[error("application error: {0}")]
    ApplicationError(#[source] anyhow::Error),

    /// The underlying transport or participant channel is gone because the
    /// runtime is tearing down.
    #[error("runtime is shutting down")]
    ShuttingDown,
}

impl AtomixError {
    /// Whether a proxy adapter is permitted to transparently retry an
    /// operation that failed with this error.
    ///
    /// `SessionSuspended` and `SessionExpired` are handled by `Recovering`,
    /// not `Retrying`, so they are excluded here: by the time `Retrying`
    /// sees an error it is already `Unavailable`, `LeaderUnknown`, or
    /// `OperationLost` (the shape `Recovering` converts expiry into).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AtomixError::Unavailable { .. } | AtomixError::LeaderUnknown { .. } | AtomixError::OperationLost
        )
    }

    /// Whether `Recovering` should treat this as grounds to open a fresh
    /// session and replay listeners.
    pub fn is_recoverable_session_error(&self) -> bool {
        matches!(self, AtomixError::SessionExpired { .. })
    }
}

/// Errors which can arise while synthesizing a partition topology.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("partition size {size} exceeds bootstrap node count {bootstrap}")]
    PartitionSizeExceedsBootstrap { size: usize, bootstrap: usize },

    #[error("numPartitions must be greater than zero")]
    ZeroPartitions,

    #[error("bootstrap node set must not be empty")]
    EmptyBootstrap,
}

impl From<TopologyError> for AtomixError {
    fn from(e: TopologyError) -> Self {
        AtomixError::ConfigurationInvalid(e.to_string())
    }
}
