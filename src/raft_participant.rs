//! The Raft participant interface consumed by the session manager (C7).
//!
//! Implementing the consensus algorithm behind this trait — log
//! replication, elections, snapshots — is deliberately out of scope here:
//! this is an external-collaborator seam, not a component this crate owns.
//! Only a minimal in-memory test double exists, under `#[cfg(test)]` and in
//! the integration tests, to exercise the session manager and proxy stack.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::error::AtomixResult;
use crate::node::NodeId;
use crate::AppPayload;

/// The read-consistency level requested for a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadConsistency {
    /// Follower reads observing session order only.
    Sequential,
    /// Local leader reads while a lease is valid.
    LinearizableLease,
    /// Forces a leader round-trip plus quorum confirmation.
    Linearizable,
}

impl Default for ReadConsistency {
    fn default() -> Self {
        ReadConsistency::Sequential
    }
}

/// A hint about which node a session should retarget to, carried on a
/// `NotLeader` response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotLeaderHint {
    pub leader: Option<NodeId>,
}

/// A session-scoped event emitted by a Raft participant: used by the
/// session manager to learn about leader changes and forced expiry without
/// polling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    LeaderChanged(Option<NodeId>),
    Expired { session: u64 },
}

/// The per-partition Raft participant: `submit`/`query` plus a session
/// event stream, as consumed by [`crate::session::SessionManager`].
#[async_trait]
pub trait RaftParticipant<D, R>: Send + Sync + 'static
where
    D: AppPayload,
    R: AppPayload,
{
    /// Open a new session for `client_id`, returning its server-assigned
    /// session id.
    async fn open_session(&self, client_id: &str) -> AtomixResult<u64>;

    /// Submit a sequenced command on an open session.
    async fn submit(&self, session: u64, sequence: u64, command: D) -> AtomixResult<R>;

    /// Execute a read at the given consistency level.
    async fn query(&self, session: u64, level: ReadConsistency, query: D) -> AtomixResult<R>;

    /// Send a keepalive for an open session.
    async fn keepalive(&self, session: u64) -> AtomixResult<()>;

    /// Close a session explicitly, releasing its server-side state.
    async fn close_session(&self, session: u64) -> AtomixResult<()>;
}
