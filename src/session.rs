//! Raft session manager (C7): per-client, per-partition session
//! multiplexing and leader selection over a [`RaftParticipant`].

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::error::AtomixError;
use crate::error::AtomixResult;
use crate::node::NodeId;
use crate::raft_participant::RaftParticipant;
use crate::raft_participant::ReadConsistency;
use crate::topology::PartitionId;
use crate::topology::PartitionTopology;
use crate::AppPayload;

/// The lifecycle of a logical client↔partition relationship.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Open,
    Suspended,
    Expired,
    Closed,
}

/// A live session: its id, current state, and the sequence counter used to
/// linearize commands issued on it.
pub struct SessionHandle {
    pub id: u64,
    pub partition: PartitionId,
    state: RwLock<SessionState>,
    sequence: AtomicU64,
    keepalive: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    async fn set_state(&self, new: SessionState) {
        *self.state.write().await = new;
    }

    /// The next monotonically increasing sequence number for a command
    /// issued on this session, guaranteeing per-session total order.
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.keepalive.abort();
    }
}

/// Per client id and per partition, maintains a pool of sessions, tracks
/// the suspected leader per partition, and applies read-consistency rules.
pub struct SessionManager<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    client_id: String,
    participants: HashMap<PartitionId, Arc<dyn RaftParticipant<D, R>>>,
    leader_cache: RwLock<HashMap<PartitionId, NodeId>>,
    sessions: RwLock<HashMap<PartitionId, Arc<SessionHandle>>>,
    round_robin_cursor: RwLock<HashMap<PartitionId, usize>>,
    session_timeout: Duration,
}

impl<D, R> SessionManager<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    pub fn new(
        client_id: impl Into<String>,
        participants: HashMap<PartitionId, Arc<dyn RaftParticipant<D, R>>>,
        session_timeout: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            participants,
            leader_cache: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            round_robin_cursor: RwLock::new(HashMap::new()),
            session_timeout,
        }
    }

    /// The cached suspected leader for `partition`, if any.
    pub async fn suspected_leader(&self, partition: PartitionId) -> Option<NodeId> {
        self.leader_cache.read().await.get(&partition).cloned()
    }

    /// Record a `NotLeader(hint)` response, retargeting future requests.
    pub async fn note_not_leader(&self, partition: PartitionId, hint: Option<NodeId>) {
        let mut cache = self.leader_cache.write().await;
        match hint {
            Some(node) => {
                cache.insert(partition, node);
            }
            None => {
                cache.remove(&partition);
            }
        }
    }

    /// Iterate the replica set in a bounded round-robin when no leader hint
    /// is available.
    pub async fn next_round_robin_target(&self, topology: &PartitionTopology, partition: PartitionId) -> Option<NodeId> {
        let members = topology.partition(partition)?.members.clone();
        if members.is_empty() {
            return None;
        }
        let members: Vec<_> = members.into_iter().collect();
        let mut cursors = self.round_robin_cursor.write().await;
        let cursor = cursors.entry(partition).or_insert(0);
        let target = members[*cursor % members.len()].clone();
        *cursor = (*cursor + 1) % members.len();
        Some(target)
    }

    /// Get (opening if necessary) the session for `partition`.
    pub async fn session(&self, partition: PartitionId) -> AtomixResult<Arc<SessionHandle>> {
        if let Some(existing) = self.sessions.read().await.get(&partition) {
            if existing.state().await != SessionState::Expired {
                return Ok(existing.clone());
            }
        }
        self.open_session(partition).await
    }

    #[tracing::instrument(skip(self), fields(partition = partition.0))]
    async fn open_session(&self, partition: PartitionId) -> AtomixResult<Arc<SessionHandle>> {
        let participant = self.participants.get(&partition).ok_or(AtomixError::LeaderUnknown { partition: partition.0 })?.clone();

        let id = participant.open_session(&self.client_id).await?;

        let keepalive_interval = self.session_timeout / 2;
        let participant_for_task = participant.clone();
        let keepalive = tokio::spawn(async move {
            let mut ticker = interval(keepalive_interval);
            loop {
                ticker.tick().await;
                if participant_for_task.keepalive(id).await.is_err() {
                    // The server is authoritative on expiration; a failed
                    // keepalive does not itself declare the session
                    // expired, it just stops trying once the handle is
                    // dropped (see `SessionHandle::drop`).
                    break;
                }
            }
        });

        let handle = Arc::new(SessionHandle {
            id,
            partition,
            state: RwLock::new(SessionState::Open),
            sequence: AtomicU64::new(0),
            keepalive,
        });

        self.sessions.write().await.insert(partition, handle.clone());
        Ok(handle)
    }

    /// Submit a sequenced command, tagging it with the session's next
    /// sequence number so the server can linearize it in issue order.
    #[tracing::instrument(skip(self, command), fields(partition = partition.0))]
    pub async fn submit(&self, partition: PartitionId, command: D) -> AtomixResult<R> {
        let session = self.session(partition).await?;
        let participant = self
            .participants
            .get(&partition)
            .ok_or(AtomixError::LeaderUnknown { partition: partition.0 })?;

        let sequence = session.next_sequence();
        match participant.submit(session.id, sequence, command).await {
            Ok(r) => Ok(r),
            Err(AtomixError::SessionExpired { session: sid }) => {
                session.set_state(SessionState::Expired).await;
                Err(AtomixError::SessionExpired { session: sid })
            }
            Err(AtomixError::Unavailable { partition: p }) => {
                session.set_state(SessionState::Suspended).await;
                Err(AtomixError::Unavailable { partition: p })
            }
            Err(other) => Err(other),
        }
    }

    /// Execute a query at the requested consistency level.
    pub async fn query(&self, partition: PartitionId, level: ReadConsistency, query: D) -> AtomixResult<R> {
        let session = self.session(partition).await?;
        let participant = self
            .participants
            .get(&partition)
            .ok_or(AtomixError::LeaderUnknown { partition: partition.0 })?;
        participant.query(session.id, level, query).await
    }

    pub async fn close(&self, partition: PartitionId) -> AtomixResult<()> {
        if let Some(session) = self.sessions.write().await.remove(&partition) {
            if let Some(participant) = self.participants.get(&partition) {
                participant.close_session(session.id).await?;
            }
            session.set_state(SessionState::Closed).await;
        }
        Ok(())
    }
}
