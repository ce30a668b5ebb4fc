//! Ties the session manager (C7) and the proxy stack assembler (C8)
//! together: given a partition's raw Raft participant, produces the
//! user-facing primitive proxy for it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::proxy;
use crate::proxy::DelegatingProxy;
use crate::proxy::ProxyStackConfig;
use crate::raft_participant::RaftParticipant;
use crate::session::SessionManager;
use crate::topology::PartitionId;
use crate::AppPayload;

/// Builds a [`SessionManager`] over every partition's Raft participant, for
/// one logical client id.
pub fn session_manager<D, R>(
    client_id: impl Into<String>,
    participants: HashMap<PartitionId, Arc<dyn RaftParticipant<D, R>>>,
    session_timeout: Duration,
) -> Arc<SessionManager<D, R>>
where
    D: AppPayload,
    R: AppPayload,
{
    Arc::new(SessionManager::new(client_id, participants, session_timeout))
}

/// Assembles the user-facing proxy for `partition`, wrapping the session
/// manager's raw proxy in the fixed recovery/retry/blocking pipeline.
pub fn proxy_for<D, R>(
    sessions: Arc<SessionManager<D, R>>,
    partition: PartitionId,
    config: &ProxyStackConfig,
    executor: tokio::runtime::Handle,
) -> Arc<DelegatingProxy<D, R>>
where
    D: AppPayload,
    R: AppPayload,
{
    proxy::build(sessions, partition, config, executor)
}
