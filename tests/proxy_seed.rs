//! Seed scenarios 3 and 4: retry on transient failure, and transparent
//! session recovery composed with retry.

mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use atomix_core::proxy::PrimitiveProxy;
use atomix_core::proxy::ProxyStackConfig;
use atomix_core::raft_participant::ReadConsistency;
use atomix_core::session::SessionManager;
use atomix_core::topology::PartitionId;
use atomix_core::{proxy, raft_participant::RaftParticipant};

fn participants(script: Vec<atomix_core::error::AtomixResult<String>>) -> (Arc<fixtures::ScriptedParticipant>, HashMap<PartitionId, Arc<dyn RaftParticipant<String, String>>>) {
    let participant = Arc::new(fixtures::ScriptedParticipant::new(script));
    let mut map: HashMap<PartitionId, Arc<dyn RaftParticipant<String, String>>> = HashMap::new();
    map.insert(PartitionId(1), participant.clone());
    (participant, map)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retrying_consumes_transient_errors_then_succeeds() {
    fixtures::init_tracing();

    let (participant, map) = participants(vec![Err(fixtures::unavailable(1)), Err(fixtures::unavailable(1))]);
    let sessions = Arc::new(SessionManager::new("client-1", map, Duration::from_secs(30)));

    let config = ProxyStackConfig {
        recover_on_expiry: false,
        max_retries: 2,
        retry_delay: Duration::from_millis(1),
    };
    let proxy = proxy::build(sessions, PartitionId(1), &config, tokio::runtime::Handle::current());

    let result = proxy.execute("write".to_string()).await;
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(participant.submit_call_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retrying_passes_through_non_transient_errors_unchanged() {
    let (_participant, map) = participants(vec![Err(atomix_core::error::AtomixError::ApplicationError(anyhow::anyhow!("boom")))]);
    let sessions = Arc::new(SessionManager::new("client-1", map, Duration::from_secs(30)));

    let config = ProxyStackConfig {
        recover_on_expiry: false,
        max_retries: 3,
        retry_delay: Duration::from_millis(1),
    };
    let proxy = proxy::build(sessions, PartitionId(1), &config, tokio::runtime::Handle::current());

    let err = proxy.execute("write".to_string()).await.unwrap_err();
    assert!(matches!(err, atomix_core::error::AtomixError::ApplicationError(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recovering_then_retrying_resumes_on_a_fresh_session_after_expiry() {
    fixtures::init_tracing();

    let (participant, map) = participants(vec![Err(fixtures::session_expired(1)), Ok("ok".to_string())]);
    let sessions = Arc::new(SessionManager::new("client-1", map, Duration::from_secs(30)));

    let config = ProxyStackConfig {
        recover_on_expiry: true,
        max_retries: 1,
        retry_delay: Duration::from_millis(1),
    };
    let proxy = proxy::build(sessions, PartitionId(1), &config, tokio::runtime::Handle::current());

    // Recovering converts the server-declared expiry into `OperationLost`
    // for this attempt; the `Retrying` layer sitting outside it consumes
    // that and resubmits on the newly opened session, which succeeds.
    let result = proxy.execute("write".to_string()).await;
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(participant.submit_call_count(), 2);
}

#[tokio::test]
async fn query_honors_read_consistency_argument() {
    let (_participant, map) = participants(vec![Ok("value".to_string())]);
    let sessions = Arc::new(SessionManager::new("client-1", map, Duration::from_secs(30)));

    let config = ProxyStackConfig::default();
    let proxy = proxy::build(sessions, PartitionId(1), &config, tokio::runtime::Handle::current());

    let result = proxy.query(ReadConsistency::Linearizable, "read".to_string()).await;
    assert_eq!(result.unwrap(), "value");
}
