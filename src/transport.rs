//! The messaging transport (C1): point-to-point send / request-reply over a
//! network endpoint. Deliberately not implemented here — this module only
//! defines the seam the cluster communication fabric (C3) is built on.

use async_trait::async_trait;

use crate::error::AtomixResult;
use crate::node::Endpoint;

/// A point-to-point transport capable of request/reply and fire-and-forget
/// delivery to a specific endpoint, keyed by an application-chosen topic.
#[async_trait]
pub trait ClusterTransport: Send + Sync + 'static {
    /// Send `body` to `endpoint` under `topic` and await a reply.
    async fn send(&self, endpoint: &Endpoint, topic: &str, body: Vec<u8>) -> AtomixResult<Vec<u8>>;

    /// Register `handler` to be invoked for every message received under
    /// `topic`, returning the bytes to reply with.
    fn subscribe(&self, topic: &str, handler: Box<dyn MessageHandler>);
}

/// A per-topic message handler registered with [`ClusterTransport::subscribe`].
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, body: Vec<u8>) -> AtomixResult<Vec<u8>>;
}
