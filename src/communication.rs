//! Cluster communication fabric (C3): typed request-reply and direct
//! messaging layered over the raw transport (C1) plus membership (C2) for
//! endpoint lookup.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AtomixError;
use crate::error::AtomixResult;
use crate::lifecycle::Lifecycle;
use crate::membership::ClusterMembership;
use crate::node::NodeId;
use crate::transport::ClusterTransport;
use crate::transport::MessageHandler;

/// Typed request-reply and direct-message layer over [`ClusterTransport`].
pub struct ClusterCommunicationService {
    transport: Arc<dyn ClusterTransport>,
    membership: Arc<ClusterMembership>,
    open: AtomicBool,
}

impl ClusterCommunicationService {
    pub fn new(transport: Arc<dyn ClusterTransport>, membership: Arc<ClusterMembership>) -> Self {
        Self {
            transport,
            membership,
            open: AtomicBool::new(false),
        }
    }

    /// Serialize `request`, send it to `target` under `topic`, and
    /// deserialize the reply.
    #[tracing::instrument(skip(self, request), fields(target = %target, topic = topic))]
    pub async fn send<Req, Resp>(&self, target: &NodeId, topic: &str, request: &Req) -> AtomixResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        if !self.is_open() {
            return Err(AtomixError::NotOpen);
        }
        let snapshot = self.membership.current();
        let endpoint = snapshot
            .members
            .iter()
            .find(|n| &n.id == target)
            .map(|n| n.endpoint.clone())
            .ok_or_else(|| AtomixError::UnknownTarget(target.clone()))?;

        let body = serde_json::to_vec(request).map_err(|e| AtomixError::ApplicationError(e.into()))?;
        let reply = self.transport.send(&endpoint, topic, body).await?;
        serde_json::from_slice(&reply).map_err(|e| AtomixError::ApplicationError(e.into()))
    }

    /// Register a typed handler for messages received under `topic`.
    pub fn subscribe<Req, Resp, F>(&self, topic: &str, handler: F)
    where
        Req: DeserializeOwned + Send + Sync + 'static,
        Resp: Serialize + Send + Sync + 'static,
        F: Fn(Req) -> AtomixResult<Resp> + Send + Sync + 'static,
    {
        self.transport.subscribe(topic, Box::new(TypedHandler { handler, _marker: Default::default() }));
    }
}

struct TypedHandler<Req, Resp, F> {
    handler: F,
    _marker: std::marker::PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp, F> MessageHandler for TypedHandler<Req, Resp, F>
where
    Req: DeserializeOwned + Send + Sync + 'static,
    Resp: Serialize + Send + Sync + 'static,
    F: Fn(Req) -> AtomixResult<Resp> + Send + Sync + 'static,
{
    fn handle(&self, body: Vec<u8>) -> AtomixResult<Vec<u8>> {
        let req: Req = serde_json::from_slice(&body).map_err(|e| AtomixError::ApplicationError(e.into()))?;
        let resp = (self.handler)(req)?;
        serde_json::to_vec(&resp).map_err(|e| AtomixError::ApplicationError(e.into()))
    }
}

#[async_trait]
impl Lifecycle for ClusterCommunicationService {
    async fn open(&self) -> AtomixResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> AtomixResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cluster-communication"
    }
}
