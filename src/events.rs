//! Cluster event fabric (C4): cluster-wide topic publish/subscribe, built
//! on the communication fabric (C3).
//!
//! Local delivery uses a `tokio::sync::broadcast` channel per topic, so any
//! number of local subscribers can observe every event without polling.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::AtomixError;
use crate::error::AtomixResult;
use crate::lifecycle::Lifecycle;

const TOPIC_CHANNEL_CAPACITY: usize = 1024;

/// A cluster-wide event, published under a topic.
#[derive(Clone, Debug)]
pub struct ClusterEvent {
    pub topic: String,
    pub payload: Vec<u8>,
}

struct Topics {
    senders: HashMap<String, broadcast::Sender<ClusterEvent>>,
}

/// Cluster-wide topic publish/subscribe.
pub struct ClusterEventService {
    topics: Mutex<Topics>,
    open: AtomicBool,
}

impl ClusterEventService {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(Topics { senders: HashMap::new() }),
            open: AtomicBool::new(false),
        }
    }

    /// Publish `payload` under `topic` to every current and future
    /// subscriber on this node.
    #[tracing::instrument(skip(self, payload), fields(topic = topic, bytes = payload.len()))]
    pub fn publish(&self, topic: &str, payload: Vec<u8>) -> AtomixResult<()> {
        if !self.is_open() {
            return Err(AtomixError::NotOpen);
        }
        let senders = self.topics.lock().expect("event topic table poisoned");
        if let Some(tx) = senders.senders.get(topic) {
            // No subscribers is not an error: publishing into the void is
            // normal for a topic nobody has asked about yet.
            let _ = tx.send(ClusterEvent { topic: topic.to_string(), payload });
        }
        Ok(())
    }

    /// Subscribe to `topic`, creating it if this is the first subscriber.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<ClusterEvent> {
        let mut topics = self.topics.lock().expect("event topic table poisoned");
        topics
            .senders
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

impl Default for ClusterEventService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lifecycle for ClusterEventService {
    async fn open(&self) -> AtomixResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> AtomixResult<()> {
        self.open.store(false, Ordering::SeqCst);
        self.topics.lock().expect("event topic table poisoned").senders.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cluster-events"
    }
}
