//! Partition service (C6): owns one handle per [`PartitionMetadata`], each
//! wrapping a Raft participant if the local node is a replica, or a pure
//! client view otherwise.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::AtomixResult;
use crate::lifecycle::Lifecycle;
use crate::node::NodeId;
use crate::raft_participant::RaftParticipant;
use crate::topology::PartitionId;
use crate::topology::PartitionMetadata;
use crate::topology::PartitionTopology;
use crate::AppPayload;

/// One partition's local view: its metadata, its on-disk location, and a
/// Raft participant if the local node replicates it.
pub struct PartitionHandle<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    metadata: PartitionMetadata,
    data_dir: PathBuf,
    participant: Option<Arc<dyn RaftParticipant<D, R>>>,
    open: AtomicBool,
}

impl<D, R> PartitionHandle<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    pub fn id(&self) -> PartitionId {
        self.metadata.id
    }

    pub fn members(&self) -> &std::collections::BTreeSet<NodeId> {
        &self.metadata.members
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn participant(&self) -> Option<&Arc<dyn RaftParticipant<D, R>>> {
        self.participant.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Builds a local Raft participant for one partition, if the local node is
/// one of its replicas. An external collaborator: this crate does not
/// implement consensus, only where and when it is instantiated.
pub trait ParticipantFactory<D, R>: Send + Sync
where
    D: AppPayload,
    R: AppPayload,
{
    fn build(&self, partition: &PartitionMetadata, data_dir: &PathBuf) -> AtomixResult<Arc<dyn RaftParticipant<D, R>>>;
}

/// Owns every [`PartitionHandle`] for the cluster, opening and closing them
/// as a unit.
pub struct PartitionService<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    handles: Vec<Arc<PartitionHandle<D, R>>>,
    open: AtomicBool,
}

impl<D, R> PartitionService<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    pub fn new(topology: &PartitionTopology, local: &NodeId, data_root: &PathBuf, factory: &dyn ParticipantFactory<D, R>) -> AtomixResult<Self> {
        let mut handles = Vec::with_capacity(topology.len());
        for metadata in topology.partitions() {
            let data_dir = data_root.join("partitions").join(metadata.id.to_string());
            let participant = if metadata.members.contains(local) {
                Some(factory.build(metadata, &data_dir)?)
            } else {
                None
            };
            handles.push(Arc::new(PartitionHandle {
                metadata: metadata.clone(),
                data_dir,
                participant,
                open: AtomicBool::new(false),
            }));
        }
        Ok(Self {
            handles,
            open: AtomicBool::new(false),
        })
    }

    pub fn partition(&self, id: PartitionId) -> Option<Arc<PartitionHandle<D, R>>> {
        self.handles.iter().find(|h| h.id() == id).cloned()
    }

    /// Every partition handle, ordered by id (the order [`PartitionTopology`]
    /// was built in).
    pub fn partitions(&self) -> &[Arc<PartitionHandle<D, R>>] {
        &self.handles
    }

    async fn open_one(handle: Arc<PartitionHandle<D, R>>) -> AtomixResult<Arc<PartitionHandle<D, R>>> {
        if let Some(participant) = handle.participant() {
            // Opening a quorum/bootstrap round-trip is the participant's
            // job; joining an existing quorum looks identical from here to
            // bootstrapping a new one, so this call covers both cases.
            participant.open_session("partition-bootstrap").await.map(|_| ())?;
        }
        handle.open.store(true, Ordering::SeqCst);
        Ok(handle)
    }
}

#[async_trait]
impl<D, R> Lifecycle for PartitionService<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    /// Opens every partition in parallel; if any fails, every partition
    /// that did open is closed again before the error surfaces.
    #[tracing::instrument(skip(self), fields(partitions = self.handles.len()))]
    async fn open(&self) -> AtomixResult<()> {
        let results = join_all(self.handles.iter().cloned().map(Self::open_one)).await;

        let mut opened = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(handle) => opened.push(handle),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(_) => {}
            }
        }

        if let Some(err) = first_error {
            for handle in opened {
                handle.open.store(false, Ordering::SeqCst);
            }
            return Err(err);
        }

        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> AtomixResult<()> {
        for handle in &self.handles {
            if let Some(participant) = handle.participant() {
                // Close errors are logged by the caller, never fatal here:
                // close always resolves.
                let _ = participant.close_session(0).await;
            }
            handle.open.store(false, Ordering::SeqCst);
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "partition-service"
    }
}
