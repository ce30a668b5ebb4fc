//! Composition root for a distributed coordination runtime.
//!
//! This crate wires together cluster membership, a cluster-wide
//! communication/event fabric, a partitioned Raft-replicated state machine
//! layer, and a factory for distributed primitives (maps, locks, counters,
//! leader elections) built on top of Raft client sessions.
//!
//! The three hard parts live in their own modules:
//! - [`topology`]: deterministic partition-to-replica-set synthesis.
//! - [`atomix`]: ordered bring-up/teardown of the layered runtime.
//! - [`proxy`]: the recovery/retry/blocking-awareness pipeline over a raw
//!   session proxy.

pub mod atomix;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod membership;
pub mod node;
pub mod partition;
pub mod primitives;
pub mod proxy;
pub mod raft_client;
pub mod raft_participant;
pub mod session;
pub mod topology;
pub mod transport;

pub use atomix::Atomix;
pub use atomix::AtomixBuilder;
pub use config::AtomixConfig;
pub use error::AtomixError;
pub use error::AtomixResult;
pub use node::ClusterMetadata;
pub use node::Node;
pub use node::NodeId;
pub use topology::PartitionId;
pub use topology::PartitionMetadata;
pub use topology::PartitionTopology;

/// A value that can be sent to a Raft participant as a command, or returned
/// from it as a read result.
///
/// Large enough to be carried across an `async` boundary and (de)serialized
/// for the wire, but otherwise opaque to this crate.
pub trait AppPayload: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> AppPayload for T where T: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static {}

/// A short, human-readable summary of a value, used only for tracing fields.
///
/// Kept deliberately small: callers should never depend on the exact text.
pub trait Summary {
    fn summary(&self) -> String;
}
