//! Builder configuration for the composition root (C10), per §6.
//!
//! Validation is eager and happens entirely in [`AtomixBuilder::build`]
//! (really, [`AtomixConfig::validate`]): nothing downstream ever sees a
//! `numPartitions` of zero or a `partitionSize` exceeding the bootstrap set,
//! so later code can treat those invariants as given rather than re-checking
//! them.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AtomixError;
use crate::error::AtomixResult;
use crate::node::ClusterMetadata;
use crate::node::Node;
use crate::primitives::PrimitiveFactory;
use crate::proxy::ProxyStackConfig;
use crate::topology::PartitionMetadata;
use crate::topology::PartitionTopology;
use crate::topology::TopologyBuilder;
use std::sync::Arc;

const DEFAULT_CLUSTER_NAME: &str = "atomix";

/// Validated configuration for one composition root instance.
#[derive(Clone)]
pub struct AtomixConfig {
    pub cluster_name: String,
    pub http_port: u16,
    pub local_node: Node,
    pub bootstrap_nodes: BTreeSet<Node>,
    pub num_partitions: u64,
    pub partition_size: usize,
    pub explicit_partitions: Option<Vec<PartitionMetadata>>,
    pub primitive_types: Vec<Arc<dyn PrimitiveFactory>>,
    pub data_dir: PathBuf,
    pub session_timeout: Duration,
    pub proxy: ProxyStackConfig,
}

impl AtomixConfig {
    pub fn cluster_metadata(&self) -> ClusterMetadata {
        ClusterMetadata::new(self.local_node.clone(), self.bootstrap_nodes.clone())
    }

    /// Derive the partition topology from this configuration: the explicit
    /// override if supplied, otherwise a freshly synthesized one.
    pub fn topology(&self) -> AtomixResult<PartitionTopology> {
        if let Some(explicit) = &self.explicit_partitions {
            return Ok(PartitionTopology::from_explicit(explicit.clone()));
        }
        let bootstrap_ids = self.cluster_metadata().bootstrap_ids();
        TopologyBuilder::new(self.num_partitions, self.partition_size)
            .build(&bootstrap_ids)
            .map_err(AtomixError::from)
    }
}

/// Builds and eagerly validates an [`AtomixConfig`].
pub struct AtomixBuilder {
    cluster_name: String,
    http_port: u16,
    local_node: Option<Node>,
    bootstrap_nodes: BTreeSet<Node>,
    num_partitions: u64,
    partition_size: usize,
    explicit_partitions: Option<Vec<PartitionMetadata>>,
    primitive_types: Vec<Arc<dyn PrimitiveFactory>>,
    data_dir: Option<PathBuf>,
    session_timeout: Duration,
    proxy: ProxyStackConfig,
}

impl AtomixBuilder {
    pub fn new() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            http_port: 0,
            local_node: None,
            bootstrap_nodes: BTreeSet::new(),
            num_partitions: 0,
            partition_size: 0,
            explicit_partitions: None,
            primitive_types: Vec::new(),
            data_dir: None,
            session_timeout: Duration::from_secs(15),
            proxy: ProxyStackConfig::default(),
        }
    }

    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn local_node(mut self, node: Node) -> Self {
        self.local_node = Some(node);
        self
    }

    pub fn bootstrap_nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.bootstrap_nodes = nodes.into_iter().collect();
        self
    }

    pub fn num_partitions(mut self, n: u64) -> Self {
        self.num_partitions = n;
        self
    }

    pub fn partition_size(mut self, r: usize) -> Self {
        self.partition_size = r;
        self
    }

    pub fn explicit_partitions(mut self, partitions: Vec<PartitionMetadata>) -> Self {
        self.explicit_partitions = Some(partitions);
        self
    }

    pub fn primitive_type(mut self, factory: Arc<dyn PrimitiveFactory>) -> Self {
        self.primitive_types.push(factory);
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn proxy_config(mut self, proxy: ProxyStackConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Validate and freeze this builder into an [`AtomixConfig`].
    pub fn build(self) -> AtomixResult<AtomixConfig> {
        let local_node = self.local_node.ok_or_else(|| AtomixError::ConfigurationInvalid("localNode is mandatory".into()))?;

        if self.bootstrap_nodes.is_empty() {
            return Err(AtomixError::ConfigurationInvalid("bootstrapNodes must be non-empty".into()));
        }

        let b = self.bootstrap_nodes.len();
        let partition_size = if self.partition_size == 0 { b.min(3) } else { self.partition_size };
        if partition_size > b {
            return Err(AtomixError::ConfigurationInvalid(format!(
                "partitionSize {} exceeds bootstrap node count {}",
                partition_size, b
            )));
        }

        let data_dir = self.data_dir.ok_or_else(|| AtomixError::ConfigurationInvalid("dataDir is mandatory".into()))?;

        Ok(AtomixConfig {
            cluster_name: self.cluster_name,
            http_port: self.http_port,
            local_node,
            bootstrap_nodes: self.bootstrap_nodes,
            num_partitions: self.num_partitions,
            partition_size,
            explicit_partitions: self.explicit_partitions,
            primitive_types: self.primitive_types,
            data_dir,
            session_timeout: self.session_timeout,
            proxy: self.proxy,
        })
    }
}

impl Default for AtomixBuilder {
    fn default() -> Self {
        Self::new()
    }
}
