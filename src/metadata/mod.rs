//! Read-only access to the partition metadata of the metaserver.
//!
//! The allocation paths never write metadata. They are handed a
//! [`MetadataSnapshot`] and only read partitions, partition sets and
//! partition allocations from it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::subject::{Partition, PartitionProps, PartitionSet};

pub mod cache;

/// The persisted assignment of a subject's partitions to the online clients
/// of one consumer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAllocation {
    pub subject: String,

    pub consumer_group: String,

    /// Optimistic concurrency token of the allocation record.
    pub version: i32,

    /// Version of the partition set this allocation was computed from.
    pub partition_set_version: i32,

    /// Assigned partitions keyed by client ID.
    pub client_partitions: BTreeMap<String, BTreeSet<PartitionProps>>,
}

impl PartitionAllocation {
    pub fn new(
        subject: impl Into<String>,
        consumer_group: impl Into<String>,
        version: i32,
        partition_set_version: i32,
    ) -> Self {
        Self {
            subject: subject.into(),
            consumer_group: consumer_group.into(),
            version,
            partition_set_version,
            client_partitions: BTreeMap::new(),
        }
    }

    /// Assigns `partitions` to `client_id`, replacing its previous assignment.
    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        partitions: impl IntoIterator<Item = PartitionProps>,
    ) -> Self {
        self.client_partitions
            .insert(client_id.into(), partitions.into_iter().collect());
        self
    }

    /// Partitions currently assigned to `client_id`.
    pub fn client_partitions(&self, client_id: &str) -> Option<&BTreeSet<PartitionProps>> {
        self.client_partitions.get(client_id)
    }
}

/// Read-only view of the metadata cache.
///
/// Implementations hand out immutable values, so concurrent allocations never
/// observe a partially applied update of a single entity.
pub trait MetadataSnapshot: Send + Sync {
    /// All known partition sets of `subject`, current and historical.
    fn partition_sets(&self, subject: &str) -> Vec<Arc<PartitionSet>>;

    fn partition(&self, subject: &str, partition_id: i32) -> Option<Arc<Partition>>;

    fn partition_allocation(
        &self,
        subject: &str,
        consumer_group: &str,
    ) -> Option<Arc<PartitionAllocation>>;

    /// The partition set with the highest version.
    fn latest_partition_set(&self, subject: &str) -> Option<Arc<PartitionSet>> {
        self.partition_sets(subject)
            .into_iter()
            .max_by_key(|set| set.version)
    }

    /// Like [`partition`](Self::partition), but a missing partition is a
    /// dangling reference.
    fn require_partition(&self, subject: &str, partition_id: i32) -> Result<Arc<Partition>> {
        self.partition(subject, partition_id).ok_or_else(|| {
            warn!(subject, partition_id, "Dangling partition reference");

            Error::DanglingPartition {
                subject: subject.to_string(),
                partition_id,
            }
        })
    }
}

impl<T> MetadataSnapshot for Arc<T>
where
    T: MetadataSnapshot + ?Sized,
{
    fn partition_sets(&self, subject: &str) -> Vec<Arc<PartitionSet>> {
        self.as_ref().partition_sets(subject)
    }

    fn partition(&self, subject: &str, partition_id: i32) -> Option<Arc<Partition>> {
        self.as_ref().partition(subject, partition_id)
    }

    fn partition_allocation(
        &self,
        subject: &str,
        consumer_group: &str,
    ) -> Option<Arc<PartitionAllocation>> {
        self.as_ref().partition_allocation(subject, consumer_group)
    }

    fn latest_partition_set(&self, subject: &str) -> Option<Arc<PartitionSet>> {
        self.as_ref().latest_partition_set(subject)
    }
}

impl<T> MetadataSnapshot for &T
where
    T: MetadataSnapshot + ?Sized,
{
    fn partition_sets(&self, subject: &str) -> Vec<Arc<PartitionSet>> {
        (**self).partition_sets(subject)
    }

    fn partition(&self, subject: &str, partition_id: i32) -> Option<Arc<Partition>> {
        (**self).partition(subject, partition_id)
    }

    fn partition_allocation(
        &self,
        subject: &str,
        consumer_group: &str,
    ) -> Option<Arc<PartitionAllocation>> {
        (**self).partition_allocation(subject, consumer_group)
    }

    fn latest_partition_set(&self, subject: &str) -> Option<Arc<PartitionSet>> {
        (**self).latest_partition_set(subject)
    }
}
