use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{MetadataSnapshot, PartitionAllocation};
use crate::subject::{Partition, PartitionSet};

/// In-memory partition metadata, refreshed by the metaserver's persistence layer.
///
/// Writers copy the state on write, so a [`Snapshot`] taken before an update
/// keeps seeing the old state.
#[derive(Debug, Default)]
pub struct MetadataCache {
    state: RwLock<Arc<CacheState>>,
}

/// A frozen view of a [`MetadataCache`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    state: Arc<CacheState>,
}

#[derive(Debug, Default, Clone)]
struct CacheState {
    /// Subjects keyed by name
    subjects: HashMap<String, SubjectMetadata>,
}

#[derive(Debug, Default, Clone)]
struct SubjectMetadata {
    /// Partitions keyed by partition ID
    partitions: HashMap<i32, Arc<Partition>>,

    /// Partition sets keyed by version
    partition_sets: BTreeMap<i32, Arc<PartitionSet>>,

    /// Allocations keyed by consumer group
    allocations: HashMap<String, Arc<PartitionAllocation>>,
}

impl MetadataCache {
    pub fn is_empty(&self) -> bool {
        self.state.read().subjects.is_empty()
    }

    /// Returns the names of all subjects with metadata
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects = self
            .state
            .read()
            .subjects
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        subjects.sort();
        subjects
    }

    /// Returns a consistent view of the current state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: Arc::clone(&*self.state.read()),
        }
    }

    /// Updates with the provided partitions
    pub fn update_partitions(&self, partitions: impl IntoIterator<Item = Partition>) {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);

        for partition in partitions {
            let subject = state.subjects.entry(partition.subject.clone()).or_default();
            match subject.partitions.entry(partition.partition_id) {
                Entry::Occupied(mut o) => {
                    let current = o.get_mut();
                    if **current != partition {
                        info!(
                            subject=%partition.subject,
                            partition=partition.partition_id,
                            current=%current.logical_range,
                            new=%partition.logical_range,
                            "Partition update",
                        );
                        *current = Arc::new(partition);
                    }
                }
                Entry::Vacant(v) => {
                    info!(
                        subject=%partition.subject,
                        partition=partition.partition_id,
                        broker_group=%partition.broker_group,
                        range=%partition.logical_range,
                        "New partition",
                    );
                    v.insert(Arc::new(partition));
                }
            }
        }
    }

    /// Stores a partition set generation, replacing one with the same version
    pub fn update_partition_set(&self, partition_set: PartitionSet) {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);

        let subject = state
            .subjects
            .entry(partition_set.subject.clone())
            .or_default();
        info!(
            subject=%partition_set.subject,
            version=partition_set.version,
            partitions=partition_set.physical_partitions.len(),
            "Partition set update",
        );
        subject
            .partition_sets
            .insert(partition_set.version, Arc::new(partition_set));
    }

    /// Drops a fully decommissioned partition set generation
    pub fn retire_partition_set(&self, subject: &str, version: i32) -> bool {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);

        let retired = state
            .subjects
            .get_mut(subject)
            .and_then(|s| s.partition_sets.remove(&version))
            .is_some();
        if retired {
            info!(subject, version, "Partition set retired");
        }

        retired
    }

    /// Stores a partition allocation unless a newer one is already cached.
    ///
    /// Returns whether the allocation was stored.
    pub fn update_partition_allocation(&self, allocation: PartitionAllocation) -> bool {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);

        let subject = state
            .subjects
            .entry(allocation.subject.clone())
            .or_default();
        match subject.allocations.entry(allocation.consumer_group.clone()) {
            Entry::Occupied(mut o) => {
                let current = o.get_mut();
                if current.version > allocation.version {
                    // stale refresh
                    debug!(
                        subject=%allocation.subject,
                        consumer_group=%allocation.consumer_group,
                        current_version=current.version,
                        request_version=allocation.version,
                        "Ignoring stale partition allocation",
                    );
                    return false;
                }

                info!(
                    subject=%allocation.subject,
                    consumer_group=%allocation.consumer_group,
                    current_version=current.version,
                    new_version=allocation.version,
                    "Partition allocation update",
                );
                *current = Arc::new(allocation);
            }
            Entry::Vacant(v) => {
                info!(
                    subject=%allocation.subject,
                    consumer_group=%allocation.consumer_group,
                    version=allocation.version,
                    "New partition allocation",
                );
                v.insert(Arc::new(allocation));
            }
        }

        true
    }

    pub fn remove_partition_allocation(&self, subject: &str, consumer_group: &str) -> bool {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);

        state
            .subjects
            .get_mut(subject)
            .and_then(|s| s.allocations.remove(consumer_group))
            .is_some()
    }
}

impl CacheState {
    fn partition_sets(&self, subject: &str) -> Vec<Arc<PartitionSet>> {
        self.subjects
            .get(subject)
            .map(|s| s.partition_sets.values().cloned().collect())
            .unwrap_or_default()
    }

    fn latest_partition_set(&self, subject: &str) -> Option<Arc<PartitionSet>> {
        self.subjects
            .get(subject)?
            .partition_sets
            .values()
            .next_back()
            .cloned()
    }

    fn partition(&self, subject: &str, partition_id: i32) -> Option<Arc<Partition>> {
        self.subjects
            .get(subject)?
            .partitions
            .get(&partition_id)
            .cloned()
    }

    fn partition_allocation(
        &self,
        subject: &str,
        consumer_group: &str,
    ) -> Option<Arc<PartitionAllocation>> {
        self.subjects
            .get(subject)?
            .allocations
            .get(consumer_group)
            .cloned()
    }
}

impl MetadataSnapshot for Snapshot {
    fn partition_sets(&self, subject: &str) -> Vec<Arc<PartitionSet>> {
        self.state.partition_sets(subject)
    }

    fn partition(&self, subject: &str, partition_id: i32) -> Option<Arc<Partition>> {
        self.state.partition(subject, partition_id)
    }

    fn partition_allocation(
        &self,
        subject: &str,
        consumer_group: &str,
    ) -> Option<Arc<PartitionAllocation>> {
        self.state.partition_allocation(subject, consumer_group)
    }

    fn latest_partition_set(&self, subject: &str) -> Option<Arc<PartitionSet>> {
        self.state.latest_partition_set(subject)
    }
}

/// Every read takes the lock on its own, so a request served straight from
/// the cache can see two generations if a writer runs in between. Build the
/// service from [`MetadataCache::snapshot`] for request-consistent reads.
impl MetadataSnapshot for MetadataCache {
    fn partition_sets(&self, subject: &str) -> Vec<Arc<PartitionSet>> {
        self.state.read().partition_sets(subject)
    }

    fn partition(&self, subject: &str, partition_id: i32) -> Option<Arc<Partition>> {
        self.state.read().partition(subject, partition_id)
    }

    fn partition_allocation(
        &self,
        subject: &str,
        consumer_group: &str,
    ) -> Option<Arc<PartitionAllocation>> {
        self.state
            .read()
            .partition_allocation(subject, consumer_group)
    }

    fn latest_partition_set(&self, subject: &str) -> Option<Arc<PartitionSet>> {
        self.state.read().latest_partition_set(subject)
    }
}
