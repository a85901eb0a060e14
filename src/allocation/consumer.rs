//! Consumer partition resolution.
//!
//! Resizing a subject creates a new partition set and recomputing the
//! partition allocation of its consumer groups happens afterwards, as a
//! separate step. Until then the allocation record of a group may not know
//! about every partition that still holds messages. To make sure no partition
//! is left without a consumer, every client is also handed the partitions of
//! all known partition sets that its own assignment does not name.
//!
//! A partition may therefore be resolved for more than one client of a group
//! while its subject is being resized, even under [`ConsumeStrategy::Exclusive`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::{ConsumeStrategy, ConsumerAllocation, EMPTY_VERSION};
use crate::error::{Error, Result};
use crate::metadata::{MetadataSnapshot, PartitionAllocation};
use crate::subject::{BrokerGroup, PartitionProps, PartitionSet};

pub(super) fn resolve<M>(
    metadata: &M,
    subject: &str,
    allocation: &PartitionAllocation,
    client_id: &str,
    auth_expire_time: i64,
    consume_strategy: ConsumeStrategy,
) -> Result<ConsumerAllocation>
where
    M: MetadataSnapshot,
{
    let unassigned = BTreeSet::new();
    let assigned = match allocation.client_partitions(client_id) {
        Some(assigned) => assigned,
        None => {
            // not covered by a rebalance yet
            debug!(
                subject,
                consumer_group = %allocation.consumer_group,
                client_id,
                version = allocation.version,
                "Client has no partitions assigned",
            );
            &unassigned
        }
    };

    let partition_sets = metadata.partition_sets(subject);
    let merged = merge_partition_sets(metadata, subject, assigned, &partition_sets)?;

    if merged.len() > assigned.len() {
        debug!(
            subject,
            consumer_group = %allocation.consumer_group,
            client_id,
            version = allocation.version,
            assigned = assigned.len(),
            inherited = merged.len() - assigned.len(),
            "Merged partitions of older partition sets",
        );
    }

    Ok(ConsumerAllocation {
        version: allocation.version,
        partitions: merged.into_iter().collect(),
        auth_expire_time,
        consume_strategy,
    })
}

/// Returns `assigned` plus the partitions of `partition_sets` that `assigned`
/// does not name by ID.
fn merge_partition_sets<M>(
    metadata: &M,
    subject: &str,
    assigned: &BTreeSet<PartitionProps>,
    partition_sets: &[Arc<PartitionSet>],
) -> Result<BTreeSet<PartitionProps>>
where
    M: MetadataSnapshot,
{
    let assigned_ids = assigned
        .iter()
        .map(|props| props.partition_id)
        .collect::<BTreeSet<_>>();

    let missing_ids = partition_sets
        .iter()
        .flat_map(|set| set.physical_partitions.difference(&assigned_ids))
        .copied()
        .collect::<BTreeSet<_>>();

    let mut merged = assigned.clone();
    for partition_id in missing_ids {
        let partition = metadata.require_partition(subject, partition_id)?;
        merged.insert(partition.props());
    }

    Ok(merged)
}

/// Points the client at every broker group.
pub(super) fn default_allocation(
    subject: &str,
    auth_expire_time: i64,
    consume_strategy: ConsumeStrategy,
    broker_groups: &[BrokerGroup],
) -> Result<ConsumerAllocation> {
    if broker_groups.is_empty() {
        return Err(Error::NoBrokerGroups {
            subject: subject.to_string(),
        });
    }

    Ok(ConsumerAllocation {
        version: EMPTY_VERSION,
        partitions: broker_groups
            .iter()
            .map(|broker_group| PartitionProps::broker_group_only(subject, broker_group))
            .collect(),
        auth_expire_time,
        consume_strategy,
    })
}
