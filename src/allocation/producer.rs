//! Producer routing tables.

use tracing::{debug, warn};

use super::{ProducerAllocation, EMPTY_VERSION};
use crate::error::{Error, Result};
use crate::metadata::MetadataSnapshot;
use crate::range_map::RangeMap;
use crate::subject::{BrokerGroup, LogicalRange, PartitionProps, PartitionSet};

/// Routes each partition's logical range to that partition.
///
/// Ranges are taken from the partitions as they are. Gaps and overlaps are
/// the responsibility of whoever created the partition set.
pub(super) fn partition_set_allocation<M>(
    metadata: &M,
    partition_set: &PartitionSet,
    logical_partition_num: i32,
) -> Result<ProducerAllocation>
where
    M: MetadataSnapshot,
{
    let subject = partition_set.subject.as_str();

    let mut logical_partition_map = RangeMap::new();
    for partition_id in &partition_set.physical_partitions {
        let partition = metadata.require_partition(subject, *partition_id)?;
        logical_partition_map.insert(
            partition.logical_range,
            PartitionProps::new(
                *partition_id,
                partition.partition_name.clone(),
                partition.broker_group.clone(),
            ),
        );
    }

    let logical_space = LogicalRange::new_unchecked(0, logical_partition_num);
    if !logical_partition_map.covers(logical_space) {
        warn!(
            subject,
            version = partition_set.version,
            span = ?logical_partition_map.span(),
            "Partition set does not cover the logical partition space",
        );
    }

    debug!(
        subject,
        version = partition_set.version,
        partitions = logical_partition_map.len(),
        "Built producer allocation from partition set",
    );

    Ok(ProducerAllocation {
        subject: subject.to_string(),
        version: partition_set.version,
        logical_partition_map,
    })
}

/// Splits `[0, logical_partition_num)` evenly across `broker_groups`, in order.
///
/// Each group takes the next `ceil(logical_partition_num / broker_groups.len())`
/// logical partitions, clamped to the end of the space. Once the space is used
/// up, the remaining groups get no range at all and a warning is logged.
pub(super) fn default_allocation(
    subject: &str,
    broker_groups: &[BrokerGroup],
    logical_partition_num: i32,
) -> Result<ProducerAllocation> {
    if broker_groups.is_empty() {
        return Err(Error::NoBrokerGroups {
            subject: subject.to_string(),
        });
    }

    let groups = i32::try_from(broker_groups.len()).unwrap_or(i32::MAX);
    let step = logical_partition_num / groups + i32::from(logical_partition_num % groups != 0);

    let mut logical_partition_map = RangeMap::new();
    let mut start: i32 = 0;
    for broker_group in broker_groups {
        let end = start.saturating_add(step).min(logical_partition_num);
        if start >= end {
            warn!(
                subject,
                %broker_group,
                logical_partition_num,
                "No logical partitions left for broker group",
            );
            continue;
        }

        logical_partition_map.insert(
            LogicalRange::new_unchecked(start, end),
            PartitionProps::broker_group_only(subject, broker_group),
        );
        start = end;
    }

    Ok(ProducerAllocation {
        subject: subject.to_string(),
        version: EMPTY_VERSION,
        logical_partition_map,
    })
}
