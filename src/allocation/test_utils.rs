use crate::subject::{BrokerGroup, LogicalRange, Partition, PartitionProps};

pub(crate) fn partition(
    subject: &str,
    partition_id: i32,
    start: i32,
    end: i32,
    broker_group: &str,
) -> Partition {
    Partition {
        subject: subject.to_string(),
        partition_id,
        partition_name: format!("{subject}#{partition_id}"),
        broker_group: broker_group.to_string(),
        logical_range: LogicalRange::new(start, end).unwrap(),
    }
}

/// Descriptor matching [`partition`].
pub(crate) fn props(subject: &str, partition_id: i32, broker_group: &str) -> PartitionProps {
    PartitionProps::new(
        partition_id,
        format!("{subject}#{partition_id}"),
        broker_group,
    )
}

pub(crate) fn broker_groups(names: &[&str]) -> Vec<BrokerGroup> {
    names.iter().map(|name| BrokerGroup::new(*name)).collect()
}
