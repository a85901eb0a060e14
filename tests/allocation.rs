mod test_helpers;

use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use qmeta_alloc::{
    AllocationServiceBuilder, BrokerGroup, ClientType, ConsumeStrategy, Error, LogicalRange,
    MetadataCache, MetadataSnapshot, PartitionAllocation, PartitionSet, ProducerAllocation,
    DEFAULT_LOGICAL_PARTITION_NUM, EMPTY_VERSION,
};
use tracing::info;

use crate::test_helpers::{even_partitions, maybe_start_logging};

const SUBJECT: &str = "orders";
const GROUP: &str = "order-processor";
const N: i32 = DEFAULT_LOGICAL_PARTITION_NUM;
const BROKER_GROUPS: &[&str] = &["bg-1", "bg-2"];

fn broker_groups() -> Vec<BrokerGroup> {
    BROKER_GROUPS.iter().map(|name| BrokerGroup::new(*name)).collect()
}

fn full_space() -> LogicalRange {
    LogicalRange::new(0, N).unwrap()
}

/// Assigns the partitions of `partition_set` to `clients` round robin.
fn round_robin(
    cache: &MetadataCache,
    partition_set: &PartitionSet,
    version: i32,
    clients: &[&str],
) -> PartitionAllocation {
    let mut allocation =
        PartitionAllocation::new(SUBJECT, GROUP, version, partition_set.version);
    for (i, partition_id) in partition_set.physical_partitions.iter().enumerate() {
        let partition = cache.partition(SUBJECT, *partition_id).unwrap();
        allocation
            .client_partitions
            .entry(clients[i % clients.len()].to_string())
            .or_default()
            .insert(partition.props());
    }
    allocation
}

#[test]
fn subject_resize_lifecycle() {
    maybe_start_logging();

    let cache = Arc::new(MetadataCache::default());
    let service = AllocationServiceBuilder::new(Arc::clone(&cache))
        .build()
        .unwrap();

    // nothing known about the subject yet
    let producer = service
        .producer_allocation(ClientType::Producer, SUBJECT, &broker_groups())
        .unwrap();
    assert_eq!(producer.version, EMPTY_VERSION);
    assert!(producer.logical_partition_map.covers(full_space()));

    let consumer = service
        .consumer_allocation(
            SUBJECT,
            GROUP,
            "c1",
            0,
            ConsumeStrategy::Exclusive,
            &broker_groups(),
        )
        .unwrap();
    assert!(consumer.is_unallocated());
    assert_eq!(consumer.partitions.len(), 2);

    // the subject gets two partitions
    cache.update_partitions(even_partitions(SUBJECT, 1, 2, N, BROKER_GROUPS));
    let v1 = PartitionSet::new(SUBJECT, 1, [1, 2]);
    cache.update_partition_set(v1.clone());
    cache.update_partition_allocation(round_robin(&cache, &v1, 1, &["c1", "c2"]));

    let producer = service
        .producer_allocation(ClientType::Producer, SUBJECT, &broker_groups())
        .unwrap();
    assert_eq!(producer.version, 1);
    assert!(producer.logical_partition_map.covers(full_space()));
    assert_eq!(producer.route(0).unwrap().partition_id, 1);
    assert_eq!(producer.route(1023).unwrap().partition_id, 2);

    let c1 = service
        .consumer_allocation(SUBJECT, GROUP, "c1", 0, ConsumeStrategy::Exclusive, &[])
        .unwrap();
    assert_eq!(c1.version, 1);
    assert_eq!(c1.partition_ids().collect::<Vec<_>>(), vec![1, 2]);

    // resized to four partitions, allocation not recomputed yet
    cache.update_partitions(even_partitions(SUBJECT, 3, 4, N, BROKER_GROUPS));
    let v2 = PartitionSet::new(SUBJECT, 2, [3, 4, 5, 6]);
    cache.update_partition_set(v2.clone());

    let producer = service
        .producer_allocation(ClientType::Producer, SUBJECT, &broker_groups())
        .unwrap();
    assert_eq!(producer.version, 2);
    assert_eq!(
        producer
            .logical_partition_map
            .values()
            .map(|props| props.partition_id)
            .collect::<Vec<_>>(),
        vec![3, 4, 5, 6]
    );

    let c1 = service
        .consumer_allocation(SUBJECT, GROUP, "c1", 0, ConsumeStrategy::Exclusive, &[])
        .unwrap();
    assert_eq!(c1.version, 1);
    assert_eq!(c1.partition_ids().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);

    // allocation recomputed over the new partition set
    cache.update_partition_allocation(round_robin(&cache, &v2, 2, &["c1", "c2"]));
    let c1 = service
        .consumer_allocation(SUBJECT, GROUP, "c1", 0, ConsumeStrategy::Exclusive, &[])
        .unwrap();
    assert_eq!(c1.version, 2);
    assert_eq!(c1.partition_ids().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);

    // old partitions drained and retired
    assert!(cache.retire_partition_set(SUBJECT, 1));
    let c1 = service
        .consumer_allocation(SUBJECT, GROUP, "c1", 0, ConsumeStrategy::Exclusive, &[])
        .unwrap();
    let c2 = service
        .consumer_allocation(SUBJECT, GROUP, "c2", 0, ConsumeStrategy::Exclusive, &[])
        .unwrap();
    info!(?c1, ?c2, "after retirement");
    assert_eq!(c1.partition_ids().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
    assert_eq!(c2.partition_ids().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
}

#[test]
fn results_reference_known_partitions() {
    maybe_start_logging();

    let cache = MetadataCache::default();
    cache.update_partitions(even_partitions(SUBJECT, 1, 3, N, &["bg-1"]));
    cache.update_partitions(even_partitions(SUBJECT, 10, 5, N, BROKER_GROUPS));
    cache.update_partition_set(PartitionSet::new(SUBJECT, 1, [1, 2, 3]));
    cache.update_partition_set(PartitionSet::new(SUBJECT, 2, 10..15));
    let v2 = cache.latest_partition_set(SUBJECT).unwrap();
    cache.update_partition_allocation(round_robin(&cache, &v2, 4, &["a", "b", "c"]));

    let snapshot = cache.snapshot();
    let service = AllocationServiceBuilder::new(snapshot.clone())
        .build()
        .unwrap();

    let producer = service
        .producer_allocation(ClientType::Producer, SUBJECT, &[])
        .unwrap();
    for props in producer.logical_partition_map.values() {
        let partition = snapshot.partition(SUBJECT, props.partition_id).unwrap();
        assert_eq!(&partition.props(), props);
    }

    for client in ["a", "b", "c", "d"] {
        let consumer = service
            .consumer_allocation(SUBJECT, GROUP, client, 0, ConsumeStrategy::Shared, &[])
            .unwrap();
        let ids = consumer.partition_ids().collect::<BTreeSet<_>>();
        assert_eq!(
            ids,
            [1, 2, 3, 10, 11, 12, 13, 14]
                .into_iter()
                .collect::<BTreeSet<_>>()
        );

        for props in &consumer.partitions {
            let partition = snapshot.partition(SUBJECT, props.partition_id).unwrap();
            assert_eq!(&partition.props(), props);
        }
    }
}

#[test]
fn snapshot_service_ignores_later_updates() {
    let cache = MetadataCache::default();
    cache.update_partitions(even_partitions(SUBJECT, 1, 2, N, BROKER_GROUPS));
    cache.update_partition_set(PartitionSet::new(SUBJECT, 1, [1, 2]));

    let service = AllocationServiceBuilder::new(cache.snapshot())
        .build()
        .unwrap();

    // resize after the service was built
    cache.update_partitions(even_partitions(SUBJECT, 3, 4, N, BROKER_GROUPS));
    cache.update_partition_set(PartitionSet::new(SUBJECT, 2, [3, 4, 5, 6]));

    let producer = service
        .producer_allocation(ClientType::Producer, SUBJECT, &[])
        .unwrap();
    assert_eq!(producer.version, 1);
    assert_eq!(
        producer
            .logical_partition_map
            .values()
            .map(|props| props.partition_id)
            .collect::<Vec<_>>(),
        vec![1, 2]
    );

    let latest = AllocationServiceBuilder::new(cache.snapshot())
        .build()
        .unwrap()
        .producer_allocation(ClientType::Producer, SUBJECT, &[])
        .unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.logical_partition_map.len(), 4);
}

#[test]
fn dangling_allocation_reference_fails() {
    let cache = MetadataCache::default();
    cache.update_partitions(even_partitions(SUBJECT, 1, 2, N, &["bg-1"]));
    cache.update_partition_set(PartitionSet::new(SUBJECT, 1, [1, 2, 3]));
    cache.update_partition_allocation(PartitionAllocation::new(SUBJECT, GROUP, 1, 1));

    let service = AllocationServiceBuilder::new(cache).build().unwrap();

    assert_matches!(
        service.producer_allocation(ClientType::Producer, SUBJECT, &broker_groups()),
        Err(Error::DanglingPartition { partition_id: 3, .. })
    );
    assert_matches!(
        service.consumer_allocation(
            SUBJECT,
            GROUP,
            "c1",
            0,
            ConsumeStrategy::Shared,
            &broker_groups()
        ),
        Err(Error::DanglingPartition { partition_id: 3, .. })
    );

    // delay producers never look at the partition set
    let delay = service
        .producer_allocation(ClientType::DelayProducer, SUBJECT, &broker_groups())
        .unwrap();
    assert!(delay.is_provisional());
}

#[test]
fn producer_allocation_wire_round_trip() {
    let cache = MetadataCache::default();
    cache.update_partitions(even_partitions(SUBJECT, 1, 3, N, BROKER_GROUPS));
    cache.update_partition_set(PartitionSet::new(SUBJECT, 5, [1, 2, 3]));
    let service = AllocationServiceBuilder::new(cache).build().unwrap();

    let allocation = service
        .producer_allocation(ClientType::Producer, SUBJECT, &[])
        .unwrap();
    let json = serde_json::to_string(&allocation).unwrap();
    let restored: ProducerAllocation = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, allocation);
    assert_eq!(restored.route(1000), allocation.route(1000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_during_resize() {
    maybe_start_logging();

    let cache = Arc::new(MetadataCache::default());
    cache.update_partitions(even_partitions(SUBJECT, 1, 2, N, BROKER_GROUPS));
    cache.update_partition_set(PartitionSet::new(SUBJECT, 1, [1, 2]));

    let readers = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let mut versions = BTreeSet::new();
                for _ in 0..500 {
                    // one frozen view per request
                    let service = AllocationServiceBuilder::new(cache.snapshot())
                        .build()
                        .unwrap();
                    let allocation = service
                        .producer_allocation(ClientType::Producer, SUBJECT, &broker_groups())
                        .unwrap();

                    assert!(allocation.logical_partition_map.covers(full_space()));
                    let ids = allocation
                        .logical_partition_map
                        .values()
                        .map(|props| props.partition_id)
                        .collect::<Vec<_>>();
                    match allocation.version {
                        1 => assert_eq!(ids, vec![1, 2]),
                        2 => assert_eq!(ids, vec![3, 4, 5, 6]),
                        v => panic!("unexpected version {v}"),
                    }
                    versions.insert(allocation.version);

                    tokio::task::yield_now().await;
                }
                versions
            })
        })
        .collect::<Vec<_>>();

    let writer = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            cache.update_partitions(even_partitions(SUBJECT, 3, 4, N, BROKER_GROUPS));
            cache.update_partition_set(PartitionSet::new(SUBJECT, 2, [3, 4, 5, 6]));
        })
    };

    writer.await.unwrap();
    for reader in readers {
        let versions = reader.await.unwrap();
        assert!(!versions.is_empty());
    }

    assert_eq!(cache.latest_partition_set(SUBJECT).unwrap().version, 2);
}
