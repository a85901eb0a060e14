use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use qmeta_alloc::{
    AllocationServiceBuilder, BrokerGroup, ClientType, ConsumeStrategy, LogicalRange,
    MetadataCache, Partition, PartitionAllocation, PartitionProps, PartitionSet,
};
use tracing_subscriber::EnvFilter;

fn logical_partition(key: &str, logical_partition_num: i32) -> i32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % logical_partition_num as u64) as i32
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cache = MetadataCache::default();
    let service = AllocationServiceBuilder::new(cache).build().unwrap();
    let num = service.logical_partition_num();
    let broker_groups = vec![BrokerGroup::new("bg-1"), BrokerGroup::new("bg-2")];

    let keys = ["order-1", "order-2", "order-3", "order-4"];
    let print_routes = |title: &str| {
        let allocation = service
            .producer_allocation(ClientType::Producer, "orders", &broker_groups)
            .unwrap();
        println!("{title} (version {}):", allocation.version);
        for key in keys {
            let slot = logical_partition(key, num);
            let props = allocation.route(slot).unwrap();
            println!(
                "  {key:<8} -> slot {slot:>4} -> partition {:>2} on {}",
                props.partition_id, props.broker_group
            );
        }
    };

    print_routes("No partitions yet");

    let cache = service.metadata();
    cache.update_partitions((0..4).map(|i| Partition {
        subject: "orders".to_string(),
        partition_id: i,
        partition_name: format!("orders#{i}"),
        broker_group: broker_groups[i as usize % 2].group_name.clone(),
        logical_range: LogicalRange::new(i * num / 4, (i + 1) * num / 4).unwrap(),
    }));
    cache.update_partition_set(PartitionSet::new("orders", 1, 0..4));
    // c1 owns the first half, c2 is not assigned yet
    let first_half = (0..2).map(|i| {
        let partition_name = format!("orders#{i}");
        PartitionProps::new(i, partition_name, broker_groups[i as usize % 2].group_name.clone())
    });
    cache.update_partition_allocation(
        PartitionAllocation::new("orders", "billing", 1, 1).with_client("c1", first_half),
    );

    print_routes("Four partitions");

    for client_id in ["c1", "c2"] {
        let allocation = service
            .consumer_allocation(
                "orders",
                "billing",
                client_id,
                0,
                ConsumeStrategy::Exclusive,
                &[],
            )
            .unwrap();
        println!(
            "{client_id} consumes {:?} (version {})",
            allocation.partition_ids().collect::<Vec<_>>(),
            allocation.version
        );
    }
}
