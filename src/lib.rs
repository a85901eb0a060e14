#![doc = r#"
Partition allocation for a message queue metaserver.

Producers and consumers poll the metaserver to refresh their routing
tables. This crate computes the answers:

- a [`ProducerAllocation`] that maps a hashed logical partition to the
  physical partition (or broker group) a message should be sent to, and
- a [`ConsumerAllocation`] listing the physical partitions a single
  consumer client has to read, including partitions that still belong to
  superseded partition sets.

Both are pure functions of a [`MetadataSnapshot`]. The crate ships an
in-memory [`MetadataCache`] implementation of that interface.

```
use qmeta_alloc::{
    AllocationServiceBuilder, BrokerGroup, ClientType, MetadataCache,
};

let cache = MetadataCache::default();
let service = AllocationServiceBuilder::new(cache.snapshot()).build().unwrap();

let groups = vec![BrokerGroup::new("bg-1"), BrokerGroup::new("bg-2")];
let allocation = service
    .producer_allocation(ClientType::Producer, "orders", &groups)
    .unwrap();

assert!(allocation.is_provisional());
assert_eq!(allocation.route(0).unwrap().broker_group, "bg-1");
```
"#]
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod allocation;
pub mod error;
pub mod metadata;
pub mod range_map;
pub mod subject;

pub use error::{Error, Result};
pub use allocation::{
    AllocationService, AllocationServiceBuilder, ClientType, ConsumeStrategy, ConsumerAllocation,
    ProducerAllocation, DEFAULT_LOGICAL_PARTITION_NUM, EMPTY_PARTITION_ID, EMPTY_VERSION,
};
pub use metadata::cache::{MetadataCache, Snapshot};
pub use metadata::{MetadataSnapshot, PartitionAllocation};
pub use range_map::RangeMap;
pub use subject::{BrokerGroup, LogicalRange, Partition, PartitionProps, PartitionSet};
