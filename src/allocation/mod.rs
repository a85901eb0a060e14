//! Producer and consumer partition allocation.
//!
//! Producers hash a message into the logical partition space and look the
//! result up in their [`ProducerAllocation`]. Consumers read every partition
//! listed in their [`ConsumerAllocation`]. Both carry a version that clients
//! use to detect when they have to refresh.
//!
//! When a subject has no partition topology yet, producers and consumers are
//! pointed at broker groups directly and the allocation carries
//! [`EMPTY_VERSION`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metadata::MetadataSnapshot;
use crate::range_map::RangeMap;
use crate::subject::{BrokerGroup, PartitionProps};
use crate::error::{Error, Result};

mod consumer;
mod producer;
#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::subject::EMPTY_PARTITION_ID;

/// Size of the logical partition space producers hash into.
pub const DEFAULT_LOGICAL_PARTITION_NUM: i32 = 1024;

/// Version of allocations that are not backed by a partition set or a
/// partition allocation record.
pub const EMPTY_VERSION: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientType {
    Producer,
    Consumer,
    /// Delay queue producers always route by broker group.
    DelayProducer,
    Other,
}

/// How a consumer group shares the partitions of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumeStrategy {
    /// Every online client of the group may consume every partition.
    Shared,

    /// A partition is consumed by a single client at a time.
    Exclusive,
}

/// Routing table for the producers of a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerAllocation {
    pub subject: String,

    /// Version of the partition set the table was built from, or [`EMPTY_VERSION`].
    pub version: i32,

    pub logical_partition_map: RangeMap<PartitionProps>,
}

impl ProducerAllocation {
    /// Whether this is the default broker group mapping rather than a
    /// partition set backed one.
    pub fn is_provisional(&self) -> bool {
        self.version == EMPTY_VERSION
    }

    /// Returns the routing target for a hashed logical partition.
    pub fn route(&self, logical_partition: i32) -> Option<&PartitionProps> {
        self.logical_partition_map.get(logical_partition)
    }
}

/// The partitions one consumer client has to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerAllocation {
    /// Version of the partition allocation record, or [`EMPTY_VERSION`].
    pub version: i32,

    /// Resolved partitions are sorted by partition ID, without duplicates.
    /// Broker group only entries keep the order of the broker groups.
    pub partitions: Vec<PartitionProps>,

    /// Epoch millis until which the client may consume without re-authenticating.
    pub auth_expire_time: i64,

    pub consume_strategy: ConsumeStrategy,
}

impl ConsumerAllocation {
    pub fn is_unallocated(&self) -> bool {
        self.version == EMPTY_VERSION
    }

    pub fn is_auth_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.auth_expire_time
    }

    /// IDs of the concrete partitions, skipping broker group only entries.
    pub fn partition_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.partitions
            .iter()
            .filter(|props| !props.is_broker_group_only())
            .map(|props| props.partition_id)
    }
}

/// Builder for [`AllocationService`].
#[derive(Debug)]
pub struct AllocationServiceBuilder<M> {
    metadata: M,
    logical_partition_num: i32,
}

impl<M> AllocationServiceBuilder<M>
where
    M: MetadataSnapshot,
{
    /// Create a new [`AllocationServiceBuilder`] reading from `metadata`.
    pub fn new(metadata: M) -> Self {
        Self {
            metadata,
            logical_partition_num: DEFAULT_LOGICAL_PARTITION_NUM,
        }
    }

    /// Sets the size of the logical partition space used by the default
    /// producer allocation.
    pub fn logical_partition_num(mut self, logical_partition_num: i32) -> Self {
        self.logical_partition_num = logical_partition_num;
        self
    }

    /// Build [`AllocationService`].
    pub fn build(self) -> Result<AllocationService<M>> {
        if self.logical_partition_num <= 0 {
            return Err(Error::InvalidLogicalPartitionNum(
                self.logical_partition_num,
            ));
        }

        Ok(AllocationService {
            metadata: self.metadata,
            logical_partition_num: self.logical_partition_num,
        })
    }
}

/// Computes producer and consumer allocations from partition metadata.
///
/// Holds no state besides the metadata it reads from, so a single instance
/// can serve any number of concurrent requests.
///
/// Must be constructed using [`AllocationServiceBuilder`].
#[derive(Debug)]
pub struct AllocationService<M> {
    metadata: M,
    logical_partition_num: i32,
}

impl<M> AllocationService<M>
where
    M: MetadataSnapshot,
{
    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn logical_partition_num(&self) -> i32 {
        self.logical_partition_num
    }

    /// Returns the routing table producers of `subject` should use.
    ///
    /// `default_broker_groups` is only used, and must then be non-empty, when
    /// the subject has no partition set or the client is a delay producer.
    pub fn producer_allocation(
        &self,
        client_type: ClientType,
        subject: &str,
        default_broker_groups: &[BrokerGroup],
    ) -> Result<ProducerAllocation> {
        match self.metadata.latest_partition_set(subject) {
            Some(partition_set) if client_type != ClientType::DelayProducer => {
                producer::partition_set_allocation(
                    &self.metadata,
                    &partition_set,
                    self.logical_partition_num,
                )
            }
            _ => {
                debug!(
                    subject,
                    ?client_type,
                    broker_groups = default_broker_groups.len(),
                    "Using default producer allocation",
                );
                producer::default_allocation(
                    subject,
                    default_broker_groups,
                    self.logical_partition_num,
                )
            }
        }
    }

    /// Returns the partitions `client_id` of `consumer_group` has to consume.
    ///
    /// `default_broker_groups` is only used, and must then be non-empty, when
    /// the group has no partition allocation yet.
    pub fn consumer_allocation(
        &self,
        subject: &str,
        consumer_group: &str,
        client_id: &str,
        auth_expire_time: i64,
        consume_strategy: ConsumeStrategy,
        default_broker_groups: &[BrokerGroup],
    ) -> Result<ConsumerAllocation> {
        match self.metadata.partition_allocation(subject, consumer_group) {
            Some(allocation) => consumer::resolve(
                &self.metadata,
                subject,
                &allocation,
                client_id,
                auth_expire_time,
                consume_strategy,
            ),
            None => {
                debug!(
                    subject,
                    consumer_group,
                    client_id,
                    "Using default consumer allocation",
                );
                consumer::default_allocation(
                    subject,
                    auth_expire_time,
                    consume_strategy,
                    default_broker_groups,
                )
            }
        }
    }
}
