//! Partition topology of a subject.
//!
//! A subject is split into physical partitions, each owned by one broker group
//! and covering a slice of the logical partition space producers hash into.
//! The physical partitions of a subject are grouped into versioned
//! [`PartitionSet`]s: resizing a subject creates a new set while the older
//! ones stay around until their partitions are retired.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Partition ID used by descriptors that route by broker group only.
pub const EMPTY_PARTITION_ID: i32 = -1;

/// A deployable group of brokers, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrokerGroup {
    pub group_name: String,
}

impl BrokerGroup {
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
        }
    }
}

impl Display for BrokerGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.group_name)
    }
}

/// Half-open interval `[start, end)` of the logical partition space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawLogicalRange")]
pub struct LogicalRange {
    start: i32,
    end: i32,
}

#[derive(Deserialize)]
struct RawLogicalRange {
    start: i32,
    end: i32,
}

impl TryFrom<RawLogicalRange> for LogicalRange {
    type Error = Error;

    fn try_from(raw: RawLogicalRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl LogicalRange {
    /// Creates a non-empty range.
    pub fn new(start: i32, end: i32) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidLogicalRange { start, end });
        }

        Ok(Self { start, end })
    }

    pub(crate) fn new_unchecked(start: i32, end: i32) -> Self {
        debug_assert!(start < end, "empty logical range [{start}, {end})");
        Self { start, end }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    /// Number of logical partitions in this range.
    pub fn width(&self) -> u32 {
        self.end.abs_diff(self.start)
    }

    pub fn contains(&self, point: i32) -> bool {
        self.start <= point && point < self.end
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl Display for LogicalRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A physical partition of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub subject: String,

    /// Unique within the subject.
    pub partition_id: i32,

    pub partition_name: String,

    /// Name of the broker group hosting this partition.
    pub broker_group: String,

    /// The slice of the logical partition space routed to this partition.
    pub logical_range: LogicalRange,
}

impl Partition {
    /// Routing descriptor for this partition.
    pub fn props(&self) -> PartitionProps {
        PartitionProps::new(
            self.partition_id,
            self.partition_name.clone(),
            self.broker_group.clone(),
        )
    }
}

/// One generation of a subject's physical partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSet {
    pub subject: String,

    /// Strictly increasing across generations of the same subject.
    pub version: i32,

    pub physical_partitions: BTreeSet<i32>,
}

impl PartitionSet {
    pub fn new(
        subject: impl Into<String>,
        version: i32,
        physical_partitions: impl IntoIterator<Item = i32>,
    ) -> Self {
        Self {
            subject: subject.into(),
            version,
            physical_partitions: physical_partitions.into_iter().collect(),
        }
    }
}

/// Routing descriptor handed out to producers and consumers.
///
/// Compared by value. Ordering is by partition ID first, so sorted
/// collections of descriptors list partitions in ID order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionProps {
    /// [`EMPTY_PARTITION_ID`] when the descriptor names a broker group only.
    pub partition_id: i32,

    /// Partition name, or the subject for broker-group-only descriptors.
    pub partition_name: String,

    pub broker_group: String,
}

impl PartitionProps {
    pub fn new(
        partition_id: i32,
        partition_name: impl Into<String>,
        broker_group: impl Into<String>,
    ) -> Self {
        Self {
            partition_id,
            partition_name: partition_name.into(),
            broker_group: broker_group.into(),
        }
    }

    /// Descriptor routing `subject` to `broker_group` without a concrete partition.
    pub fn broker_group_only(subject: &str, broker_group: &BrokerGroup) -> Self {
        Self::new(EMPTY_PARTITION_ID, subject, broker_group.group_name.clone())
    }

    pub fn is_broker_group_only(&self) -> bool {
        self.partition_id == EMPTY_PARTITION_ID
    }
}
