use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("Partition {partition_id} of subject '{subject}' is referenced but not known")]
    DanglingPartition { subject: String, partition_id: i32 },

    #[error("No broker groups to allocate subject '{subject}' to")]
    NoBrokerGroups { subject: String },

    #[error("Invalid logical range [{start}, {end})")]
    InvalidLogicalRange { start: i32, end: i32 },

    #[error("Invalid number of logical partitions: {0}")]
    InvalidLogicalPartitionNum(i32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
