use once_cell::sync::Lazy;

use qmeta_alloc::{LogicalRange, Partition};

static LOG_SETUP: Lazy<()> = Lazy::new(|| {
    use tracing_log::LogTracer;
    use tracing_subscriber::{filter::EnvFilter, FmtSubscriber};

    LogTracer::init().expect("Cannot init log->trace integration");

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Cannot set global subscriber");
});

/// Start logging if RUST_LOG is set
#[allow(dead_code)]
pub fn maybe_start_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        Lazy::force(&LOG_SETUP);
    }
}

/// Partitions of `subject` splitting `[0, logical_partition_num)` evenly,
/// with IDs starting at `first_id` and broker groups assigned round robin.
#[allow(dead_code)]
pub fn even_partitions(
    subject: &str,
    first_id: i32,
    count: i32,
    logical_partition_num: i32,
    broker_groups: &[&str],
) -> Vec<Partition> {
    let width = logical_partition_num / count;

    (0..count)
        .map(|i| {
            let partition_id = first_id + i;
            let end = if i == count - 1 {
                logical_partition_num
            } else {
                (i + 1) * width
            };

            Partition {
                subject: subject.to_string(),
                partition_id,
                partition_name: format!("{subject}#{partition_id}"),
                broker_group: broker_groups[i as usize % broker_groups.len()].to_string(),
                logical_range: LogicalRange::new(i * width, end).unwrap(),
            }
        })
        .collect()
}
