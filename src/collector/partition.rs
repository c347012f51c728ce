// Partition metrics collector
//
// Partitions carry a small state set (Up, Down, Drain, Inactive) and flat
// capacity totals. Like nodes, collection keeps a per-partition tally map
// for labeled exposition.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use prometheus::Registry;
use tracing::debug;

use crate::client::types::{Partition, PartitionState};
use crate::client::{ClientError, SlurmClient};

use super::{register_gauge, register_gauge_per_key, Collector, CollectorError};

/// One scrape's aggregated partition metrics.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PartitionMetrics {
    pub partition_count: u64,
    pub partition_states: PartitionStates,
    pub partition_tres: PartitionTres,
    /// Per-partition tallies keyed by partition name.
    pub partition_tres_per: HashMap<String, PartitionTres>,
}

/// State bucket counters for partitions.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PartitionStates {
    pub total: u64,
    pub up: u64,
    pub down: u64,
    pub drain: u64,
    pub inactive: u64,
}

/// Capacity totals for one partition or for the whole cluster.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartitionTres {
    pub total: u64,
    pub cpus_total: u64,
    pub nodes_total: u64,
}

type PartitionStateBucket = fn(&mut PartitionStates) -> &mut u64;

const PARTITION_BASE_BUCKETS: &[(PartitionState, PartitionStateBucket)] = &[
    (PartitionState::Up, |s| &mut s.up),
    (PartitionState::Down, |s| &mut s.down),
    (PartitionState::Drain, |s| &mut s.drain),
    (PartitionState::Inactive, |s| &mut s.inactive),
];

/// Classifies one partition into the running bucket counters. Never fails.
pub fn classify_partition(states: &mut PartitionStates, partition: &Partition) {
    states.total += 1;
    let tokens = partition.states();
    for (token, bucket) in PARTITION_BASE_BUCKETS {
        if tokens.contains(token) {
            *bucket(states) += 1;
            break;
        }
    }
}

/// Adds one partition's capacity fields into the running tallies.
pub fn tally_partition(tres: &mut PartitionTres, partition: &Partition) {
    tres.total += 1;
    tres.cpus_total += partition
        .cpus
        .as_ref()
        .and_then(|c| c.total)
        .unwrap_or(0);
    tres.nodes_total += partition
        .nodes
        .as_ref()
        .and_then(|n| n.total)
        .unwrap_or(0);
}

/// Folds a partition list into one snapshot.
pub fn aggregate_partitions(partitions: &[Partition]) -> PartitionMetrics {
    let mut metrics = PartitionMetrics {
        partition_count: partitions.len() as u64,
        ..Default::default()
    };
    for partition in partitions {
        classify_partition(&mut metrics.partition_states, partition);
        tally_partition(&mut metrics.partition_tres, partition);
        if let Some(name) = &partition.name {
            let per = metrics.partition_tres_per.entry(name.clone()).or_default();
            tally_partition(per, partition);
        }
    }
    metrics
}

const PARTITION_STATE_GAUGES: &[(&str, &str, fn(&PartitionStates) -> u64)] = &[
    ("slurm_partitions_up_total", "Number of partitions in Up state", |s| s.up),
    ("slurm_partitions_down_total", "Number of partitions in Down state", |s| s.down),
    ("slurm_partitions_drain_total", "Number of partitions in Drain state", |s| s.drain),
    ("slurm_partitions_inactive_total", "Number of partitions in Inactive state", |s| {
        s.inactive
    }),
];

const PARTITION_TRES_GAUGES: &[(&str, &str, fn(&PartitionTres) -> u64)] = &[
    ("slurm_partitions_cpus_total", "Total number of CPUs among partitions", |t| t.cpus_total),
    ("slurm_partitions_nodes_total", "Total number of nodes among partitions", |t| {
        t.nodes_total
    }),
];

const PARTITION_TRES_PER_GAUGES: &[(&str, &str, fn(&PartitionTres) -> u64)] = &[
    ("slurm_partition_cpus_total", "Total number of CPUs in the partition", |t| t.cpus_total),
    ("slurm_partition_nodes_total", "Total number of nodes in the partition", |t| {
        t.nodes_total
    }),
];

/// Collector for partition metrics.
pub struct PartitionCollector {
    client: Arc<dyn SlurmClient>,
}

impl PartitionCollector {
    pub fn new(client: Arc<dyn SlurmClient>) -> Self {
        PartitionCollector { client }
    }

    async fn metrics(&self) -> Result<PartitionMetrics, ClientError> {
        let partitions = self.client.list_partitions().await?;
        Ok(aggregate_partitions(&partitions))
    }
}

#[async_trait]
impl Collector for PartitionCollector {
    fn name(&self) -> &'static str {
        "partitions"
    }

    async fn collect(&self, registry: &Registry) -> Result<(), CollectorError> {
        debug!("collecting partition metrics");
        let metrics = self.metrics().await?;

        register_gauge(
            registry,
            "slurm_partitions_total",
            "Total number of partitions",
            metrics.partition_count,
        )?;
        for &(name, help, field) in PARTITION_STATE_GAUGES {
            register_gauge(registry, name, help, field(&metrics.partition_states))?;
        }
        for &(name, help, field) in PARTITION_TRES_GAUGES {
            register_gauge(registry, name, help, field(&metrics.partition_tres))?;
        }
        for &(name, help, field) in PARTITION_TRES_PER_GAUGES {
            register_gauge_per_key(
                registry,
                name,
                help,
                "partition",
                metrics
                    .partition_tres_per
                    .iter()
                    .map(|(partition, tres)| (partition.as_str(), field(tres))),
            )?;
        }
        Ok(())
    }
}
