// Collector module - the metrics aggregation core
//
// One submodule per entity kind (jobs, nodes, partitions, scheduler stats).
// Each kind follows the same shape:
// 1. Snapshot structs of plain u64 accumulators, built fresh per scrape
// 2. Pure classification/tally functions folding one entity at a time
// 3. A collector that issues exactly one list-read and registers the
//    snapshot as gauges into a per-scrape registry
//
// A read failure aborts the whole kind for that scrape - no partial
// snapshots. Classification and tally never fail: unrecognized state tokens
// are ignored and missing resource fields count as zero.

use std::sync::Arc;

use async_trait::async_trait;
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};
use thiserror::Error;

use crate::client::{ClientError, SlurmClient};

pub mod job;
pub mod node;
pub mod partition;
pub mod scheduler;

/// Errors that can abort one kind's collection for the current scrape.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("slurm read failed: {0}")]
    Read(#[from] ClientError),

    #[error("metric registration failed: {0}")]
    Register(#[from] prometheus::Error),
}

/// One metrics collector per entity kind.
///
/// `collect` reads the kind's entity list once, aggregates it, and registers
/// the resulting gauges into `registry`. Collectors hold no state between
/// invocations; kinds are independent and may be collected concurrently.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short kind name used in logs.
    fn name(&self) -> &'static str;

    /// Collects this kind's metrics into the per-scrape registry.
    ///
    /// On error nothing has been registered for this kind; other kinds are
    /// unaffected.
    async fn collect(&self, registry: &Registry) -> Result<(), CollectorError>;
}

/// Creates the collectors for all entity kinds, sharing one client.
pub fn create_all_collectors(client: Arc<dyn SlurmClient>) -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(job::JobCollector::new(client.clone())),
        Box::new(node::NodeCollector::new(client.clone())),
        Box::new(partition::PartitionCollector::new(client.clone())),
        Box::new(scheduler::SchedulerCollector::new(client)),
    ]
}

/// Registers a single unlabeled gauge with a fixed value.
fn register_gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    value: u64,
) -> Result<(), prometheus::Error> {
    let gauge = IntGauge::with_opts(Opts::new(name, help))?;
    gauge.set(value as i64);
    registry.register(Box::new(gauge))
}

/// Registers one gauge family with a single label and one point per key.
fn register_gauge_per_key<'a>(
    registry: &Registry,
    name: &str,
    help: &str,
    label: &str,
    values: impl IntoIterator<Item = (&'a str, u64)>,
) -> Result<(), prometheus::Error> {
    let family = IntGaugeVec::new(Opts::new(name, help), &[label])?;
    for (key, value) in values {
        family.with_label_values(&[key]).set(value as i64);
    }
    registry.register(Box::new(family))
}
