// Scheduler statistics collector
//
// Pure pass-through of the sdiag counters: one read, no classification,
// every unset field exposed as zero. Values are gauges even where they look
// cumulative - slurmctld resets them on its own schedule, so they can
// decrease between scrapes.

use std::sync::Arc;

use async_trait::async_trait;
use prometheus::Registry;
use tracing::debug;

use crate::client::types::SchedulerStats;
use crate::client::SlurmClient;

use super::{register_gauge, Collector, CollectorError};

fn opt(value: Option<u64>) -> u64 {
    value.unwrap_or(0)
}

const SCHEDULER_GAUGES: &[(&str, &str, fn(&SchedulerStats) -> u64)] = &[
    // Main scheduler cycle
    ("slurm_scheduler_cycle_last", "Last scheduler cycle time (usec)", |s| {
        opt(s.schedule_cycle_last)
    }),
    ("slurm_scheduler_cycle_max", "Max scheduler cycle time (usec)", |s| {
        opt(s.schedule_cycle_max)
    }),
    ("slurm_scheduler_cycle_mean", "Mean scheduler cycle time (usec)", |s| {
        opt(s.schedule_cycle_mean)
    }),
    ("slurm_scheduler_cycle_mean_depth", "Mean of cycle queue depth", |s| {
        opt(s.schedule_cycle_mean_depth)
    }),
    ("slurm_scheduler_cycle_per_minute", "Scheduler cycles per minute", |s| {
        opt(s.schedule_cycle_per_minute)
    }),
    ("slurm_scheduler_cycle_total", "Total number of scheduler cycles", |s| {
        opt(s.schedule_cycle_total)
    }),
    ("slurm_scheduler_queue_length", "Length of the scheduler queue", |s| {
        opt(s.schedule_queue_length)
    }),
    // Backfill scheduler
    ("slurm_scheduler_bf_active", "Whether the backfill scheduler is running", |s| {
        s.bf_active.unwrap_or(false) as u64
    }),
    ("slurm_scheduler_bf_backfilled_jobs_total", "Number of jobs started through backfill", |s| {
        opt(s.bf_backfilled_jobs)
    }),
    ("slurm_scheduler_bf_last_backfilled_jobs", "Jobs backfilled since the last stats reset", |s| {
        opt(s.bf_last_backfilled_jobs)
    }),
    ("slurm_scheduler_bf_backfilled_het_jobs_total", "Heterogeneous job components started through backfill", |s| {
        opt(s.bf_backfilled_het_jobs)
    }),
    ("slurm_scheduler_bf_cycle_counter", "Number of backfill cycles", |s| {
        opt(s.bf_cycle_counter)
    }),
    ("slurm_scheduler_bf_cycle_last", "Last backfill cycle time (usec)", |s| {
        opt(s.bf_cycle_last)
    }),
    ("slurm_scheduler_bf_cycle_max", "Max backfill cycle time (usec)", |s| {
        opt(s.bf_cycle_max)
    }),
    ("slurm_scheduler_bf_cycle_mean", "Mean backfill cycle time (usec)", |s| {
        opt(s.bf_cycle_mean)
    }),
    ("slurm_scheduler_bf_depth_mean", "Mean backfill cycle depth", |s| opt(s.bf_depth_mean)),
    ("slurm_scheduler_bf_depth_mean_try", "Mean backfill depth of jobs tried", |s| {
        opt(s.bf_depth_mean_try)
    }),
    ("slurm_scheduler_bf_last_depth", "Backfill depth of the last cycle", |s| {
        opt(s.bf_last_depth)
    }),
    ("slurm_scheduler_bf_last_depth_try", "Jobs tried in the last backfill cycle", |s| {
        opt(s.bf_last_depth_try)
    }),
    ("slurm_scheduler_bf_queue_len", "Length of the backfill queue", |s| opt(s.bf_queue_len)),
    ("slurm_scheduler_bf_queue_len_mean", "Mean length of the backfill queue", |s| {
        opt(s.bf_queue_len_mean)
    }),
    ("slurm_scheduler_bf_table_size", "Size of the backfill node-time table", |s| {
        opt(s.bf_table_size)
    }),
    // Job turnover since the last stats reset
    ("slurm_scheduler_jobs_submitted", "Number of jobs submitted", |s| opt(s.jobs_submitted)),
    ("slurm_scheduler_jobs_started", "Number of jobs started", |s| opt(s.jobs_started)),
    ("slurm_scheduler_jobs_completed", "Number of jobs completed", |s| opt(s.jobs_completed)),
    ("slurm_scheduler_jobs_canceled", "Number of jobs canceled", |s| opt(s.jobs_canceled)),
    ("slurm_scheduler_jobs_failed", "Number of jobs failed", |s| opt(s.jobs_failed)),
    ("slurm_scheduler_jobs_pending", "Number of jobs pending", |s| opt(s.jobs_pending)),
    ("slurm_scheduler_jobs_running", "Number of jobs running", |s| opt(s.jobs_running)),
    // Daemon internals
    ("slurm_scheduler_server_threads", "Number of slurmctld server threads", |s| {
        opt(s.server_thread_count)
    }),
    ("slurm_scheduler_agent_count", "Number of agent queues", |s| opt(s.agent_count)),
    ("slurm_scheduler_agent_queue_size", "Size of the agent queue", |s| {
        opt(s.agent_queue_size)
    }),
    ("slurm_scheduler_agent_threads", "Number of agent threads", |s| {
        opt(s.agent_thread_count)
    }),
    ("slurm_scheduler_dbd_agent_queue_size", "Size of the slurmdbd agent queue", |s| {
        opt(s.dbd_agent_queue_size)
    }),
];

/// Collector for scheduler (sdiag) statistics.
pub struct SchedulerCollector {
    client: Arc<dyn SlurmClient>,
}

impl SchedulerCollector {
    pub fn new(client: Arc<dyn SlurmClient>) -> Self {
        SchedulerCollector { client }
    }
}

#[async_trait]
impl Collector for SchedulerCollector {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    async fn collect(&self, registry: &Registry) -> Result<(), CollectorError> {
        debug!("collecting scheduler statistics");
        let stats = self.client.diag().await?;

        for &(name, help, field) in SCHEDULER_GAUGES {
            register_gauge(registry, name, help, field(&stats))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use crate::collector::fixtures;

    #[tokio::test]
    async fn collect_registers_full_schema() {
        let client = Arc::new(FakeClient::new().with_stats(fixtures::stats()));
        let collector = SchedulerCollector::new(client);
        let registry = Registry::new();
        collector.collect(&registry).await.unwrap();

        let families = registry.gather();
        assert_eq!(families.len(), SCHEDULER_GAUGES.len());

        let find = |name: &str| {
            families
                .iter()
                .find(|f| f.get_name() == name)
                .unwrap_or_else(|| panic!("missing family {name}"))
                .get_metric()[0]
                .get_gauge()
                .get_value() as u64
        };
        assert_eq!(find("slurm_scheduler_cycle_last"), 1);
        assert_eq!(find("slurm_scheduler_bf_active"), 1);
        assert_eq!(find("slurm_scheduler_bf_queue_len"), 3);
        assert_eq!(find("slurm_scheduler_jobs_submitted"), 5);
        assert_eq!(find("slurm_scheduler_server_threads"), 7);
        assert_eq!(find("slurm_scheduler_dbd_agent_queue_size"), 8);
    }

    #[tokio::test]
    async fn unset_fields_read_as_zero() {
        let client = Arc::new(FakeClient::new());
        let collector = SchedulerCollector::new(client);
        let registry = Registry::new();
        collector.collect(&registry).await.unwrap();
        for family in registry.gather() {
            assert_eq!(family.get_metric()[0].get_gauge().get_value(), 0.0);
        }
    }

    #[tokio::test]
    async fn collect_emits_nothing_on_read_failure() {
        let client = Arc::new(FakeClient::new().failing());
        let collector = SchedulerCollector::new(client);
        let registry = Registry::new();
        assert!(collector.collect(&registry).await.is_err());
        assert!(registry.gather().is_empty());
    }
}
