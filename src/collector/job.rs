// Job metrics collector
//
// Classifies every job into exactly one base-state bucket (first match in a
// fixed priority order - Slurm keeps base states exclusive, the ordered
// lookup keeps us deterministic if transitional data ever violates that),
// increments every matching flag bucket independently, and sums allocated
// CPUs and memory across the job's per-node allocation records.

use std::sync::Arc;

use async_trait::async_trait;
use prometheus::Registry;
use tracing::debug;

use crate::client::types::{Job, JobState};
use crate::client::{ClientError, SlurmClient};

use super::{register_gauge, Collector, CollectorError};

/// One scrape's aggregated job metrics.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct JobMetrics {
    pub job_count: u64,
    pub job_states: JobStates,
    pub job_tres: JobTres,
}

/// State bucket counters for jobs.
///
/// Ref: https://slurm.schedmd.com/job_state_codes.html#states
/// Ref: https://slurm.schedmd.com/job_state_codes.html#flags
#[derive(Debug, Default, PartialEq, Eq)]
pub struct JobStates {
    /// Jobs processed, regardless of classification outcome.
    pub total: u64,
    // Base states
    pub boot_fail: u64,
    pub cancelled: u64,
    pub completed: u64,
    pub deadline: u64,
    pub failed: u64,
    pub pending: u64,
    pub preempted: u64,
    pub running: u64,
    pub suspended: u64,
    pub timeout: u64,
    pub node_fail: u64,
    pub out_of_memory: u64,
    // Flag states
    pub completing: u64,
    pub configuring: u64,
    pub power_up_node: u64,
    pub stage_out: u64,
    // Other states
    pub hold: u64,
}

/// Resource allocation totals across all jobs.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct JobTres {
    pub total: u64,
    pub cpus_alloc: u64,
    pub memory_alloc: u64,
}

/// Allocation of a single job, summed over its per-node records.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct JobAlloc {
    pub cpus: u64,
    pub memory: u64,
}

type JobStateBucket = fn(&mut JobStates) -> &mut u64;

// Base buckets in priority order: the first token present wins and no
// further base bucket is incremented.
const JOB_BASE_BUCKETS: &[(JobState, JobStateBucket)] = &[
    (JobState::BootFail, |s| &mut s.boot_fail),
    (JobState::Cancelled, |s| &mut s.cancelled),
    (JobState::Completed, |s| &mut s.completed),
    (JobState::Deadline, |s| &mut s.deadline),
    (JobState::Failed, |s| &mut s.failed),
    (JobState::Pending, |s| &mut s.pending),
    (JobState::Preempted, |s| &mut s.preempted),
    (JobState::Running, |s| &mut s.running),
    (JobState::Suspended, |s| &mut s.suspended),
    (JobState::Timeout, |s| &mut s.timeout),
    (JobState::NodeFail, |s| &mut s.node_fail),
    (JobState::OutOfMemory, |s| &mut s.out_of_memory),
];

// Flag buckets are independent: every token present increments its bucket.
const JOB_FLAG_BUCKETS: &[(JobState, JobStateBucket)] = &[
    (JobState::Completing, |s| &mut s.completing),
    (JobState::Configuring, |s| &mut s.configuring),
    (JobState::PowerUpNode, |s| &mut s.power_up_node),
    (JobState::StageOut, |s| &mut s.stage_out),
];

/// Classifies one job into the running bucket counters.
///
/// Never fails; a job with no recognized base token still counts toward
/// `total` but increments no base bucket.
pub fn classify_job(states: &mut JobStates, job: &Job) {
    states.total += 1;
    let tokens = job.states();

    for (token, bucket) in JOB_BASE_BUCKETS {
        if tokens.contains(token) {
            *bucket(states) += 1;
            break;
        }
    }
    for (token, bucket) in JOB_FLAG_BUCKETS {
        if tokens.contains(token) {
            *bucket(states) += 1;
        }
    }
    // Hold is an attribute, not a state token.
    if job.hold.unwrap_or(false) {
        states.hold += 1;
    }
}

/// Sums allocated CPUs and memory over a job's per-node allocation records.
///
/// A job with no resource substructure (e.g. still pending) contributes
/// zero to both.
pub fn job_resource_alloc(job: &Job) -> JobAlloc {
    let mut alloc = JobAlloc::default();
    let records = job
        .job_resources
        .as_ref()
        .and_then(|res| res.nodes.as_ref())
        .and_then(|nodes| nodes.allocation.as_deref())
        .unwrap_or_default();
    for record in records {
        if let Some(cpus) = &record.cpus {
            alloc.cpus += cpus.count.unwrap_or(0);
        }
        if let Some(memory) = &record.memory {
            alloc.memory += memory.allocated.unwrap_or(0);
        }
    }
    alloc
}

fn tally_job(tres: &mut JobTres, job: &Job) {
    tres.total += 1;
    let alloc = job_resource_alloc(job);
    tres.cpus_alloc += alloc.cpus;
    tres.memory_alloc += alloc.memory;
}

/// Folds a job list into one snapshot. Order-independent.
pub fn aggregate_jobs(jobs: &[Job]) -> JobMetrics {
    let mut metrics = JobMetrics {
        job_count: jobs.len() as u64,
        ..Default::default()
    };
    for job in jobs {
        classify_job(&mut metrics.job_states, job);
        tally_job(&mut metrics.job_tres, job);
    }
    metrics
}

// Exposition schema. Metric names are a stable contract; changing them
// breaks dashboards.
// Ref: https://prometheus.io/docs/practices/naming/#metric-names
const JOB_STATE_GAUGES: &[(&str, &str, fn(&JobStates) -> u64)] = &[
    ("slurm_jobs_bootfail_total", "Number of jobs in BootFail state", |s| s.boot_fail),
    ("slurm_jobs_cancelled_total", "Number of jobs in Cancelled state", |s| s.cancelled),
    ("slurm_jobs_completed_total", "Number of jobs in Completed state", |s| s.completed),
    ("slurm_jobs_deadline_total", "Number of jobs in Deadline state", |s| s.deadline),
    ("slurm_jobs_failed_total", "Number of jobs in Failed state", |s| s.failed),
    ("slurm_jobs_pending_total", "Number of jobs in Pending state", |s| s.pending),
    ("slurm_jobs_preempted_total", "Number of jobs in Preempted state", |s| s.preempted),
    ("slurm_jobs_running_total", "Number of jobs in Running state", |s| s.running),
    ("slurm_jobs_suspended_total", "Number of jobs in Suspended state", |s| s.suspended),
    ("slurm_jobs_timeout_total", "Number of jobs in Timeout state", |s| s.timeout),
    ("slurm_jobs_nodefail_total", "Number of jobs in NodeFail state", |s| s.node_fail),
    ("slurm_jobs_outofmemory_total", "Number of jobs in OutOfMemory state", |s| s.out_of_memory),
    ("slurm_jobs_completing_total", "Number of jobs with Completing flag", |s| s.completing),
    ("slurm_jobs_configuring_total", "Number of jobs with Configuring flag", |s| s.configuring),
    ("slurm_jobs_powerupnode_total", "Number of jobs with PowerUpNode flag", |s| s.power_up_node),
    ("slurm_jobs_stageout_total", "Number of jobs with StageOut flag", |s| s.stage_out),
    ("slurm_jobs_hold_total", "Number of jobs with Hold flag", |s| s.hold),
];

const JOB_TRES_GAUGES: &[(&str, &str, fn(&JobTres) -> u64)] = &[
    ("slurm_jobs_cpus_alloc_total", "Number of allocated CPUs among jobs", |t| t.cpus_alloc),
    ("slurm_jobs_memory_alloc_bytes", "Amount of allocated memory (MB) among jobs", |t| {
        t.memory_alloc
    }),
];

/// Collector for job metrics.
pub struct JobCollector {
    client: Arc<dyn SlurmClient>,
}

impl JobCollector {
    pub fn new(client: Arc<dyn SlurmClient>) -> Self {
        JobCollector { client }
    }

    /// Reads the job list once and aggregates it into a fresh snapshot.
    async fn metrics(&self) -> Result<JobMetrics, ClientError> {
        let jobs = self.client.list_jobs().await?;
        Ok(aggregate_jobs(&jobs))
    }
}

#[async_trait]
impl Collector for JobCollector {
    fn name(&self) -> &'static str {
        "jobs"
    }

    async fn collect(&self, registry: &Registry) -> Result<(), CollectorError> {
        debug!("collecting job metrics");
        let metrics = self.metrics().await?;

        register_gauge(
            registry,
            "slurm_jobs_total",
            "Total number of jobs",
            metrics.job_count,
        )?;
        for &(name, help, field) in JOB_STATE_GAUGES {
            register_gauge(registry, name, help, field(&metrics.job_states))?;
        }
        for &(name, help, field) in JOB_TRES_GAUGES {
            register_gauge(registry, name, help, field(&metrics.job_tres))?;
        }
        Ok(())
    }
}
