// Wire types for the slurmrestd v0.0.43 API
//
// Every field is optional: slurmrestd omits fields freely depending on
// entity state (a pending job has no resource allocation, a cloud node may
// not report free memory). Absence is data, never an error - the collectors
// substitute zero.
//
// State token enums carry a `#[serde(other)]` catch-all so that tokens
// introduced by newer Slurm releases deserialize without failing the whole
// list; the classifiers simply ignore them.

use serde::Deserialize;

/// Job state tokens.
///
/// Base states (BootFail through OutOfMemory) are mutually exclusive by
/// Slurm's convention, flag states (Completing through StageOut) are
/// independent booleans. The wire format is a flat list that does not
/// enforce the distinction; the classifier does.
///
/// Ref: https://slurm.schedmd.com/job_state_codes.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    // Base states
    BootFail,
    Cancelled,
    Completed,
    Deadline,
    Failed,
    NodeFail,
    OutOfMemory,
    Pending,
    Preempted,
    Running,
    Suspended,
    Timeout,
    // Flag states
    Completing,
    Configuring,
    LaunchFailed,
    PowerUpNode,
    ReconfigFail,
    Requeued,
    RequeueFed,
    RequeueHold,
    Resizing,
    ResvDelHold,
    Revoked,
    Signaling,
    SpecialExit,
    StageOut,
    Stopped,
    // Anything newer than this enum
    #[serde(other)]
    Other,
}

/// Node state tokens.
///
/// Ref: https://slurm.schedmd.com/sinfo.html#SECTION_NODE-STATE-CODES
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    // Base states
    Allocated,
    Down,
    Error,
    Future,
    Idle,
    Mixed,
    Unknown,
    // Flag states
    Cloud,
    Completing,
    Drain,
    DynamicFuture,
    DynamicNorm,
    Fail,
    Invalid,
    InvalidReg,
    Maintenance,
    NotResponding,
    Planned,
    PowerDown,
    PowerDrain,
    PoweredDown,
    PoweringDown,
    PoweringUp,
    PowerUp,
    RebootCanceled,
    RebootIssued,
    RebootRequested,
    Reserved,
    Resume,
    Undrain,
    #[serde(other)]
    Other,
}

/// Partition state tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionState {
    Up,
    Down,
    Drain,
    Inactive,
    #[serde(other)]
    Other,
}

/// Slurm's {set, infinite, number} wrapper for values that may be unset.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NoVal {
    #[serde(default)]
    pub set: Option<bool>,
    #[serde(default)]
    pub infinite: Option<bool>,
    #[serde(default)]
    pub number: Option<u64>,
}

impl NoVal {
    /// Returns the wrapped number, or zero when the value is marked unset
    /// or infinite.
    pub fn value(&self) -> u64 {
        if self.set.unwrap_or(false) && !self.infinite.unwrap_or(false) {
            self.number.unwrap_or(0)
        } else {
            0
        }
    }
}

/// One job record as returned by `GET /slurm/v0.0.43/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub job_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub job_state: Option<Vec<JobState>>,
    /// Carried outside the state token list.
    #[serde(default)]
    pub hold: Option<bool>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub job_resources: Option<JobResources>,
}

impl Job {
    /// Returns the job's state token list, empty when absent.
    pub fn states(&self) -> &[JobState] {
        self.job_state.as_deref().unwrap_or_default()
    }
}

/// Resource accounting substructure of a job. Present only once the job has
/// an allocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResources {
    #[serde(default)]
    pub nodes: Option<JobResNodes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResNodes {
    /// One record per compute node assigned to the job.
    #[serde(default)]
    pub allocation: Option<Vec<JobResNode>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResNode {
    #[serde(default)]
    pub cpus: Option<JobResNodeCpus>,
    #[serde(default)]
    pub memory: Option<JobResNodeMemory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResNodeCpus {
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResNodeMemory {
    #[serde(default)]
    pub allocated: Option<u64>,
}

/// One node record as returned by `GET /slurm/v0.0.43/nodes`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<Vec<NodeState>>,
    #[serde(default)]
    pub partitions: Option<Vec<String>>,
    #[serde(default)]
    pub cpus: Option<u64>,
    /// Schedulable CPUs: total minus core-specialized.
    #[serde(default)]
    pub effective_cpus: Option<u64>,
    #[serde(default)]
    pub alloc_cpus: Option<u64>,
    #[serde(default)]
    pub alloc_idle_cpus: Option<u64>,
    #[serde(default)]
    pub real_memory: Option<u64>,
    #[serde(default)]
    pub specialized_memory: Option<u64>,
    #[serde(default)]
    pub alloc_memory: Option<u64>,
    #[serde(default)]
    pub free_mem: Option<NoVal>,
}

impl Node {
    /// Returns the node's state token list, empty when absent.
    pub fn states(&self) -> &[NodeState] {
        self.state.as_deref().unwrap_or_default()
    }
}

/// One partition record as returned by `GET /slurm/v0.0.43/partitions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Partition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub partition: Option<PartitionInfo>,
    #[serde(default)]
    pub cpus: Option<PartitionCpus>,
    #[serde(default)]
    pub nodes: Option<PartitionNodes>,
}

impl Partition {
    /// Returns the partition's state token list, empty when absent.
    pub fn states(&self) -> &[PartitionState] {
        self.partition
            .as_ref()
            .and_then(|p| p.state.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartitionInfo {
    #[serde(default)]
    pub state: Option<Vec<PartitionState>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartitionCpus {
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartitionNodes {
    #[serde(default)]
    pub total: Option<u64>,
}

/// The scheduler statistics record as returned by `GET /slurm/v0.0.43/diag`
/// (the `statistics` object). A flat bag of counters; unset fields read as
/// zero at exposition time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerStats {
    // Main scheduler cycle
    #[serde(default)]
    pub schedule_cycle_last: Option<u64>,
    #[serde(default)]
    pub schedule_cycle_max: Option<u64>,
    #[serde(default)]
    pub schedule_cycle_mean: Option<u64>,
    #[serde(default)]
    pub schedule_cycle_mean_depth: Option<u64>,
    #[serde(default)]
    pub schedule_cycle_per_minute: Option<u64>,
    #[serde(default)]
    pub schedule_cycle_total: Option<u64>,
    #[serde(default)]
    pub schedule_queue_length: Option<u64>,
    // Backfill scheduler
    #[serde(default)]
    pub bf_active: Option<bool>,
    #[serde(default)]
    pub bf_backfilled_jobs: Option<u64>,
    #[serde(default)]
    pub bf_last_backfilled_jobs: Option<u64>,
    #[serde(default)]
    pub bf_backfilled_het_jobs: Option<u64>,
    #[serde(default)]
    pub bf_cycle_counter: Option<u64>,
    #[serde(default)]
    pub bf_cycle_last: Option<u64>,
    #[serde(default)]
    pub bf_cycle_max: Option<u64>,
    #[serde(default)]
    pub bf_cycle_mean: Option<u64>,
    #[serde(default)]
    pub bf_depth_mean: Option<u64>,
    #[serde(default)]
    pub bf_depth_mean_try: Option<u64>,
    #[serde(default)]
    pub bf_last_depth: Option<u64>,
    #[serde(default)]
    pub bf_last_depth_try: Option<u64>,
    #[serde(default)]
    pub bf_queue_len: Option<u64>,
    #[serde(default)]
    pub bf_queue_len_mean: Option<u64>,
    #[serde(default)]
    pub bf_table_size: Option<u64>,
    // Job turnover since the last stats reset
    #[serde(default)]
    pub jobs_submitted: Option<u64>,
    #[serde(default)]
    pub jobs_started: Option<u64>,
    #[serde(default)]
    pub jobs_completed: Option<u64>,
    #[serde(default)]
    pub jobs_canceled: Option<u64>,
    #[serde(default)]
    pub jobs_failed: Option<u64>,
    #[serde(default)]
    pub jobs_pending: Option<u64>,
    #[serde(default)]
    pub jobs_running: Option<u64>,
    // Daemon internals
    #[serde(default)]
    pub server_thread_count: Option<u64>,
    #[serde(default)]
    pub agent_count: Option<u64>,
    #[serde(default)]
    pub agent_queue_size: Option<u64>,
    #[serde(default)]
    pub agent_thread_count: Option<u64>,
    #[serde(default)]
    pub dbd_agent_queue_size: Option<u64>,
}
