// In-memory Slurm client for tests
//
// Serves canned entity lists and can be switched into a failure mode where
// every read errors, so collector tests can exercise both the aggregation
// path and the no-partial-snapshot rule.

use async_trait::async_trait;

use super::types::{Job, Node, Partition, SchedulerStats};
use super::{ClientError, SlurmClient};

#[derive(Default)]
pub struct FakeClient {
    jobs: Vec<Job>,
    nodes: Vec<Node>,
    partitions: Vec<Partition>,
    stats: SchedulerStats,
    fail: bool,
    fail_jobs: bool,
}

impl FakeClient {
    pub fn new() -> Self {
        FakeClient::default()
    }

    pub fn with_jobs(mut self, jobs: Vec<Job>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_partitions(mut self, partitions: Vec<Partition>) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_stats(mut self, stats: SchedulerStats) -> Self {
        self.stats = stats;
        self
    }

    /// Makes every read return an error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Makes only the job list read return an error.
    pub fn failing_jobs(mut self) -> Self {
        self.fail_jobs = true;
        self
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.fail {
            Err(ClientError::Api {
                endpoint: "/fake",
                status: 500,
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SlurmClient for FakeClient {
    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        self.check()?;
        if self.fail_jobs {
            return Err(ClientError::Api {
                endpoint: "/fake/jobs",
                status: 500,
            });
        }
        Ok(self.jobs.clone())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError> {
        self.check()?;
        Ok(self.nodes.clone())
    }

    async fn list_partitions(&self) -> Result<Vec<Partition>, ClientError> {
        self.check()?;
        Ok(self.partitions.clone())
    }

    async fn diag(&self) -> Result<SchedulerStats, ClientError> {
        self.check()?;
        Ok(self.stats.clone())
    }
}
