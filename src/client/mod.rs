// Slurm client module - the read-only boundary to the cluster control plane
//
// This module defines the typed reader interface the collectors consume:
// 1. The `SlurmClient` trait, one list operation per entity kind
// 2. The wire types returned by slurmrestd (see `types`)
// 3. A REST implementation over slurmrestd (see `rest`)
//
// Collectors for different entity kinds may run concurrently within one
// scrape, so every implementation must be usable from multiple tasks.

use async_trait::async_trait;
use thiserror::Error;

pub mod rest;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use rest::RestClient;
use types::{Job, Node, Partition, SchedulerStats};

/// Errors that can occur while reading from the Slurm control plane.
///
/// These are transport-level failures. Missing or partial fields inside a
/// successfully returned record are not errors; the collectors treat absent
/// values as zero.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("slurmrestd request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("slurmrestd returned status {status} for {endpoint}")]
    Api {
        endpoint: &'static str,
        status: u16,
    },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Typed read access to the current state of a Slurm cluster.
///
/// Each method returns the complete list of that entity kind as reported by
/// the control plane at the time of the call. The exporter never mutates
/// scheduler state and never caches results across calls; every scrape reads
/// fresh. Retries, if any, belong behind this trait, not in the collectors.
#[async_trait]
pub trait SlurmClient: Send + Sync {
    /// Lists all jobs currently known to the scheduler.
    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError>;

    /// Lists all compute nodes.
    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError>;

    /// Lists all partitions.
    async fn list_partitions(&self) -> Result<Vec<Partition>, ClientError>;

    /// Fetches the scheduler statistics record (sdiag).
    async fn diag(&self) -> Result<SchedulerStats, ClientError>;
}
