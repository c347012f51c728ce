// REST implementation of the Slurm client over slurmrestd
//
// Thin typed reads only: one GET per entity kind, JSON decoding into the
// wire types, and optional JWT auth. The request timeout doubles as the
// per-read cancellation budget - when it fires, the error propagates to the
// collector and the whole kind is skipped for that scrape.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::types::{Job, Node, Partition, SchedulerStats};
use super::{ClientError, SlurmClient};

const API_PREFIX: &str = "/slurm/v0.0.43";

/// `SlurmClient` backed by a slurmrestd HTTP endpoint.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestClient {
    /// Creates a new REST client.
    ///
    /// # Arguments
    /// * `base_url` - slurmrestd address, e.g. "http://localhost:6820"
    /// * `token` - optional JWT sent as `X-SLURM-USER-TOKEN`
    /// * `timeout` - per-request deadline
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RestClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &'static str) -> Result<T, ClientError> {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, endpoint);
        debug!(%url, "querying slurmrestd");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.header("X-SLURM-USER-TOKEN", token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ClientError::Decode { endpoint, source })
    }
}

// Response envelopes: slurmrestd wraps each list in a top-level field named
// after the entity kind.

#[derive(Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Deserialize)]
struct NodesResponse {
    #[serde(default)]
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct PartitionsResponse {
    #[serde(default)]
    partitions: Vec<Partition>,
}

#[derive(Deserialize)]
struct DiagResponse {
    #[serde(default)]
    statistics: SchedulerStats,
}

#[async_trait]
impl SlurmClient for RestClient {
    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        let response: JobsResponse = self.get("/jobs").await?;
        Ok(response.jobs)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError> {
        let response: NodesResponse = self.get("/nodes").await?;
        Ok(response.nodes)
    }

    async fn list_partitions(&self) -> Result<Vec<Partition>, ClientError> {
        let response: PartitionsResponse = self.get("/partitions").await?;
        Ok(response.partitions)
    }

    async fn diag(&self) -> Result<SchedulerStats, ClientError> {
        let response: DiagResponse = self.get("/diag").await?;
        Ok(response.statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decoding_tolerates_missing_lists() {
        let jobs: JobsResponse = serde_json::from_str(r#"{"meta": {}}"#).unwrap();
        assert!(jobs.jobs.is_empty());

        let diag: DiagResponse =
            serde_json::from_str(r#"{"statistics": {"schedule_cycle_last": 9}}"#).unwrap();
        assert_eq!(diag.statistics.schedule_cycle_last, Some(9));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client =
            RestClient::new("http://localhost:6820/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:6820");
    }
}
