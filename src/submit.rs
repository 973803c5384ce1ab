//! Submission of job requests to the workflow submission service.
//!
//! Every batch is sent in a single POST without retry. The service answers
//! with a status per job, which the [`Submitter`] partitions into submitted
//! jobs and failures.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::json;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::Error;
use crate::Result;
use crate::config::SubmissionConfig;
use crate::request::JobRequest;

/// The status of a job accepted for execution.
pub const SUBMITTED: &str = "Submitted";

/// The status of a job accepted but held back by the service.
pub const ON_HOLD: &str = "On Hold";

/// The status recorded for a job the service answered without a status.
pub const MISSING_STATUS: &str = "<missing status>";

/// Sends JSON documents to the submission service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Gets the endpoint documents are sent to.
    fn endpoint(&self) -> &str;

    /// Sends a JSON document and returns the JSON response.
    async fn post_json(&self, body: &JsonValue) -> Result<JsonValue>;
}

/// A [`Transport`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// The HTTP client.
    client: reqwest::Client,
    /// The submission endpoint.
    endpoint: Url,
}

impl HttpTransport {
    /// Creates a transport to an endpoint.
    ///
    /// Requests that take longer than `timeout` fail.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::SubmissionTransport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { client, endpoint })
    }

    /// Creates a transport to the configured endpoint.
    pub fn from_config(config: &SubmissionConfig) -> Result<Self> {
        Self::new(config.endpoint.clone(), config.timeout())
    }

    /// Creates a transport error for this endpoint.
    fn error(&self, reason: impl fmt::Display) -> Error {
        Error::SubmissionTransport {
            endpoint: self.endpoint.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn post_json(&self, body: &JsonValue) -> Result<JsonValue> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.error(e))?
            .error_for_status()
            .map_err(|e| self.error(e))?;

        response.json().await.map_err(|e| self.error(e))
    }
}

/// The outcome of one submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    /// The subject name(s) of the job.
    pub subj_name: String,
    /// The status reported by the service.
    pub status: String,
}

impl SubmissionResult {
    /// Determines if the job was accepted.
    pub fn is_success(&self) -> bool {
        self.status == SUBMITTED || self.status == ON_HOLD
    }
}

/// The outcome of a submission, in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionReport {
    /// The subject names of accepted jobs.
    pub submitted: Vec<String>,
    /// The jobs that were not accepted.
    pub failures: Vec<SubmissionResult>,
}

impl SubmissionReport {
    /// Partitions job outcomes into accepted jobs and failures.
    pub fn from_results(results: impl IntoIterator<Item = SubmissionResult>) -> Self {
        let (submitted, failures): (Vec<_>, Vec<_>) =
            results.into_iter().partition(SubmissionResult::is_success);

        Self {
            submitted: submitted.into_iter().map(|r| r.subj_name).collect(),
            failures,
        }
    }

    /// Formats the accepted jobs, e.g. `Submitted: LS-1, LS-2`.
    pub fn submitted_summary(&self) -> String {
        if self.submitted.is_empty() {
            return "Submitted: None".to_string();
        }

        format!("Submitted: {}", self.submitted.join(", "))
    }

    /// Formats the failures, e.g. `Failures: LS-3: Error`.
    pub fn failure_summary(&self) -> String {
        if self.failures.is_empty() {
            return "Failures: None".to_string();
        }

        format!(
            "Failures: {}",
            self.failures
                .iter()
                .map(|f| format!("{name}: {status}", name = f.subj_name, status = f.status))
                .join(", ")
        )
    }
}

impl fmt::Display for SubmissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{submitted}\n{failures}",
            submitted = self.submitted_summary(),
            failures = self.failure_summary()
        )
    }
}

/// The response to a batch submission.
#[derive(Debug, Deserialize)]
struct BatchResponse {
    /// The outcome of every job.
    jobs: Vec<JobOutcome>,
}

/// The response entry of one job.
#[derive(Debug, Deserialize)]
struct JobOutcome {
    /// The subject name(s) of the job.
    subj_name: String,
    /// The service's answer for the job.
    #[serde(default)]
    response: JobStatus,
}

/// The service's answer for one job.
#[derive(Debug, Default, Deserialize)]
struct JobStatus {
    /// The job status.
    #[serde(default)]
    status: Option<String>,
}

/// The response to a track hub submission.
#[derive(Debug, Deserialize)]
struct TrackHubResponse {
    /// The URL of the created track hub.
    url: String,
}

/// Submits job requests through a [`Transport`].
#[derive(Debug)]
pub struct Submitter<T> {
    /// The transport to submit through.
    transport: T,
}

impl<T: Transport> Submitter<T> {
    /// Creates a submitter.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Gets the transport of the submitter.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submits a batch of requests in a single call.
    ///
    /// An empty batch is not sent.
    pub async fn submit(&self, requests: &[JobRequest]) -> Result<SubmissionReport> {
        if requests.is_empty() {
            info!("no jobs to submit");
            return Ok(SubmissionReport::default());
        }

        info!(
            "submitting {count} job(s) to `{endpoint}`",
            count = requests.len(),
            endpoint = self.transport.endpoint()
        );
        let body = json!({ "jobs": requests });
        debug!("submission body: {body}");

        let response = self.transport.post_json(&body).await?;
        let response: BatchResponse =
            serde_json::from_value(response).map_err(|e| Error::SubmissionTransport {
                endpoint: self.transport.endpoint().to_string(),
                reason: format!("unexpected response: {e}"),
            })?;

        let report = SubmissionReport::from_results(response.jobs.into_iter().map(|job| {
            SubmissionResult {
                subj_name: job.subj_name,
                status: job
                    .response
                    .status
                    .unwrap_or_else(|| MISSING_STATUS.to_string()),
            }
        }));

        for failure in &report.failures {
            warn!(
                "job for `{name}` was not accepted: {status}",
                name = failure.subj_name,
                status = failure.status
            );
        }
        Ok(report)
    }

    /// Submits a track hub request as is and returns the URL of the hub.
    pub async fn submit_trackview(&self, request: &impl Serialize) -> Result<String> {
        let body = serde_json::to_value(request)?;
        info!(
            "submitting track hub request to `{endpoint}`",
            endpoint = self.transport.endpoint()
        );

        let response = self.transport.post_json(&body).await?;
        let response: TrackHubResponse =
            serde_json::from_value(response).map_err(|e| Error::SubmissionTransport {
                endpoint: self.transport.endpoint().to_string(),
                reason: format!("unexpected response: {e}"),
            })?;
        Ok(response.url)
    }
}
