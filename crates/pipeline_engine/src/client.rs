use std::time::Duration;

use pipeline_core::{DedupeOutcome, JobHandle, JobStatus, PipelineStats, StartParams};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{ClientError, FailureKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Whole-request timeout. `None` lets a hung poll delay the next one.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}

/// Job-control operations of the worker, one stage at a time.
#[async_trait::async_trait]
pub trait JobClient: Send + Sync {
    /// Starts a job and returns its id.
    async fn start(&self, params: &StartParams) -> Result<String, ClientError>;

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, ClientError>;

    /// Asks the worker to stop the job; returns the worker's status word.
    async fn stop(&self, handle: &JobHandle) -> Result<String, ClientError>;

    async fn stats(&self) -> Result<PipelineStats, ClientError>;

    async fn dedupe_attachments(&self) -> Result<DedupeOutcome, ClientError>;
}

#[derive(Deserialize)]
struct StartResponse {
    job_id: String,
}

#[derive(Serialize)]
struct StopRequest<'a> {
    job_id: &'a str,
}

#[derive(Deserialize)]
struct StopResponse {
    status: String,
}

#[derive(Debug, Clone)]
pub struct ReqwestJobClient {
    client: reqwest::Client,
    base: Url,
}

impl ReqwestJobClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let mut base = Url::parse(&settings.base_url)
            .map_err(|err| ClientError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        // Relative joins replace the last segment unless the path ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder().connect_timeout(settings.connect_timeout);
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|err| ClientError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    fn stage_endpoint(&self, segment: &str, action: &str) -> Result<Url, ClientError> {
        self.endpoint(&format!("pipeline/{segment}/{action}"))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T, ClientError> {
        let mut request = self.client.post(url).header(ACCEPT, "application/json");
        if let Some(body) = body {
            let bytes = serde_json::to_vec(&body)
                .map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))?;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl JobClient for ReqwestJobClient {
    async fn start(&self, params: &StartParams) -> Result<String, ClientError> {
        let url = self.stage_endpoint(params.stage().route_segment(), "start")?;
        let response: StartResponse = self.post_json(url, Some(params.to_json())).await?;
        Ok(response.job_id)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, ClientError> {
        let mut url = self.stage_endpoint(handle.stage.route_segment(), "status")?;
        url.query_pairs_mut().append_pair("job_id", &handle.job_id);
        self.get_json(url).await
    }

    async fn stop(&self, handle: &JobHandle) -> Result<String, ClientError> {
        let mut url = self.stage_endpoint(handle.stage.route_segment(), "stop")?;
        // The worker reads the id from the query string; the body mirrors it.
        url.query_pairs_mut().append_pair("job_id", &handle.job_id);
        let body = serde_json::to_value(StopRequest {
            job_id: &handle.job_id,
        })
        .map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))?;
        let response: StopResponse = self.post_json(url, Some(body)).await?;
        Ok(response.status)
    }

    async fn stats(&self) -> Result<PipelineStats, ClientError> {
        let url = self.endpoint("pipeline/stats")?;
        self.get_json(url).await
    }

    async fn dedupe_attachments(&self) -> Result<DedupeOutcome, ClientError> {
        let url = self.endpoint("pipeline/dedupe_attachments")?;
        self.post_json(url, None).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.to_string()
        } else {
            body.trim().to_string()
        };
        return Err(ClientError::new(
            FailureKind::HttpStatus(status.as_u16()),
            message,
        ));
    }

    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::new(FailureKind::Timeout, err.to_string());
    }
    ClientError::new(FailureKind::Network, err.to_string())
}
