//! HTTP implementation of the backend boundary.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::recording::StreamRecorder;
use crate::stream::{StreamHandle, StreamRegistry};
use crate::streaming::HttpChunkStream;
use crate::types::{ApiError, RunPhase, ThreadMessage};
use crate::AgentBackend;

/// Talks to the agent backend over its JSON REST API and subscribes to the
/// per-run event stream.
pub struct HttpAgentBackend {
    client: reqwest::Client,
    base_url: String,
    registry: StreamRegistry,
    recorder: Option<Arc<StreamRecorder>>,
}

impl HttpAgentBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            registry: StreamRegistry::new(),
            recorder: None,
        }
    }

    /// Record every stream session to the recorder's file.
    pub fn with_recorder(base_url: impl Into<String>, recorder: StreamRecorder) -> Self {
        let mut backend = Self::new(base_url);
        backend.recorder = Some(Arc::new(recorder));
        backend
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[derive(Deserialize)]
struct StartRunResponse {
    run_id: String,
}

#[derive(Deserialize)]
struct RunStatusResponse {
    status: RunPhase,
}

#[derive(Deserialize)]
struct ThreadMessagesResponse {
    messages: Vec<ThreadMessage>,
}

#[async_trait]
impl AgentBackend for HttpAgentBackend {
    async fn start_run(&self, thread_id: &str, message: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("threads/{thread_id}/runs")))
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let response = check_status(response).await?;
        let body: StartRunResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        debug!("Backend started run {}", body.run_id);
        Ok(body.run_id)
    }

    async fn cancel_run(&self, run_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(&format!("runs/{run_id}/cancel")))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn run_status(&self, run_id: &str) -> Result<RunPhase, ApiError> {
        let body: RunStatusResponse = self.get_json(&format!("runs/{run_id}")).await?;
        Ok(body.status)
    }

    async fn thread_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ApiError> {
        let body: ThreadMessagesResponse = self
            .get_json(&format!("threads/{thread_id}/messages"))
            .await?;
        Ok(body.messages)
    }

    async fn open_stream(&self, run_id: &str) -> Result<StreamHandle, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("runs/{run_id}/events")))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let response = check_status(response).await?;
        let chunks = Box::new(HttpChunkStream::new(response));
        Ok(self.registry.spawn(run_id, chunks, self.recorder.clone()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}
