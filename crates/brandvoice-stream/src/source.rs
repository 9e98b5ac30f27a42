use std::pin::Pin;

use futures::{Stream, TryStreamExt as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GenerationClientConfig;
use crate::errors::AggregateError;

/// Response body of a generation request, ready to hand to an aggregator.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<bytes::Bytes, AggregateError>> + Send + 'static>>;

/// Body posted to the generation endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            brand_voice_id: None,
            content_type: None,
        }
    }

    pub fn brand_voice(mut self, id: impl Into<String>) -> Self {
        self.brand_voice_id = Some(id.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The same request with the brand voice removed.
    pub fn without_voice(&self) -> Self {
        Self {
            brand_voice_id: None,
            ..self.clone()
        }
    }
}

/// Client for a streaming generation endpoint.
pub struct GenerationClient {
    client: reqwest::Client,
    config: GenerationClientConfig,
}

impl GenerationClient {
    pub fn new(config: GenerationClientConfig) -> Result<Self, AggregateError> {
        if config.endpoint.trim().is_empty() {
            return Err(AggregateError::Config(
                "generation endpoint must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| AggregateError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a client using `BRANDVOICE_GENERATE_URL`.
    pub fn from_env() -> Result<Self, AggregateError> {
        Self::new(GenerationClientConfig::from_env()?)
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Posts `request` and returns the response body as a chunk stream.
    pub async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, AggregateError> {
        debug!(
            endpoint = %self.config.endpoint,
            brand_voice = request.brand_voice_id.as_deref().unwrap_or("-"),
            "opening generation stream"
        );
        let response = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(endpoint = %self.config.endpoint, status = status.as_u16(), "generation request rejected");
            return Err(AggregateError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(Box::pin(response.bytes_stream().map_err(AggregateError::from)))
    }
}
