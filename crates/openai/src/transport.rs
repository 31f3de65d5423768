// OpenAI Transport
//
// Streams chat completions from any OpenAI-compatible endpoint and hands the
// raw body to the core probe, which does its own line decoding and timing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use firstbyte_core::config::{ProbeConfig, DEFAULT_API_URL};
use firstbyte_core::{ByteStream, ChatTransport, ProbeRequest, TransportError};

use crate::types::ChatRequest;

/// ChatTransport over reqwest for OpenAI-compatible chat completions
///
/// # Example
///
/// ```ignore
/// use firstbyte_openai::OpenAiTransport;
///
/// let transport = OpenAiTransport::new()?;
/// // or with custom endpoint
/// let transport = OpenAiTransport::with_base_url("http://localhost:8080/v1/chat/completions")?;
/// ```
#[derive(Clone)]
pub struct OpenAiTransport {
    client: Client,
    api_url: String,
}

impl OpenAiTransport {
    /// Create a transport for the default endpoint
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_API_URL)
    }

    /// Create a transport for a custom chat-completions URL
    pub fn with_base_url(api_url: impl Into<String>) -> Result<Self> {
        Self::from_config(&ProbeConfig::default().with_api_url(api_url))
    }

    /// Create a transport from a probe configuration (URL + connect timeout)
    pub fn from_config(config: &ProbeConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    /// Get the API URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn open_stream(&self, request: &ProbeRequest) -> Result<ByteStream, TransportError> {
        let body = ChatRequest::streaming(request);
        tracing::debug!(url = %self.api_url, model = %body.model, "Sending streaming request");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", request.api_key()))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "Response headers received");

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::status(status.as_u16(), error_text));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(stream_error));
        Ok(Box::pin(stream))
    }
}

impl std::fmt::Debug for OpenAiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTransport")
            .field("api_url", &self.api_url)
            .finish()
    }
}

fn send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::connect(err.to_string())
    }
}

fn stream_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::stream(err.to_string())
    }
}
