//! Client for a locally hosted Ollama-compatible `/api/generate` endpoint.
//!
//! The public `generate` never fails: transport and HTTP errors are logged and
//! turned into [`ERROR_RESPONSE`] so an interactive session keeps running.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

use feeder_core::config::LlmSettings;

pub mod error;
pub mod stream;

pub use error::{LlmError, Result};
pub use stream::Fragment;

pub const ERROR_RESPONSE: &str = "Error querying the LLM.";
pub const EMPTY_RESPONSE: &str = "No valid response received from the LLM.";

/// Anything that turns a prompt into generated text.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = String> + Send;
}

#[derive(Serialize)]
struct GenerateRequest<'a> { model: &'a str, prompt: &'a str }

#[derive(Debug, Clone)]
pub struct OllamaClient { client: reqwest::Client, endpoint: String, model: String }

impl OllamaClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_secs)).build()?;
        Ok(Self { client, endpoint: settings.endpoint.clone(), model: settings.model.clone() })
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self { self.model = model.into(); self }

    pub fn model(&self) -> &str { &self.model }

    pub fn endpoint(&self) -> &str { &self.endpoint }

    /// POST the prompt and accumulate the (possibly streamed) reply, untrimmed.
    pub async fn try_generate(&self, prompt: &str) -> Result<String> {
        debug!("POST {} (model={}, {} prompt chars)", self.endpoint, self.model, prompt.chars().count());
        let resp = self.client.post(&self.endpoint).json(&GenerateRequest { model: &self.model, prompt }).send().await?;
        let status = resp.status();
        if !status.is_success() { return Err(LlmError::Status { status }); }
        stream::accumulate(stream::fragments(Box::pin(resp.bytes_stream()))).await
    }
}

impl Generator for OllamaClient {
    async fn generate(&self, prompt: &str) -> String {
        match self.try_generate(prompt).await {
            Ok(text) if text.trim().is_empty() => EMPTY_RESPONSE.to_string(),
            Ok(text) => text.trim().to_string(),
            Err(e) => { error!("Error querying Ollama: {}", e); ERROR_RESPONSE.to_string() }
        }
    }
}

/// `context`, a blank line, then `prompt`; just `prompt` when there is no context.
pub fn combine_prompt(context: Option<&str>, prompt: &str) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!("{ctx}\n\n{prompt}"),
        _ => prompt.to_string(),
    }
}
