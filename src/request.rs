//! This module defines the request parameters and the request issuer boundary.
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::ConfigError;

/// Default system prompt sent with every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Generation parameters shared by every request of a test run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestParameters {
    /// The user prompt.
    pub prompt: String,
    /// The system prompt.
    pub system_prompt: String,
    /// Sampling temperature, usually within `0.0..=2.0`.
    pub temperature: f32,
    /// Maximum number of output tokens.
    pub max_tokens: u32,
    /// Whether the response should be consumed as a stream.
    pub stream: bool,
}

impl RequestParameters {
    /// Creates parameters for the given prompt with default generation settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            temperature: 0.7,
            max_tokens: 4096,
            stream: false,
        }
    }

    /// Checks the parameters before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prompt.trim().is_empty() {
            return Err(ConfigError::EmptyPrompt);
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        Ok(())
    }
}

/// What the target API returned for one successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerOutput {
    /// The response text.
    pub content: String,
    /// Reasoning text, empty if the model produced none.
    pub reasoning: String,
}

/// A capability that performs one call against the target API.
///
/// Implementations own the wire protocol, transport details and the per-request
/// timeout. Any failure (network, API status, timeout, decoding) is reported by
/// returning an error, which the caller records as a failed attempt.
#[async_trait]
pub trait RequestIssuer: Send + Sync {
    /// Issue one request and wait for the full response.
    ///
    /// When `params.stream` is set the implementation consumes the stream to
    /// completion before returning.
    async fn issue(&self, params: &RequestParameters) -> Result<IssuerOutput>;
}
