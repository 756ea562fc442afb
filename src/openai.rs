//! A [`RequestIssuer`] for OpenAI-compatible chat completion APIs.
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::request::{IssuerOutput, RequestIssuer, RequestParameters};

/// Issues requests against `{base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiIssuer {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl OpenAiIssuer {
    /// Creates an issuer. `timeout` bounds every request end to end.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint).with_context(|| format!("invalid base url: {base_url}"))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to construct HTTP client")?;
        Ok(Self { client, endpoint, api_key: api_key.into(), model: model.into() })
    }

    /// The chat completions endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, params: &RequestParameters) -> Result<reqwest::Response> {
        let body = ChatRequest::new(&self.model, params);
        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("API error ({status}): {text}");
        }
        Ok(resp)
    }

    async fn read_stream(mut resp: reqwest::Response) -> Result<IssuerOutput> {
        let mut output = IssuerOutput::default();
        // split on raw bytes so multi-byte characters may straddle chunks
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            buf.extend_from_slice(&chunk);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line)) {
                    SseLine::Done => return Ok(output),
                    SseLine::Chunk(chunk) => chunk.append_to(&mut output),
                    SseLine::Skip => {}
                }
            }
        }
        if let SseLine::Chunk(chunk) = parse_sse_line(&String::from_utf8_lossy(&buf)) {
            chunk.append_to(&mut output);
        }
        Ok(output)
    }
}

#[async_trait]
impl RequestIssuer for OpenAiIssuer {
    async fn issue(&self, params: &RequestParameters) -> Result<IssuerOutput> {
        let resp = self.send(params).await?;
        if params.stream {
            return Self::read_stream(resp).await;
        }

        let body: ChatResponse = resp.json().await.context("failed to decode response")?;
        let message = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .context("response contains no choices")?;
        Ok(IssuerOutput {
            content: message.content.unwrap_or_default(),
            reasoning: message.reasoning_content.unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, params: &'a RequestParameters) -> Self {
        Self {
            model,
            messages: [
                Message { role: "system", content: &params.system_prompt },
                Message { role: "user", content: &params.prompt },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: params.stream,
        }
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

impl StreamChunk {
    fn append_to(self, output: &mut IssuerOutput) {
        if let Some(choice) = self.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                output.content.push_str(&content);
            }
            if let Some(reasoning) = choice.delta.reasoning_content {
                output.reasoning.push_str(&reasoning);
            }
        }
    }
}

enum SseLine {
    Chunk(StreamChunk),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str(data) {
        Ok(chunk) => SseLine::Chunk(chunk),
        Err(e) => {
            tracing::debug!("skipping malformed stream chunk: {e}, data: {data}");
            SseLine::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let issuer = OpenAiIssuer::new("http://localhost:8000/v1/", "sk", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(issuer.endpoint().as_str(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(OpenAiIssuer::new("not a url", "sk", "m", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn request_body_shape() {
        let mut params = RequestParameters::new("hi");
        params.stream = true;
        let body = serde_json::to_value(ChatRequest::new("gpt", &params)).unwrap();
        assert_eq!(body["model"], "gpt");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn decodes_message_with_reasoning() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null,"reasoning_content":"hmm"}}]}"#,
        )
        .unwrap();
        let message = &body.choices[0].message;
        assert_eq!(message.content, None);
        assert_eq!(message.reasoning_content.as_deref(), Some("hmm"));
    }

    #[test]
    fn parses_sse_lines() {
        let mut output = IssuerOutput::default();
        let lines = [
            ": keep-alive",
            r#"data: {"choices":[{"delta":{"reasoning_content":"let me think"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            "data: {broken",
            r#"data:{"choices":[{"delta":{"content":"lo"}}]}"#,
            "",
        ];
        for line in lines {
            if let SseLine::Chunk(chunk) = parse_sse_line(line) {
                chunk.append_to(&mut output);
            }
        }
        assert_eq!(output.content, "Hello");
        assert_eq!(output.reasoning, "let me think");
        assert!(matches!(parse_sse_line("data: [DONE]\n"), SseLine::Done));
    }
}
