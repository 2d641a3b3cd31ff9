//! # OpenAI-Compatible Generator
//!
//! Chat completions against any endpoint speaking the `OpenAI` wire format
//! (`DeepSeek` by default). Streaming responses are read with the same frame
//! splitter the MockMate client uses, fragments come from
//! `choices[0].delta.content`, and `[DONE]` ends the output.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mockmate_protocol::{FrameBuffer, RawFrame};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::generation::{
    ChatMessage, FragmentStream, GenerationError, GenerationRequest, GenerationResult,
    TextGenerator,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiCompatConfig {
    /// API base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Model name.
    pub model: String,
}

/// Generator backed by an OpenAI-compatible chat completion API.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatGenerator {
    /// Build a generator with its own HTTP client.
    pub fn new(config: OpenAiCompatConfig) -> GenerationResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send(&self, request: &GenerationRequest, stream: bool) -> GenerationResult<reqwest::Response> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: request.messages(),
            temperature: request.temperature,
            stream,
        };
        debug!(purpose = ?request.purpose, stream, model = %self.config.model, "chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "chat completion rejected");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

/// Content fragment carried by one upstream chunk, if any.
fn chunk_content(data: &str) -> Option<String> {
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty()),
        Err(e) => {
            warn!(error = %e, "failed to parse upstream chunk");
            None
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn stream(&self, request: &GenerationRequest) -> GenerationResult<FragmentStream> {
        let response = self.send(request, true).await?;
        let mut bytes = response.bytes_stream();

        let fragments = async_stream::stream! {
            let mut buffer = FrameBuffer::new();
            loop {
                while let Some(frame) = buffer.next_frame() {
                    match frame {
                        RawFrame::Data(data) => {
                            if let Some(content) = chunk_content(&data) {
                                yield Ok(content);
                            }
                        }
                        RawFrame::Terminator => return,
                        RawFrame::Empty => {}
                        RawFrame::Invalid(message) => warn!(%message, "skipping upstream frame"),
                    }
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        if let Err(e) = buffer.push(&chunk) {
                            yield Err(GenerationError::Malformed { message: e.to_string() });
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(GenerationError::Http(e));
                        return;
                    }
                    None => {
                        if let Some(RawFrame::Data(data)) = buffer.take_remainder() {
                            if let Some(content) = chunk_content(&data) {
                                yield Ok(content);
                            }
                        }
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(fragments))
    }

    async fn complete(&self, request: &GenerationRequest) -> GenerationResult<String> {
        let response = self.send(request, false).await?;
        let completion: ChatCompletion =
            response
                .json()
                .await
                .map_err(|e| GenerationError::Malformed {
                    message: e.to_string(),
                })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::Empty)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
