// src/generation.rs
//! Text-generation provider boundary: a trait object producing a lazy,
//! single-consumer stream of text increments, plus the OpenAI implementation
//! and a deterministic mock.
//!
//! Dropping the returned stream closes the underlying HTTP connection, which
//! is how an early client disconnect releases the provider call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use futures::stream::{self, Stream, StreamExt};
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, Role};
use crate::config::OpenAiConfig;
use crate::frames::Usage;

/// One item of the provider stream.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Delta(String),
    /// Completion signal. `reason` is already in the client's vocabulary.
    Done { reason: String, usage: Usage },
}

pub type TextStream = Pin<Box<dyn Stream<Item = anyhow::Result<GenerationEvent>> + Send>>;

/// Trait object used by the orchestrator (and swapped for fakes in tests).
pub trait TextGenerator: Send + Sync {
    fn stream_chat<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TextStream>> + Send + 'a>>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// `AI_TEST_MODE=mock` gives the mock; otherwise OpenAI.
pub fn build_generator(cfg: &OpenAiConfig) -> anyhow::Result<DynGenerator> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockGenerator::new(vec![
            "This is ".to_string(),
            "a mock reply.".to_string(),
        ])));
    }
    Ok(Arc::new(OpenAiStreamer::new(cfg)?))
}

/// Map OpenAI `finish_reason` onto the client's finish reasons.
pub fn map_finish_reason(raw: &str) -> &'static str {
    match raw {
        "stop" => "stop",
        "length" => "length",
        "content_filter" => "content-filter",
        "tool_calls" | "function_call" => "tool-calls",
        _ => "other",
    }
}

// ------------------------------------------------------------
// OpenAI (Chat Completions, SSE)
// ------------------------------------------------------------

pub struct OpenAiStreamer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiStreamer {
    pub fn new(cfg: &OpenAiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("recap-agent/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct WireMsg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMsg<'a>>,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Fold one SSE `data:` payload into the running state; returns a delta to
/// forward, if any. Finish reason and usage arrive in separate chunks.
fn apply_chunk(
    data: &str,
    finish: &mut Option<String>,
    usage: &mut Usage,
) -> anyhow::Result<Option<String>> {
    let chunk: Chunk = serde_json::from_str(data).context("decoding completion chunk")?;
    if let Some(u) = chunk.usage {
        usage.prompt_tokens = u.prompt_tokens;
        usage.completion_tokens = u.completion_tokens;
    }
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };
    if let Some(r) = choice.finish_reason {
        *finish = Some(r);
    }
    Ok(choice.delta.content.filter(|c| !c.is_empty()))
}

fn completion_stream(mut source: EventSource) -> TextStream {
    let s = async_stream::stream! {
        let mut finish: Option<String> = None;
        let mut usage = Usage::default();

        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        break;
                    }
                    match apply_chunk(&msg.data, &mut finish, &mut usage) {
                        Ok(Some(delta)) => yield Ok(GenerationEvent::Delta(delta)),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            source.close();
                            return;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, resp)) => {
                    let body = resp.text().await.unwrap_or_default();
                    tracing::warn!(%status, body = %body.chars().take(200).collect::<String>(), "openai rejected request");
                    yield Err(anyhow!("openai returned status {status}"));
                    source.close();
                    return;
                }
                Err(e) => {
                    yield Err(anyhow!("openai stream error: {e}"));
                    source.close();
                    return;
                }
            }
        }
        source.close();

        let reason = map_finish_reason(finish.as_deref().unwrap_or("stop")).to_string();
        yield Ok(GenerationEvent::Done { reason, usage });
    };
    Box::pin(s)
}

impl TextGenerator for OpenAiStreamer {
    fn stream_chat<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TextStream>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                anyhow::bail!("OPENAI_API_KEY is not set");
            }

            let mut wire = Vec::with_capacity(messages.len() + 1);
            wire.push(WireMsg {
                role: "system",
                content: system,
            });
            wire.extend(messages.iter().map(|m| WireMsg {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                },
                content: &m.content,
            }));

            let req = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&CompletionRequest {
                    model: &self.model,
                    messages: wire,
                    stream: true,
                    stream_options: StreamOptions {
                        include_usage: true,
                    },
                });

            let source = EventSource::new(req).context("creating openai event source")?;
            Ok(completion_stream(source))
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Mock
// ------------------------------------------------------------

/// Replays fixed increments, then `stop`.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    pub chunks: Vec<String>,
}

impl MockGenerator {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }
}

impl TextGenerator for MockGenerator {
    fn stream_chat<'a>(
        &'a self,
        _system: &'a str,
        _messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TextStream>> + Send + 'a>> {
        let mut items: Vec<anyhow::Result<GenerationEvent>> = self
            .chunks
            .iter()
            .cloned()
            .map(|c| Ok(GenerationEvent::Delta(c)))
            .collect();
        items.push(Ok(GenerationEvent::Done {
            reason: "stop".to_string(),
            usage: Usage::default(),
        }));
        Box::pin(async move { Ok(Box::pin(stream::iter(items)) as TextStream) })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
