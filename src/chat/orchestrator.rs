// src/chat/orchestrator.rs
//! Per-request pipeline:
//! classify -> (fetch) -> prompt -> generate -> drain into frames.
//!
//! Everything up to the provider call runs before the response starts, so the
//! activity log is complete by the time headers are written. The provider
//! stream is only driven while the client keeps reading the body: dropping the
//! body drops the frame stream, which drops the provider connection.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use metrics::counter;
use sha2::{Digest, Sha256};
use std::pin::Pin;
use tracing::{debug, info, warn};

use super::classify::{classify, parse_analysis_request, Classification, QueryError};
use super::{latest_user_index, ChatMessage};
use crate::frames::{StreamFrame, Usage};
use crate::generation::{DynGenerator, GenerationEvent};
use crate::sela::activity::{header_json, ActivityLog, EntryKind, Platform, ACTIVITY_HEADER_BUDGET};
use crate::sela::PostFetcher;
use crate::summary::build_prompt;

pub const LIMIT_MESSAGE: &str =
    "I can summarize at most 30 recent posts per request. Please ask for 30 or fewer.";
pub const FETCH_FAULT_MESSAGE: &str =
    "Something went wrong while retrieving posts. Please try again later.";
pub const GENERATION_FAULT_MESSAGE: &str =
    "Something went wrong while generating the response. Please try again.";

pub type FrameStream = Pin<Box<dyn Stream<Item = StreamFrame> + Send>>;

/// What the handler needs to answer: the header value and the frames.
pub struct ChatResponse {
    /// JSON array, already cut to the header budget.
    pub activity_log: String,
    pub frames: FrameStream,
}

enum Plan {
    /// Fixed text, no provider call.
    Reply(&'static str),
    /// Unexpected fault before generation.
    Fail(&'static str),
    Generate(Vec<ChatMessage>),
}

#[derive(Clone)]
pub struct ChatOrchestrator {
    fetcher: Arc<dyn PostFetcher>,
    generator: DynGenerator,
    system_prompt: Arc<str>,
}

/// Short, non-reversible id for log lines; raw messages are never logged.
pub(crate) fn anon_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

impl ChatOrchestrator {
    pub fn new(
        fetcher: Arc<dyn PostFetcher>,
        generator: DynGenerator,
        system_prompt: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            fetcher,
            generator,
            system_prompt: system_prompt.into(),
        }
    }

    pub async fn respond(&self, messages: Vec<ChatMessage>) -> ChatResponse {
        let log = ActivityLog::new();
        let plan = self.plan(messages, &log).await;
        let activity_log = header_json(&log.take(), ACTIVITY_HEADER_BUDGET);

        let frames: FrameStream = match plan {
            Plan::Reply(text) => Box::pin(stream::iter([
                StreamFrame::TextDelta(text.to_string()),
                StreamFrame::finish("stop", Some(Usage::default())),
            ])),
            Plan::Fail(text) => Box::pin(stream::iter([StreamFrame::Error(text.to_string())])),
            Plan::Generate(msgs) => self.generate(msgs),
        };

        ChatResponse {
            activity_log,
            frames,
        }
    }

    async fn plan(&self, mut messages: Vec<ChatMessage>, log: &ActivityLog) -> Plan {
        let Some(idx) = latest_user_index(&messages) else {
            debug!("no user message, passing conversation through");
            counter!("chat_requests_total", "route" => Classification::OpenChat.as_str()).increment(1);
            return Plan::Generate(messages);
        };

        let latest = messages[idx].content.clone();
        let class = classify(&latest);
        info!(
            msg_id = %anon_id(&latest),
            chars = latest.chars().count(),
            class = class.as_str(),
            "classified"
        );

        if class != Classification::AnalysisQuery {
            counter!("chat_requests_total", "route" => class.as_str()).increment(1);
            return Plan::Generate(messages);
        }

        let req = match parse_analysis_request(&latest) {
            Ok(r) => r,
            Err(e @ (QueryError::MissingUsername | QueryError::InvalidUsername)) => {
                debug!(reason = %e, "no lookup target, treating as open chat");
                counter!("chat_requests_total", "route" => Classification::OpenChat.as_str())
                    .increment(1);
                return Plan::Generate(messages);
            }
            Err(e @ QueryError::CountOverLimit { .. }) => {
                info!(reason = %e, "post count over limit, not fetching");
                counter!("chat_requests_total", "route" => "limit").increment(1);
                return Plan::Reply(LIMIT_MESSAGE);
            }
        };
        counter!("chat_requests_total", "route" => class.as_str()).increment(1);

        debug!(username = %req.username, count = req.count, fetcher = self.fetcher.name(), "fetching");
        let result = match self
            .fetcher
            .fetch_user_posts(&req.username, req.count, log)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = ?e, fetcher = self.fetcher.name(), "fetcher fault");
                counter!("chat_stream_failures_total", "stage" => "fetch").increment(1);
                log.record(
                    EntryKind::Error,
                    Platform::System,
                    format!("Unexpected failure while fetching posts for @{}", req.username),
                    None,
                );
                return Plan::Fail(FETCH_FAULT_MESSAGE);
            }
        };

        let prompt = build_prompt(&req.username, &result, req.count);
        debug!(prompt_bytes = prompt.len(), "prompt built");

        // the built prompt stands in for the user's lookup message; turns
        // around it are passed through untouched
        messages[idx] = ChatMessage::user(prompt);
        Plan::Generate(messages)
    }

    fn generate(&self, messages: Vec<ChatMessage>) -> FrameStream {
        let generator = self.generator.clone();
        let system = self.system_prompt.clone();

        Box::pin(async_stream::stream! {
            let mut events = match generator.stream_chat(&system, &messages).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = ?e, provider = generator.provider_name(), "generation failed to start");
                    counter!("chat_stream_failures_total", "stage" => "generate").increment(1);
                    yield StreamFrame::Error(GENERATION_FAULT_MESSAGE.to_string());
                    return;
                }
            };

            let mut deltas = 0usize;
            while let Some(event) = events.next().await {
                match event {
                    Ok(GenerationEvent::Delta(text)) => {
                        if text.is_empty() {
                            continue;
                        }
                        deltas += 1;
                        yield StreamFrame::TextDelta(text);
                    }
                    Ok(GenerationEvent::Done { reason, usage }) => {
                        info!(deltas, %reason, completion_tokens = usage.completion_tokens, "generation finished");
                        yield StreamFrame::finish(reason, Some(usage));
                        return;
                    }
                    Err(e) => {
                        warn!(error = ?e, deltas, provider = generator.provider_name(), "generation failed mid-stream");
                        counter!("chat_stream_failures_total", "stage" => "generate").increment(1);
                        yield StreamFrame::Error(GENERATION_FAULT_MESSAGE.to_string());
                        return;
                    }
                }
            }

            // provider closed without a completion signal
            info!(deltas, "generation ended without finish reason");
            yield StreamFrame::finish("stop", Some(Usage::default()));
        })
    }
}
