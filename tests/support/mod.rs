// tests/support/mod.rs
//
// Fakes for the two external collaborators: a fetcher that records every call
// and a generator that replays a fixed script.

#![allow(dead_code)]

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tower::ServiceExt as _; // for `oneshot`

use recap_agent::api::{self, AppState};
use recap_agent::chat::{ChatMessage, ChatOrchestrator};
use recap_agent::frames::{self, StreamFrame, Usage};
use recap_agent::generation::{GenerationEvent, TextGenerator, TextStream};
use recap_agent::sela::{ActivityLog, EntryKind, FetchResult, Platform, PostFetcher};

pub const SYSTEM: &str = "You are a test agent.";

#[derive(Clone)]
pub enum Outcome {
    Rows(Vec<Value>),
    Failed(String),
    Fault,
}

pub struct RecordingFetcher {
    pub calls: Mutex<Vec<(String, u32)>>,
    outcome: Outcome,
}

impl RecordingFetcher {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            outcome,
        })
    }

    pub fn rows(n: usize) -> Arc<Self> {
        let rows = (0..n)
            .map(|i| serde_json::json!({ "content": format!("post number {i}"), "likesCount": i }))
            .collect();
        Self::new(Outcome::Rows(rows))
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostFetcher for RecordingFetcher {
    async fn fetch_user_posts(
        &self,
        username: &str,
        count: u32,
        log: &ActivityLog,
    ) -> anyhow::Result<FetchResult> {
        self.calls
            .lock()
            .unwrap()
            .push((username.to_string(), count));
        log.record(
            EntryKind::Browse,
            Platform::Twitter,
            format!("Fetching posts for @{username}"),
            None,
        );
        match &self.outcome {
            Outcome::Rows(rows) => {
                let rows: Vec<_> = rows
                    .iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect();
                Ok(FetchResult::from_rows(&rows, count))
            }
            Outcome::Failed(msg) => {
                log.record(EntryKind::Error, Platform::Twitter, msg.clone(), None);
                Ok(FetchResult::Failed { error: msg.clone() })
            }
            Outcome::Fault => Err(anyhow::anyhow!("socket exploded")),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// One scripted provider item: a delta, the finish signal, or a mid-stream error.
#[derive(Clone)]
pub enum Step {
    Delta(&'static str),
    Done(&'static str),
    Fail,
}

pub struct ScriptedGenerator {
    script: Vec<Step>,
    fail_to_start: bool,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    pub seen_system: Mutex<Vec<String>>,
    /// Set when the provider stream is dropped.
    pub released: Arc<AtomicBool>,
    /// Keep the stream open after the script instead of ending it.
    hang_after_script: bool,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            fail_to_start: false,
            seen: Mutex::new(Vec::new()),
            seen_system: Mutex::new(Vec::new()),
            released: Arc::new(AtomicBool::new(false)),
            hang_after_script: false,
        })
    }

    pub fn hello() -> Arc<Self> {
        Self::new(vec![
            Step::Delta("Hello"),
            Step::Delta(", \"world\"\n"),
            Step::Done("stop"),
        ])
    }

    pub fn failing_to_start() -> Arc<Self> {
        Arc::new(Self {
            script: Vec::new(),
            fail_to_start: true,
            seen: Mutex::new(Vec::new()),
            seen_system: Mutex::new(Vec::new()),
            released: Arc::new(AtomicBool::new(false)),
            hang_after_script: false,
        })
    }

    pub fn hanging(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            fail_to_start: false,
            seen: Mutex::new(Vec::new()),
            seen_system: Mutex::new(Vec::new()),
            released: Arc::new(AtomicBool::new(false)),
            hang_after_script: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn was_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl TextGenerator for ScriptedGenerator {
    fn stream_chat<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn std::future::Future<Output = anyhow::Result<TextStream>> + Send + 'a>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.seen_system.lock().unwrap().push(system.to_string());
            if self.fail_to_start {
                anyhow::bail!("provider unavailable");
            }

            let items: Vec<anyhow::Result<GenerationEvent>> = self
                .script
                .iter()
                .map(|s| match s {
                    Step::Delta(t) => Ok(GenerationEvent::Delta(t.to_string())),
                    Step::Done(r) => Ok(GenerationEvent::Done {
                        reason: r.to_string(),
                        usage: Usage {
                            prompt_tokens: 11,
                            completion_tokens: 5,
                        },
                    }),
                    Step::Fail => Err(anyhow::anyhow!("connection reset")),
                })
                .collect();

            let guard = DropFlag(self.released.clone());
            let head = stream::iter(items);
            let s: TextStream = if self.hang_after_script {
                Box::pin(head.chain(stream::pending()).map(move |e| {
                    let _ = &guard;
                    e
                }))
            } else {
                Box::pin(head.map(move |e| {
                    let _ = &guard;
                    e
                }))
            };
            Ok(s)
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn orchestrator(fetcher: Arc<RecordingFetcher>, generator: Arc<ScriptedGenerator>) -> ChatOrchestrator {
    ChatOrchestrator::new(fetcher, generator, SYSTEM)
}

pub fn router(fetcher: Arc<RecordingFetcher>, generator: Arc<ScriptedGenerator>) -> Router {
    api::create_router(AppState::new(orchestrator(fetcher, generator)))
}

pub fn user_only(text: &str) -> Value {
    serde_json::json!({ "messages": [{ "role": "user", "content": text }] })
}

pub struct ChatReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ChatReply {
    pub fn frames(&self) -> Vec<StreamFrame> {
        frames::decode_body(&self.body).expect("decode protocol lines")
    }

    pub fn activity_log(&self) -> Vec<Value> {
        let raw = self
            .headers
            .get("x-activity-log")
            .expect("x-activity-log header")
            .to_str()
            .expect("ascii header");
        serde_json::from_str(raw).expect("activity log is a JSON array")
    }
}

pub async fn post_chat(app: Router, payload: &Value) -> ChatReply {
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /api/chat");

    let resp = app.oneshot(req).await.expect("oneshot /api/chat");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    ChatReply {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).expect("utf8"),
    }
}
