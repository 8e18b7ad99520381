// src/chat/mod.rs
//! Conversation types plus the request pipeline: classify the latest user
//! message, optionally fetch posts, then stream the provider's reply.

pub mod classify;
pub mod orchestrator;

use serde::{Deserialize, Serialize};

pub use classify::{classify, parse_analysis_request, AnalysisRequest, Classification};
pub use orchestrator::{ChatOrchestrator, ChatResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of the conversation. `content` is always flattened to plain text
/// on the way in, whatever shape the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, deserialize_with = "deserialize_content")]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`. Turns with roles other than user, assistant and
/// system (tool results and the like) are dropped on the way in.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(deserialize_with = "deserialize_messages")]
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct RawMessage {
    role: String,
    #[serde(default, deserialize_with = "deserialize_content")]
    content: String,
}

fn deserialize_messages<'de, D>(de: D) -> Result<Vec<ChatMessage>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<RawMessage>::deserialize(de)?;
    Ok(raw
        .into_iter()
        .filter_map(|m| {
            let role = match m.role.as_str() {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                "system" => Role::System,
                _ => return None,
            };
            Some(ChatMessage {
                role,
                content: m.content,
            })
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

fn deserialize_content<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<RawContent>::deserialize(de)?;
    Ok(match raw {
        Some(RawContent::Text(s)) => s,
        Some(RawContent::Parts(parts)) => parts
            .into_iter()
            .filter(|p| p.kind == "text")
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    })
}

/// Index of the most recent user message, if any.
pub fn latest_user_index(messages: &[ChatMessage]) -> Option<usize> {
    messages.iter().rposition(|m| m.role == Role::User)
}
