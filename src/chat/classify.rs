// src/chat/classify.rs
//! Decides whether the latest user message is small talk, a "look up this
//! user" request, or free-form conversation, and extracts the handle + count.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

/// Messages at or above this many characters are never treated as lookups.
pub const ANALYSIS_MAX_CHARS: usize = 150;
pub const DEFAULT_POST_COUNT: u32 = 10;
pub const MAX_POST_COUNT: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Greeting,
    AnalysisQuery,
    OpenChat,
}

impl Classification {
    /// Label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Greeting => "greeting",
            Classification::AnalysisQuery => "analysis",
            Classification::OpenChat => "open_chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub username: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("no username in message")]
    MissingUsername,
    #[error("first token is not a valid handle")]
    InvalidUsername,
    /// Raw digits are kept because they may not fit any integer type.
    #[error("requested {requested} posts, limit is {}", MAX_POST_COUNT)]
    CountOverLimit { requested: String },
}

/// X handles: 1 to 15 ASCII letters, digits or underscores.
static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").expect("handle regex"));

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "sup",
    "yo",
    "howdy",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
];

const GREETING_FOLLOWUPS: &[&str] = &[
    "there", "bot", "agent", "buddy", "friend", "everyone", "all",
];

static FILLER_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ok", "okay", "k", "thanks", "thx", "ty", "cool", "nice", "great", "awesome", "sure",
        "yes", "yep", "yeah", "nope", "np", "lol",
    ]
    .into_iter()
    .collect()
});

const FILLER_PHRASES: &[&str] = &["thank you", "got it", "sounds good", "no problem"];

/// Lowercase, split on whitespace and drop trailing `! , . ?` from each token.
fn fold_tokens(message: &str) -> Vec<String> {
    message
        .split_whitespace()
        .map(|t| {
            t.trim_end_matches(['!', ',', '.', '?'])
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whole-message matching only, so "hey what is elonmusk up to" stays a query.
pub fn is_greeting(message: &str) -> bool {
    let tokens = fold_tokens(message);
    if tokens.is_empty() {
        return false;
    }
    let folded = tokens.join(" ");

    for g in GREETINGS {
        if folded == *g {
            return true;
        }
        if let Some(rest) = folded.strip_prefix(g).and_then(|r| r.strip_prefix(' ')) {
            if GREETING_FOLLOWUPS.contains(&rest) {
                return true;
            }
        }
    }

    FILLER_PHRASES.contains(&folded.as_str())
        || tokens.iter().all(|t| FILLER_TOKENS.contains(t.as_str()))
}

pub fn classify(message: &str) -> Classification {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Classification::OpenChat;
    }
    if is_greeting(trimmed) {
        return Classification::Greeting;
    }
    if trimmed.chars().count() < ANALYSIS_MAX_CHARS {
        Classification::AnalysisQuery
    } else {
        Classification::OpenChat
    }
}

/// First token is the handle (leading `@` optional, must look like an X
/// handle), an all-digit second token is the count. Counts above [`MAX_POST_COUNT`] are refused, not clamped.
pub fn parse_analysis_request(message: &str) -> Result<AnalysisRequest, QueryError> {
    let mut tokens = message.split_whitespace();

    let username = tokens
        .next()
        .map(|t| t.strip_prefix('@').unwrap_or(t))
        .filter(|u| !u.is_empty())
        .ok_or(QueryError::MissingUsername)?;
    if !HANDLE_RE.is_match(username) {
        return Err(QueryError::InvalidUsername);
    }
    let username = username.to_string();

    let count = match tokens.next() {
        Some(t) if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) => match t.parse::<u32>() {
            Ok(0) => DEFAULT_POST_COUNT,
            Ok(n) if n <= MAX_POST_COUNT => n,
            _ => {
                return Err(QueryError::CountOverLimit {
                    requested: t.trim_start_matches('0').to_string(),
                })
            }
        },
        _ => DEFAULT_POST_COUNT,
    };

    Ok(AnalysisRequest { username, count })
}
