// src/sela/mod.rs
//! Data acquisition boundary: fetch a user's recent posts from the scraping
//! service and describe the attempt in a per-request activity log.

pub mod activity;
pub mod client;

use async_trait::async_trait;
use thiserror::Error;

use crate::summary::normalize::{normalize, NormalizedPost, RawPostRecord};

pub use activity::{header_json, ActivityEntry, ActivityLog, EntryKind, Platform};
pub use client::SelaClient;

/// Outcome of one fetch attempt. Structured failures live here so they can be
/// turned into a natural-language apology instead of aborting the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Posts(PostBatch),
    Failed { error: String },
}

impl FetchResult {
    pub fn from_rows(rows: &[RawPostRecord], requested_count: u32) -> Self {
        FetchResult::Posts(PostBatch::from_rows(rows, requested_count))
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        FetchResult::Failed {
            error: error.to_string(),
        }
    }
}

/// Normalized posts, never more than were asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBatch {
    posts: Vec<NormalizedPost>,
    requested_count: u32,
}

impl PostBatch {
    pub fn from_rows(rows: &[RawPostRecord], requested_count: u32) -> Self {
        let posts = rows
            .iter()
            .take(requested_count as usize)
            .map(normalize)
            .collect();
        Self {
            posts,
            requested_count,
        }
    }

    pub fn posts(&self) -> &[NormalizedPost] {
        &self.posts
    }

    pub fn requested_count(&self) -> u32 {
        self.requested_count
    }

    pub fn retrieved_count(&self) -> u32 {
        self.posts.len() as u32
    }
}

/// Failure modes of the scraping service. `Display` is the text shown to the
/// generation provider, so it stays free of internal detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("the data service is not configured (missing API key)")]
    MissingApiKey,
    #[error("profile @{0} was not found")]
    NotFound(String),
    #[error("access was blocked by the platform (rate limited or permission denied)")]
    AccessBlocked,
    #[error("a network error occurred while contacting the data service")]
    Network,
    #[error("the data service returned a response that could not be read")]
    Malformed,
    #[error("the data service reported an error: {0}")]
    Rejected(String),
}

impl FetchFailure {
    /// Map a non-success HTTP status onto a failure mode.
    pub fn from_status(status: u16, username: &str) -> Self {
        match status {
            404 => FetchFailure::NotFound(username.to_string()),
            401 | 403 | 429 => FetchFailure::AccessBlocked,
            _ => FetchFailure::Rejected(format!("HTTP {status}")),
        }
    }
}

/// Anything that can fetch posts for a handle. `Err` is reserved for faults
/// that are not one of the [`FetchFailure`] modes.
#[async_trait]
pub trait PostFetcher: Send + Sync {
    async fn fetch_user_posts(
        &self,
        username: &str,
        count: u32,
        log: &ActivityLog,
    ) -> anyhow::Result<FetchResult>;

    fn name(&self) -> &'static str;
}
