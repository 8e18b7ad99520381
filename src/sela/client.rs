// src/sela/client.rs
//! Sela Network REST client (`POST /api/rpc/scrapeUrl`, scrape type
//! `TWITTER_PROFILE`). One attempt per request, no retries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::activity::{ActivityLog, EntryKind, Platform};
use super::{FetchFailure, FetchResult, PostFetcher};
use crate::config::SelaConfig;
use crate::summary::normalize::RawPostRecord;

const SCRAPE_PATH: &str = "/api/rpc/scrapeUrl";
const SCRAPE_TYPE: &str = "TWITTER_PROFILE";
const PROFILE_BASE: &str = "https://x.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    scrape_type: &'a str,
    post_count: u32,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    error: Option<String>,
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    #[serde(default)]
    result: Vec<Value>,
}

#[derive(Clone)]
pub struct SelaClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SelaClient {
    pub fn new(cfg: &SelaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("recap-agent/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building sela http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn fail(
        &self,
        log: &ActivityLog,
        username: &str,
        profile_url: &str,
        failure: FetchFailure,
    ) -> FetchResult {
        log.record(
            EntryKind::Error,
            Platform::Twitter,
            format!("Failed to fetch posts for @{username}: {failure}"),
            Some(profile_url),
        );
        counter!("sela_fetch_total", "outcome" => "error").increment(1);
        FetchResult::failed(failure)
    }
}

/// Scraper rows sometimes carry `tweetUrl` as a path.
fn absolutize_post_url(row: &mut RawPostRecord) {
    if let Some(Value::String(u)) = row.get_mut("tweetUrl") {
        if !u.is_empty() && !u.starts_with("http") {
            *u = format!("{PROFILE_BASE}{u}");
        }
    }
}

#[async_trait]
impl PostFetcher for SelaClient {
    async fn fetch_user_posts(
        &self,
        username: &str,
        count: u32,
        log: &ActivityLog,
    ) -> Result<FetchResult> {
        let username = username.trim_start_matches('@');
        let profile_url = format!("{PROFILE_BASE}/{username}");

        if self.api_key.is_empty() {
            log.record(
                EntryKind::Error,
                Platform::System,
                "SELA_API_KEY is not set",
                None,
            );
            counter!("sela_fetch_total", "outcome" => "error").increment(1);
            return Ok(FetchResult::failed(FetchFailure::MissingApiKey));
        }

        log.record(
            EntryKind::Browse,
            Platform::Twitter,
            format!("Fetching posts for @{username}"),
            Some(&profile_url),
        );

        let resp = match self
            .http
            .post(format!("{}{SCRAPE_PATH}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ScrapeRequest {
                url: &profile_url,
                scrape_type: SCRAPE_TYPE,
                post_count: count,
            })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = ?e, provider = "sela", "scrape request failed");
                return Ok(self.fail(log, username, &profile_url, FetchFailure::Network));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                body = %body.chars().take(200).collect::<String>(),
                "sela returned non-success status"
            );
            let failure = FetchFailure::from_status(status.as_u16(), username);
            return Ok(self.fail(log, username, &profile_url, failure));
        }

        let body: ScrapeResponse = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = ?e, "sela response decode failed");
                let failure = if e.is_decode() {
                    FetchFailure::Malformed
                } else {
                    FetchFailure::Network
                };
                return Ok(self.fail(log, username, &profile_url, failure));
            }
        };

        if !body.success {
            let msg = body
                .error
                .unwrap_or_else(|| "API returned success=false".to_string());
            return Ok(self.fail(log, username, &profile_url, FetchFailure::Rejected(msg)));
        }

        let rows: Vec<RawPostRecord> = body
            .data
            .map(|d| d.result)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(mut row) => {
                    absolutize_post_url(&mut row);
                    Some(row)
                }
                _ => None,
            })
            .collect();

        log.record(
            EntryKind::Info,
            Platform::Twitter,
            format!("Retrieved {} posts for @{username}", rows.len().min(count as usize)),
            Some(&profile_url),
        );
        counter!("sela_fetch_total", "outcome" => "ok").increment(1);

        Ok(FetchResult::from_rows(&rows, count))
    }

    fn name(&self) -> &'static str {
        "sela"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relative_post_url_gets_host() {
        let mut row = json!({"tweetUrl": "/nasa/status/1"}).as_object().cloned().unwrap();
        absolutize_post_url(&mut row);
        assert_eq!(row["tweetUrl"], "https://x.com/nasa/status/1");

        let mut abs = json!({"tweetUrl": "https://x.com/a/status/2"}).as_object().cloned().unwrap();
        absolutize_post_url(&mut abs);
        assert_eq!(abs["tweetUrl"], "https://x.com/a/status/2");
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(ScrapeRequest {
            url: "https://x.com/nasa",
            scrape_type: SCRAPE_TYPE,
            post_count: 10,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"url": "https://x.com/nasa", "scrapeType": "TWITTER_PROFILE", "postCount": 10})
        );
    }

    #[tokio::test]
    async fn missing_key_is_structured_error() {
        let client = SelaClient::new(&SelaConfig {
            api_key: String::new(),
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 1,
        })
        .unwrap();
        let log = ActivityLog::new();
        let out = client.fetch_user_posts("@nasa", 5, &log).await.unwrap();
        assert_eq!(out, FetchResult::failed(FetchFailure::MissingApiKey));
        let entries = log.take();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Error);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = SelaClient::new(&SelaConfig {
            api_key: "k".into(),
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
        })
        .unwrap();
        let log = ActivityLog::new();
        let out = client.fetch_user_posts("nasa", 5, &log).await.unwrap();
        assert_eq!(out, FetchResult::failed(FetchFailure::Network));
        // browse attempt + error
        assert_eq!(log.len(), 2);
    }
}
