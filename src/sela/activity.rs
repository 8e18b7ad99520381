// src/sela/activity.rs
//! Per-request record of calls made to the scraping service, surfaced to the
//! browser in the `x-activity-log` response header.

use serde::Serialize;
use std::sync::Mutex;

/// Header budget for the serialized log.
pub const ACTIVITY_HEADER_BUDGET: usize = 7_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Search,
    Browse,
    Error,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub id: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub platform: Platform,
    pub message: String,
    pub url: Option<String>,
    pub details: Option<String>,
}

/// Owned by a single request; nothing here is shared across requests.
#[derive(Debug, Default)]
pub struct ActivityLog {
    inner: Mutex<Vec<ActivityEntry>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        kind: EntryKind,
        platform: Platform,
        message: impl Into<String>,
        url: Option<&str>,
    ) {
        let entry = ActivityEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
            platform,
            message: message.into(),
            url: url.map(str::to_string),
            details: None,
        };
        tracing::debug!(kind = ?entry.kind, message = %entry.message, "activity");
        self.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read and clear.
    pub fn take(&self) -> Vec<ActivityEntry> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ActivityEntry>> {
        // entries are plain data, a poisoned guard is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Replace every non-ASCII char, and DEL, with `\uXXXX` escapes so the result
/// is a valid header value. Only valid on JSON text, where such chars can only
/// occur inside string literals.
fn ascii_json(json: &str) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() && ch != '\u{7f}' {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
    out
}

/// Serialize entries as an ASCII-only JSON array no longer than `budget`
/// bytes, dropping whole entries from the oldest end until it fits.
pub fn header_json(entries: &[ActivityEntry], budget: usize) -> String {
    let encoded: Vec<String> = entries
        .iter()
        .filter_map(|e| serde_json::to_string(e).ok())
        .map(|s| ascii_json(&s))
        .collect();

    // "[" + items joined by "," + "]"
    let mut total = 2 + encoded.iter().map(String::len).sum::<usize>()
        + encoded.len().saturating_sub(1);
    let mut start = 0;
    while total > budget && start < encoded.len() {
        total -= encoded[start].len();
        if start + 1 < encoded.len() {
            total -= 1;
        }
        start += 1;
    }

    format!("[{}]", encoded[start..].join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(n: usize, msg_len: usize) -> ActivityLog {
        let log = ActivityLog::new();
        for i in 0..n {
            log.record(
                EntryKind::Info,
                Platform::Twitter,
                format!("{i:03}-{}", "x".repeat(msg_len)),
                Some("https://x.com/nasa"),
            );
        }
        log
    }

    #[test]
    fn take_clears() {
        let log = log_with(3, 4);
        assert_eq!(log.take().len(), 3);
        assert!(log.is_empty());
    }

    #[test]
    fn entry_wire_shape() {
        let log = log_with(1, 1);
        let v: serde_json::Value = serde_json::from_str(&header_json(&log.take(), 7_000)).unwrap();
        let e = &v[0];
        assert_eq!(e["type"], "info");
        assert_eq!(e["platform"], "twitter");
        assert_eq!(e["url"], "https://x.com/nasa");
        assert!(e["details"].is_null());
        assert!(e["id"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn under_budget_keeps_everything() {
        let entries = log_with(5, 10).take();
        let json = header_json(&entries, ACTIVITY_HEADER_BUDGET);
        assert_eq!(json, serde_json::to_string(&entries).unwrap());
    }

    #[test]
    fn over_budget_drops_oldest_whole_entries() {
        let entries = log_with(40, 400).take();
        let json = header_json(&entries, ACTIVITY_HEADER_BUDGET);
        assert!(json.len() <= ACTIVITY_HEADER_BUDGET);

        let kept: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert!(!kept.is_empty() && kept.len() < 40);
        // newest entry survives, oldest does not
        let last = kept.last().unwrap()["message"].as_str().unwrap();
        assert!(last.starts_with("039-"));
        let first = kept[0]["message"].as_str().unwrap();
        assert!(!first.starts_with("000-"));
    }

    #[test]
    fn non_ascii_is_escaped() {
        let log = ActivityLog::new();
        log.record(EntryKind::Info, Platform::Twitter, "Retrieved posts for @žluť 🚀", None);
        let json = header_json(&log.take(), ACTIVITY_HEADER_BUDGET);
        assert!(json.is_ascii());
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v[0]["message"], "Retrieved posts for @žluť 🚀");
    }

    #[test]
    fn control_chars_stay_header_safe() {
        let log = ActivityLog::new();
        log.record(EntryKind::Browse, Platform::Twitter, "Fetching posts for @nasa\u{7f}", None);
        log.record(EntryKind::Error, Platform::System, "tab\there\u{1}", None);
        let json = header_json(&log.take(), ACTIVITY_HEADER_BUDGET);

        assert!(json.contains("\\u007f"));
        assert!(axum::http::HeaderValue::from_str(&json).is_ok());
        let v: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0]["message"], "Fetching posts for @nasa\u{7f}");
    }

    #[test]
    fn single_oversized_entry_yields_empty_array() {
        let entries = log_with(1, 500).take();
        assert_eq!(header_json(&entries, 100), "[]");
    }
}
