// src/summary/normalize.rs
//! Canonical post view over loosely-shaped scraper rows.
//!
//! The scraper does not promise a schema, so every logical attribute is read
//! through an ordered list of candidate keys. The first candidate holding a
//! usable value wins; a row never fails normalization as a whole.

use serde::Serialize;
use serde_json::{Map, Value};

/// One row as returned by the scraping service.
pub type RawPostRecord = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPost {
    pub content: String,
    pub likes: Option<u64>,
    pub retweets: Option<u64>,
    pub replies: Option<u64>,
    pub timestamp: Option<String>,
    pub author: Option<String>,
    pub is_reply: bool,
    pub is_retweet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Content,
    Likes,
    Retweets,
    Replies,
    Timestamp,
    Author,
    IsReply,
    IsRetweet,
}

impl Field {
    /// Candidate keys in probe order.
    pub const fn candidates(self) -> &'static [&'static str] {
        match self {
            Field::Content => &["content", "text", "full_text", "title"],
            Field::Likes => &["likesCount", "like_count", "likes", "favorite_count"],
            Field::Retweets => &["retweetsCount", "retweet_count", "retweets"],
            Field::Replies => &["repliesCount", "reply_count", "replies"],
            Field::Timestamp => &["postedAt", "timestamp", "created_at", "date", "time"],
            Field::Author => &["username", "author_name", "author", "screen_name"],
            Field::IsReply => &["isReply", "is_reply", "in_reply_to"],
            Field::IsRetweet => &["isRetweet", "is_retweet", "retweeted"],
        }
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Walk the candidates, skipping blank values and values `convert` rejects.
fn probe<T>(raw: &RawPostRecord, field: Field, convert: impl Fn(&Value) -> Option<T>) -> Option<T> {
    field
        .candidates()
        .iter()
        .filter_map(|k| raw.get(*k))
        .filter(|v| !is_blank(v))
        .find_map(convert)
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accepts JSON numbers and numeric strings such as `"1,204"`.
fn as_count(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().replace(',', "").parse::<u64>().ok(),
        _ => None,
    }
}

fn as_flag(v: &Value) -> Option<bool> {
    Some(match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"),
        // a reply-to object or id list means "is a reply"
        Value::Object(_) | Value::Array(_) => true,
        Value::Null => return None,
    })
}

pub fn normalize(raw: &RawPostRecord) -> NormalizedPost {
    NormalizedPost {
        content: probe(raw, Field::Content, as_text).unwrap_or_default(),
        likes: probe(raw, Field::Likes, as_count),
        retweets: probe(raw, Field::Retweets, as_count),
        replies: probe(raw, Field::Replies, as_count),
        timestamp: probe(raw, Field::Timestamp, as_text),
        author: probe(raw, Field::Author, as_text),
        is_reply: probe(raw, Field::IsReply, as_flag).unwrap_or(false),
        is_retweet: probe(raw, Field::IsRetweet, as_flag).unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> RawPostRecord {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn sela_shaped_row() {
        let p = normalize(&row(json!({
            "content": "Launch window opens at 9:00",
            "likesCount": 1200,
            "retweetsCount": 80,
            "repliesCount": 0,
            "postedAt": "2025-05-01T09:00:00Z",
            "username": "nasa",
            "tweetId": "1"
        })));
        assert_eq!(p.content, "Launch window opens at 9:00");
        assert_eq!(p.likes, Some(1200));
        assert_eq!(p.retweets, Some(80));
        assert_eq!(p.replies, Some(0));
        assert_eq!(p.timestamp.as_deref(), Some("2025-05-01T09:00:00Z"));
        assert_eq!(p.author.as_deref(), Some("nasa"));
        assert!(!p.is_reply && !p.is_retweet);
    }

    #[test]
    fn falls_through_blank_candidates() {
        let p = normalize(&row(json!({
            "content": "",
            "text": null,
            "title": "From the title",
            "like_count": "1,204",
            "in_reply_to": {"id": "9"},
            "retweeted": false
        })));
        assert_eq!(p.content, "From the title");
        assert_eq!(p.likes, Some(1204));
        assert!(p.is_reply);
        assert!(!p.is_retweet);
    }

    #[test]
    fn unparseable_count_tries_next_key() {
        let p = normalize(&row(json!({"likesCount": "n/a", "likes": 7})));
        assert_eq!(p.likes, Some(7));
    }

    #[test]
    fn missing_content_is_empty_not_dropped() {
        let p = normalize(&row(json!({"likesCount": 3})));
        assert_eq!(p.content, "");
        assert_eq!(p.likes, Some(3));
    }
}
