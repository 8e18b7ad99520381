// src/summary/prompt.rs
//! Turns a fetch outcome into the user-turn prompt for the generation provider.
//! Pure: same inputs, same bytes.

use std::fmt::Write as _;

use super::normalize::NormalizedPost;
use crate::sela::FetchResult;

/// Rendered post bodies are cut to this many characters.
pub const MAX_POST_CHARS: usize = 400;

/// How the posts were obtained; the summary has to say so.
pub const ACCESS_METHOD: &str = "authenticated Sela Network session";

pub fn build_prompt(username: &str, result: &FetchResult, requested_count: u32) -> String {
    let batch = match result {
        FetchResult::Failed { error } => return error_prompt(username, error),
        FetchResult::Posts(batch) if batch.posts().is_empty() => return empty_prompt(username),
        FetchResult::Posts(batch) => batch,
    };

    let retrieved = batch.retrieved_count();
    let mut out = String::with_capacity(1024 + retrieved as usize * 200);

    let _ = writeln!(out, "Summarize recent Twitter/X activity for @{username}.");
    out.push_str("\n## Retrieved Data\n\n");
    let _ = writeln!(out, "**Posts retrieved:** {retrieved} (via {ACCESS_METHOD})");
    if retrieved < requested_count {
        let _ = writeln!(
            out,
            "Note: {requested_count} posts were requested but only {retrieved} were retrieved. Mention this in the summary."
        );
    }

    for (i, post) in batch.posts().iter().enumerate() {
        out.push('\n');
        out.push_str(&render_entry(i + 1, post, username));
        out.push('\n');
    }

    out.push_str("\n## Instructions\n\n");
    out.push_str(
        "Based ONLY on the posts above, produce an activity summary following the exact structure from your system prompt:\n",
    );
    let _ = writeln!(out, "- Activity Summary header with @{username}");
    let _ = writeln!(out, "- \"Retrieved {retrieved} posts via {ACCESS_METHOD}.\"");
    out.push_str(
        "- Posting frequency\n\
         - Main topics (grouped by theme, specific not vague)\n\
         - Content breakdown (originals / replies / retweets / threads)\n\
         - Notable observations\n\
         - Engagement snapshot\n\
         \n\
         RULES:\n\
         - Be factual. Do not interpret intent, mood, or sentiment.\n\
         - Be specific with topic descriptions.\n\
         - Group by topic, not chronology.\n\
         - Do not reproduce full post text; quote at most a few words.\n\
         - Do not expose private information.\n",
    );
    let _ = write!(out, "- State that content was accessed via an {ACCESS_METHOD}.");

    out
}

fn error_prompt(username: &str, error: &str) -> String {
    format!(
        "I tried to fetch posts for @{username} but encountered an error: {error}\n\n\
         Please respond with a short apology explaining that the posts could not be retrieved and why. \
         Follow the error handling rules from your system prompt and do not invent any posts."
    )
}

fn empty_prompt(username: &str) -> String {
    format!(
        "I fetched @{username}'s profile but found no recent posts.\n\n\
         Please respond with an appropriate message (e.g., \"@{username} hasn't posted recently.\")."
    )
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn render_entry(n: usize, post: &NormalizedPost, username: &str) -> String {
    let mut entry = format!("{n}. {}", truncate_chars(&post.content, MAX_POST_CHARS));

    let mut notes: Vec<String> = Vec::new();
    if let Some(ts) = post.timestamp.as_deref() {
        notes.push(format!("Time: {ts}"));
    }
    if let Some(likes) = post.likes.filter(|n| *n > 0) {
        notes.push(format!("Likes: {likes}"));
    }
    if let Some(rts) = post.retweets.filter(|n| *n > 0) {
        notes.push(format!("Retweets: {rts}"));
    }
    if let Some(replies) = post.replies.filter(|n| *n > 0) {
        notes.push(format!("Replies: {replies}"));
    }
    if let Some(author) = post.author.as_deref() {
        let author_handle = author.trim_start_matches('@');
        if !author_handle.eq_ignore_ascii_case(username.trim_start_matches('@')) {
            notes.push(format!("Author: {author}"));
        }
    }
    if post.is_reply {
        notes.push("[Reply]".to_string());
    }
    if post.is_retweet {
        notes.push("[Retweet]".to_string());
    }

    if !notes.is_empty() {
        entry.push_str("\n   ");
        entry.push_str(&notes.join(" | "));
    }
    entry
}
