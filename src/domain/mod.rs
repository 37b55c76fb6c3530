//! Result shapes returned to tool callers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author: String,
    pub author_name: String,
    pub created_at: String,
    pub like_count: u64,
    pub retweet_count: u64,
    pub reply_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    pub description: String,
    pub followers_count: u64,
    pub following_count: u64,
    pub tweet_count: u64,
    pub verified: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub id: String,
    pub text: String,
    pub time: String,
    pub sender_id: Option<String>,
    pub recipient_id: Option<String>,
    pub attachment: Option<serde_json::Value>,
}

/// Upstream timestamps look like `Wed Oct 10 20:19:24 +0000 2018`. Render
/// them as RFC 3339 when they parse, pass them through otherwise.
pub fn normalize_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|_| raw.to_string())
}

/// Millisecond epoch strings, as used for direct messages.
pub fn timestamp_from_millis(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| raw.to_string())
}
