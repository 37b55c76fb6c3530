//! Upstream response shapes and their mapping onto the domain types.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::domain::{normalize_timestamp, timestamp_from_millis, DirectMessage, Tweet, UserProfile};

#[derive(Debug, Deserialize)]
pub struct UserWire {
    #[serde(default)]
    pub id_str: String,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub friends_count: u64,
    #[serde(default)]
    pub statuses_count: u64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub created_at: String,
}

impl From<UserWire> for UserProfile {
    fn from(w: UserWire) -> Self {
        UserProfile {
            id: w.id_str,
            username: w.screen_name,
            name: w.name,
            description: w.description.unwrap_or_default(),
            followers_count: w.followers_count,
            following_count: w.friends_count,
            tweet_count: w.statuses_count,
            verified: w.verified,
            created_at: normalize_timestamp(&w.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TweetWire {
    pub id_str: String,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub user: Option<UserWire>,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
}

impl From<TweetWire> for Tweet {
    fn from(w: TweetWire) -> Self {
        let (author, author_name) = w
            .user
            .map(|u| (u.screen_name, u.name))
            .unwrap_or_default();
        Tweet {
            id: w.id_str,
            text: w.full_text.or(w.text).unwrap_or_default(),
            author,
            author_name,
            created_at: normalize_timestamp(&w.created_at),
            like_count: w.favorite_count,
            retweet_count: w.retweet_count,
            reply_count: w.reply_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchWire {
    #[serde(default)]
    pub statuses: Vec<TweetWire>,
}

#[derive(Debug, Deserialize)]
pub struct DmEventWire {
    pub id: String,
    #[serde(default)]
    pub created_timestamp: String,
    #[serde(default)]
    pub message_create: Option<MessageCreateWire>,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreateWire {
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub target: Option<TargetWire>,
    #[serde(default)]
    pub message_data: Option<MessageDataWire>,
}

#[derive(Debug, Deserialize)]
pub struct TargetWire {
    #[serde(default)]
    pub recipient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageDataWire {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachment: Option<JsonValue>,
}

impl DmEventWire {
    pub fn involves(&self, user_id: &str) -> bool {
        let Some(mc) = &self.message_create else {
            return false;
        };
        mc.sender_id.as_deref() == Some(user_id)
            || mc.target.as_ref().and_then(|t| t.recipient_id.as_deref()) == Some(user_id)
    }
}

impl From<DmEventWire> for DirectMessage {
    fn from(w: DmEventWire) -> Self {
        let (sender_id, recipient_id, text, attachment) = match w.message_create {
            Some(mc) => {
                let (text, attachment) = mc
                    .message_data
                    .map(|d| (d.text, d.attachment))
                    .unwrap_or_default();
                (
                    mc.sender_id,
                    mc.target.and_then(|t| t.recipient_id),
                    text,
                    attachment,
                )
            }
            None => (None, None, String::new(), None),
        };
        DirectMessage {
            id: w.id,
            text,
            time: timestamp_from_millis(&w.created_timestamp),
            sender_id,
            recipient_id,
            attachment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DmListWire {
    #[serde(default)]
    pub events: Vec<DmEventWire>,
}

#[derive(Debug, Deserialize)]
pub struct DmCreatedWire {
    pub event: DmEventWire,
}

#[derive(Debug, Deserialize)]
pub struct ErrorsWire {
    #[serde(default)]
    pub errors: Vec<ErrorItemWire>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorItemWire {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tweet_prefers_full_text_and_flattens_author() {
        let w: TweetWire = serde_json::from_value(json!({
            "id_str": "1",
            "text": "short",
            "full_text": "the long version",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "user": {"id_str": "9", "screen_name": "rustlang", "name": "Rust"},
            "favorite_count": 3
        }))
        .unwrap();
        let t = Tweet::from(w);
        assert_eq!(t.text, "the long version");
        assert_eq!(t.author, "rustlang");
        assert_eq!(t.author_name, "Rust");
        assert_eq!(t.like_count, 3);
        assert_eq!(t.retweet_count, 0);
        assert_eq!(t.created_at, "2018-10-10T20:19:24+00:00");
    }

    #[test]
    fn user_maps_friends_to_following() {
        let w: UserWire = serde_json::from_value(json!({
            "id_str": "9", "screen_name": "rustlang", "name": "Rust",
            "followers_count": 10, "friends_count": 2, "statuses_count": 5, "verified": true
        }))
        .unwrap();
        let u = UserProfile::from(w);
        assert_eq!(u.following_count, 2);
        assert_eq!(u.tweet_count, 5);
        assert!(u.verified);
        assert_eq!(u.description, "");
    }

    #[test]
    fn dm_event_flattens_and_matches_peer() {
        let w: DmEventWire = serde_json::from_value(json!({
            "id": "m1",
            "created_timestamp": "1539202764000",
            "message_create": {
                "sender_id": "1",
                "target": {"recipient_id": "2"},
                "message_data": {"text": "hi"}
            }
        }))
        .unwrap();
        assert!(w.involves("1"));
        assert!(w.involves("2"));
        assert!(!w.involves("3"));
        let m = DirectMessage::from(w);
        assert_eq!(m.text, "hi");
        assert_eq!(m.recipient_id.as_deref(), Some("2"));
        assert_eq!(m.time, "2018-10-10T20:19:24+00:00");
        assert!(m.attachment.is_none());
    }
}
