//! The fixed tool catalog.

use serde_json::{json, Value as JsonValue};

use crate::clients::twitter::ops;
use crate::core::{ParamSpec, Params, ToolSpec};

pub const CT0: &str = "ct0";
pub const AUTH_TOKEN: &str = "auth_token";

const COUNT: ParamSpec = ParamSpec::integer(
    "count",
    "Number of tweets to return (default: 20)",
    1,
    100,
    20,
);

pub static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "authenticate",
        description: "Test authentication with provided cookies and return user info",
        operation: ops::WHOAMI,
        params: &[],
    },
    ToolSpec {
        name: "tweet",
        description: "Post a tweet",
        operation: ops::TWEET,
        params: &[ParamSpec::text("text", "The text content of the tweet", 280)],
    },
    ToolSpec {
        name: "get_user_info",
        description: "Get information about a Twitter user",
        operation: ops::GET_USER_INFO,
        params: &[ParamSpec::string(
            "username",
            "The username (without @) to get info for",
        )],
    },
    ToolSpec {
        name: "search_tweets",
        description: "Search for tweets with a specific query",
        operation: ops::SEARCH_TWEETS,
        params: &[
            ParamSpec::string("query", "The search query"),
            COUNT,
            ParamSpec::one_of(
                "product",
                "Type of results to return (e.g., 'Top' or 'Latest')",
                &["Top", "Latest"],
                "Latest",
            ),
        ],
    },
    ToolSpec {
        name: "get_timeline",
        description: "Get tweets from your timeline",
        operation: ops::GET_TIMELINE,
        params: &[COUNT],
    },
    ToolSpec {
        name: "get_latest_timeline",
        description: "Get latest tweets from your timeline",
        operation: ops::GET_LATEST_TIMELINE,
        params: &[COUNT],
    },
    ToolSpec {
        name: "like_tweet",
        description: "Like a tweet by ID",
        operation: ops::LIKE_TWEET,
        params: &[ParamSpec::string("tweet_id", "The ID of the tweet to like")],
    },
    ToolSpec {
        name: "retweet",
        description: "Retweet a tweet by ID",
        operation: ops::RETWEET,
        params: &[ParamSpec::string("tweet_id", "The ID of the tweet to retweet")],
    },
    ToolSpec {
        name: "send_dm",
        description: "Send a direct message to a user",
        operation: ops::SEND_DM,
        params: &[
            ParamSpec::string(
                "recipient_username",
                "The username (without @) of the recipient",
            ),
            ParamSpec::string("text", "The message text to send"),
        ],
    },
    ToolSpec {
        name: "get_dm_history",
        description: "Get direct message history with a user",
        operation: ops::GET_DM_HISTORY,
        params: &[
            ParamSpec::string(
                "recipient_username",
                "The username (without @) to get DM history with",
            ),
            ParamSpec::integer(
                "count",
                "Number of messages to return (default: 20)",
                1,
                100,
                20,
            ),
        ],
    },
    ToolSpec {
        name: "add_reaction_to_message",
        description: "Add a reaction (emoji) to a direct message",
        operation: ops::ADD_REACTION_TO_MESSAGE,
        params: &[
            ParamSpec::string("message_id", "The ID of the message to react to"),
            ParamSpec::string(
                "emoji",
                "The emoji to react with (e.g., '❤️', '👍', '😂')",
            ),
            ParamSpec::string("conversation_id", "The conversation ID"),
        ],
    },
    ToolSpec {
        name: "delete_dm",
        description: "Delete a direct message",
        operation: ops::DELETE_DM,
        params: &[ParamSpec::string("message_id", "The ID of the message to delete")],
    },
];

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.name == name)
}

/// The cookie params every tool accepts. They are only optional when calls
/// may fall back to process-wide credentials.
pub fn credential_params(required: bool) -> [ParamSpec; 2] {
    let ct0 = ParamSpec::string(CT0, "Twitter ct0 cookie");
    let auth = ParamSpec::string(AUTH_TOKEN, "Twitter auth_token cookie");
    if required {
        [ct0, auth]
    } else {
        [ct0.optional(), auth.optional()]
    }
}

/// `inputSchema` for `spec`, credentials included.
pub fn input_schema(spec: &ToolSpec, credentials_required: bool) -> Params {
    spec.input_schema(&credential_params(credentials_required))
}

/// The whole catalog as `tools/list` would present it.
pub fn describe(credentials_required: bool) -> JsonValue {
    let tools: Vec<JsonValue> = TOOLS
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "inputSchema": input_schema(t, credentials_required),
            })
        })
        .collect();
    json!({ "tools": tools })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_twelve_uniquely_named_tools() {
        let names: HashSet<_> = TOOLS.iter().map(|t| t.name).collect();
        assert_eq!(TOOLS.len(), 12);
        assert_eq!(names.len(), TOOLS.len());
        assert!(find("search_tweets").is_some());
        assert!(find("follow").is_none());
    }

    #[test]
    fn every_schema_lists_credentials() {
        for t in TOOLS {
            let schema = input_schema(t, true);
            let required = schema["required"].as_array().unwrap();
            assert!(required.contains(&json!(CT0)), "{}", t.name);
            assert!(required.contains(&json!(AUTH_TOKEN)), "{}", t.name);
            assert_eq!(schema["properties"][CT0]["type"], "string");
        }
    }

    #[test]
    fn credentials_are_optional_with_fallback() {
        let schema = input_schema(find("get_timeline").unwrap(), false);
        assert_eq!(schema["required"], json!([]));
        assert!(schema["properties"].get(AUTH_TOKEN).is_some());
    }

    #[test]
    fn tweet_schema_caps_length() {
        let schema = input_schema(find("tweet").unwrap(), true);
        assert_eq!(schema["properties"]["text"]["maxLength"], 280);
        assert_eq!(schema["required"], json!(["text", CT0, AUTH_TOKEN]));
    }

    #[test]
    fn credentials_are_not_forwarded() {
        let spec = find("like_tweet").unwrap();
        let args = json!({"tweet_id": "1", "ct0": "c", "auth_token": "a"});
        let out = spec.validate(args.as_object().unwrap()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["tweet_id"], "1");
    }

    #[test]
    fn describe_renders_every_tool() {
        let v = describe(true);
        assert_eq!(v["tools"].as_array().unwrap().len(), TOOLS.len());
        assert_eq!(v["tools"][0]["inputSchema"]["type"], "object");
    }
}
