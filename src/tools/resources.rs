//! Read-only `twitter://` resources. The URI fragment, when present, names
//! the user or query the resource is about.

use reqwest::Url;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::clients::twitter::ops;
use crate::core::Params;

pub const SCHEME: &str = "twitter";
pub const MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec {
    pub path: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub operation: &'static str,
    /// Parameter filled from the fragment, and its value when there is none.
    pub subject: Option<(&'static str, &'static str)>,
}

impl ResourceSpec {
    pub fn uri(&self) -> String {
        format!("{SCHEME}://{}", self.path)
    }
}

pub static RESOURCES: &[ResourceSpec] = &[
    ResourceSpec {
        path: "timeline",
        name: "Twitter Timeline",
        description: "Get tweets from your timeline (requires ct0 and auth_token)",
        operation: ops::GET_TIMELINE,
        subject: None,
    },
    ResourceSpec {
        path: "user-tweets",
        name: "User Tweets",
        description: "Get tweets from a specific user (requires ct0 and auth_token)",
        operation: ops::GET_USER_TWEETS,
        subject: Some(("username", "twitter")),
    },
    ResourceSpec {
        path: "search",
        name: "Search Tweets",
        description: "Search for tweets (requires ct0 and auth_token)",
        operation: ops::SEARCH_TWEETS,
        subject: Some(("query", "python")),
    },
    ResourceSpec {
        path: "dm-history",
        name: "DM History",
        description: "Get direct message history with a user (requires ct0 and auth_token)",
        operation: ops::GET_DM_HISTORY,
        subject: Some(("recipient_username", "twitter")),
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("invalid resource uri: {0}")]
    InvalidUri(String),
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Unknown resource path: {0}")]
    UnknownPath(String),
}

/// A resource read resolved to an upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRead {
    pub spec: &'static ResourceSpec,
    pub params: Params,
}

pub fn resolve(uri: &str) -> Result<ResourceRead, ResourceError> {
    let url = Url::parse(uri).map_err(|e| ResourceError::InvalidUri(format!("{uri}: {e}")))?;
    if url.scheme() != SCHEME {
        return Err(ResourceError::UnsupportedScheme(url.scheme().to_string()));
    }
    let joined = format!("{}{}", url.host_str().unwrap_or_default(), url.path());
    let path = joined.trim_matches('/');
    let spec = RESOURCES
        .iter()
        .find(|r| r.path == path)
        .ok_or_else(|| ResourceError::UnknownPath(path.to_string()))?;

    let mut params = Params::new();
    params.insert("count".into(), JsonValue::from(20));
    if spec.operation == ops::SEARCH_TWEETS {
        params.insert("product".into(), JsonValue::from("Latest"));
    }
    if let Some((name, fallback)) = spec.subject {
        let value = url
            .fragment()
            .filter(|f| !f.is_empty())
            .unwrap_or(fallback);
        params.insert(name.into(), JsonValue::from(value));
    }
    Ok(ResourceRead { spec, params })
}
