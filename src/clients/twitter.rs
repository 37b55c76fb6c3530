//! Twitter web API adapter: the concrete [`Authenticator`] and
//! [`UpstreamSession`] behind the session cache.
//!
//! This is glue. It maps operation names to endpoints, attaches the cookie
//! credentials, classifies failures and shapes responses. It does not retry.

use std::sync::Arc;
use std::time::Instant;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};

use super::wire::{
    DmCreatedWire, DmEventWire, DmListWire, ErrorsWire, SearchWire, TweetWire, UserWire,
};
use crate::core::Params;
use crate::domain::{DirectMessage, Tweet, UserProfile};
use crate::infra::config::UpstreamConfig;
use crate::infra::http::headers::add_standard_headers;
use crate::infra::logging::log_metric;
use crate::infra::runtime::limits::make_http_client;
use crate::session::{Authenticator, CredentialPair, SessionError, UpstreamSession};

/// Operation names understood by [`TwitterSession::invoke`].
pub mod ops {
    pub const WHOAMI: &str = "whoami";
    pub const TWEET: &str = "tweet";
    pub const GET_USER_INFO: &str = "get_user_info";
    pub const SEARCH_TWEETS: &str = "search_tweets";
    pub const GET_TIMELINE: &str = "get_timeline";
    pub const GET_LATEST_TIMELINE: &str = "get_latest_timeline";
    pub const GET_USER_TWEETS: &str = "get_user_tweets";
    pub const LIKE_TWEET: &str = "like_tweet";
    pub const RETWEET: &str = "retweet";
    pub const SEND_DM: &str = "send_dm";
    pub const GET_DM_HISTORY: &str = "get_dm_history";
    pub const ADD_REACTION_TO_MESSAGE: &str = "add_reaction_to_message";
    pub const DELETE_DM: &str = "delete_dm";
}

const VERIFY_PATH: &str = "/1.1/account/verify_credentials.json";
const DEFAULT_COUNT: i64 = 20;

/// Upstream error codes meaning the cookies no longer identify a session.
const EXPIRED_CODES: [i64; 4] = [32, 89, 215, 353];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Authenticate,
    Invoke,
}

#[derive(Clone)]
pub struct TwitterWeb {
    base: String,
    http: Client,
    bearer: Option<String>,
}

impl TwitterWeb {
    pub fn new(base: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::from_config(&UpstreamConfig {
            base_url: base.into(),
            ..UpstreamConfig::default()
        })
    }

    pub fn from_config(cfg: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base: cfg.base_url.trim_end_matches('/').to_string(),
            http: make_http_client(cfg)?,
            bearer: cfg.bearer_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str, creds: &CredentialPair) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        tracing::debug!(endpoint = %url, %method, "twitter request");
        let mut builder = self
            .http
            .request(method, url)
            .header(reqwest::header::COOKIE, creds.cookie_header())
            .header("x-csrf-token", creds.ct0())
            .header("x-twitter-auth-type", "OAuth2Session")
            .header("x-twitter-active-user", "yes");
        if let Some(bearer) = &self.bearer {
            builder = builder.bearer_auth(bearer);
        }
        add_standard_headers(builder, None).0
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        phase: Phase,
        operation: &str,
    ) -> Result<JsonValue, SessionError> {
        let start = Instant::now();
        let res = send_inner(builder, phase).await;
        log_metric(operation, "upstream_latency_ms", start.elapsed().as_millis() as f64);
        if res.is_err() {
            log_metric(operation, "upstream_error_total", 1.0);
        }
        res
    }

    async fn send_as<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        phase: Phase,
        operation: &str,
    ) -> Result<T, SessionError> {
        let body = self.send(builder, phase, operation).await?;
        serde_json::from_value(body)
            .map_err(|e| SessionError::Upstream(format!("unexpected response shape: {e}")))
    }

    async fn verify(&self, creds: &CredentialPair, phase: Phase) -> Result<UserWire, SessionError> {
        let req = self.request(Method::GET, VERIFY_PATH, creds);
        self.send_as(req, phase, ops::WHOAMI).await
    }
}

async fn send_inner(builder: RequestBuilder, phase: Phase) -> Result<JsonValue, SessionError> {
    let resp = builder.send().await.map_err(transport_error)?;
    let status = resp.status();
    let body = resp.text().await.map_err(transport_error)?;
    if !status.is_success() {
        return Err(classify(status, &body, phase));
    }
    if body.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| SessionError::Upstream(format!("unexpected response body: {e}")))
}

fn transport_error(e: reqwest::Error) -> SessionError {
    if e.is_timeout() {
        SessionError::Upstream(format!("request timed out: {e}"))
    } else {
        SessionError::Upstream(format!("request failed: {e}"))
    }
}

/// Map a non-success upstream response onto the error taxonomy.
fn classify(status: StatusCode, body: &str, phase: Phase) -> SessionError {
    let errors = serde_json::from_str::<ErrorsWire>(body)
        .map(|w| w.errors)
        .unwrap_or_default();
    let detail = errors
        .first()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .unwrap_or_else(|| format!("upstream status {status}"));
    let expired_code = errors.iter().any(|e| EXPIRED_CODES.contains(&e.code));

    match phase {
        Phase::Authenticate
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) || expired_code =>
        {
            SessionError::AuthenticationFailed(detail)
        }
        Phase::Invoke if status == StatusCode::UNAUTHORIZED || expired_code => {
            SessionError::SessionExpired(detail)
        }
        _ if status == StatusCode::TOO_MANY_REQUESTS => {
            SessionError::Upstream(format!("rate limited: {detail}"))
        }
        _ => SessionError::Upstream(format!("{detail} [{status}]")),
    }
}

#[async_trait::async_trait]
impl Authenticator for TwitterWeb {
    async fn authenticate(
        &self,
        credentials: &CredentialPair,
    ) -> Result<Arc<dyn UpstreamSession>, SessionError> {
        let me = self.verify(credentials, Phase::Authenticate).await?;
        if me.id_str.is_empty() {
            return Err(SessionError::AuthenticationFailed(
                "upstream did not return a user id".into(),
            ));
        }
        tracing::debug!(user = %me.screen_name, "twitter credentials verified");
        Ok(Arc::new(TwitterSession {
            web: self.clone(),
            credentials: credentials.clone(),
            user_id: me.id_str,
        }))
    }
}

/// An authenticated cookie session.
pub struct TwitterSession {
    web: TwitterWeb,
    credentials: CredentialPair,
    user_id: String,
}

impl TwitterSession {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.web.request(Method::GET, path, &self.credentials)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.web.request(Method::POST, path, &self.credentials)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        operation: &str,
    ) -> Result<T, SessionError> {
        self.web.send_as(req, Phase::Invoke, operation).await
    }

    async fn lookup_user(&self, screen_name: &str, operation: &str) -> Result<UserWire, SessionError> {
        let req = self
            .get("/1.1/users/show.json")
            .query(&[("screen_name", screen_name)]);
        self.fetch(req, operation).await
    }

    async fn timeline(&self, timeline_type: &str, count: i64, operation: &str) -> Result<JsonValue, SessionError> {
        let req = self
            .get("/1.1/statuses/home_timeline.json")
            .query(&[("count", count.to_string()), ("timeline_type", timeline_type.to_string())]);
        let tweets: Vec<TweetWire> = self.fetch(req, operation).await?;
        Ok(tweets_json(tweets))
    }
}

fn str_param<'a>(params: &'a Params, name: &str) -> Result<&'a str, SessionError> {
    params
        .get(name)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| SessionError::InvalidOperation(format!("missing required field: {name}")))
}

/// Tweet ids are numeric; anything else could reshape the request path.
fn tweet_id_param<'a>(params: &'a Params) -> Result<&'a str, SessionError> {
    let id = str_param(params, "tweet_id")?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SessionError::InvalidOperation(format!(
            "tweet_id must be numeric, got '{id}'"
        )));
    }
    Ok(id)
}

fn count_param(params: &Params) -> i64 {
    params
        .get("count")
        .and_then(JsonValue::as_i64)
        .unwrap_or(DEFAULT_COUNT)
}

fn tweets_json(tweets: Vec<TweetWire>) -> JsonValue {
    let tweets: Vec<Tweet> = tweets.into_iter().map(Tweet::from).collect();
    json!({ "tweets": tweets })
}

#[async_trait::async_trait]
impl UpstreamSession for TwitterSession {
    async fn invoke(&self, operation: &str, params: &Params) -> Result<JsonValue, SessionError> {
        match operation {
            ops::WHOAMI => {
                let me = UserProfile::from(self.web.verify(&self.credentials, Phase::Invoke).await?);
                Ok(json!({
                    "authenticated": true,
                    "user": {
                        "id": me.id,
                        "username": me.username,
                        "name": me.name,
                        "followers_count": me.followers_count,
                        "following_count": me.following_count,
                        "tweet_count": me.tweet_count,
                        "verified": me.verified,
                    }
                }))
            }
            ops::TWEET => {
                let text = str_param(params, "text")?;
                let req = self
                    .post("/1.1/statuses/update.json")
                    .form(&[("status", text)]);
                let tweet: TweetWire = self.fetch(req, operation).await?;
                Ok(json!(Tweet::from(tweet)))
            }
            ops::GET_USER_INFO => {
                let user = self.lookup_user(str_param(params, "username")?, operation).await?;
                Ok(json!(UserProfile::from(user)))
            }
            ops::SEARCH_TWEETS => {
                let query = str_param(params, "query")?;
                let result_type = match params.get("product").and_then(JsonValue::as_str) {
                    Some("Top") => "popular",
                    _ => "recent",
                };
                let req = self.get("/1.1/search/tweets.json").query(&[
                    ("q", query.to_string()),
                    ("count", count_param(params).to_string()),
                    ("result_type", result_type.to_string()),
                ]);
                let found: SearchWire = self.fetch(req, operation).await?;
                Ok(tweets_json(found.statuses))
            }
            ops::GET_TIMELINE => self.timeline("for_you", count_param(params), operation).await,
            ops::GET_LATEST_TIMELINE => {
                self.timeline("following", count_param(params), operation).await
            }
            ops::GET_USER_TWEETS => {
                let user = self.lookup_user(str_param(params, "username")?, operation).await?;
                let req = self.get("/1.1/statuses/user_timeline.json").query(&[
                    ("user_id", user.id_str),
                    ("count", count_param(params).to_string()),
                ]);
                let tweets: Vec<TweetWire> = self.fetch(req, operation).await?;
                Ok(tweets_json(tweets))
            }
            ops::LIKE_TWEET => {
                let tweet_id = tweet_id_param(params)?;
                let req = self
                    .post("/1.1/favorites/create.json")
                    .form(&[("id", tweet_id)]);
                self.web.send(req, Phase::Invoke, operation).await?;
                Ok(json!({ "success": true, "tweet_id": tweet_id }))
            }
            ops::RETWEET => {
                let tweet_id = tweet_id_param(params)?;
                let req = self.post(&format!("/1.1/statuses/retweet/{tweet_id}.json"));
                self.web.send(req, Phase::Invoke, operation).await?;
                Ok(json!({ "success": true, "tweet_id": tweet_id }))
            }
            ops::SEND_DM => {
                let recipient = str_param(params, "recipient_username")?;
                let text = str_param(params, "text")?;
                let user = self.lookup_user(recipient, operation).await?;
                let req = self.post("/1.1/direct_messages/events/new.json").json(&json!({
                    "event": {
                        "type": "message_create",
                        "message_create": {
                            "target": { "recipient_id": user.id_str },
                            "message_data": { "text": text }
                        }
                    }
                }));
                let created: DmCreatedWire = self.fetch(req, operation).await?;
                let message = DirectMessage::from(created.event);
                Ok(json!({
                    "success": true,
                    "recipient_username": recipient,
                    "recipient_user_id": user.id_str,
                    "text": text,
                    "message_id": message.id,
                    "created_at": message.time,
                }))
            }
            ops::GET_DM_HISTORY => {
                let peer = self
                    .lookup_user(str_param(params, "recipient_username")?, operation)
                    .await?;
                let count = usize::try_from(count_param(params)).unwrap_or(0);
                let req = self.get("/1.1/direct_messages/events/list.json");
                let list: DmListWire = self.fetch(req, operation).await?;
                let messages: Vec<DirectMessage> = list
                    .events
                    .into_iter()
                    .filter(|e: &DmEventWire| e.involves(&peer.id_str))
                    .take(count)
                    .map(DirectMessage::from)
                    .collect();
                Ok(json!({ "messages": messages }))
            }
            ops::ADD_REACTION_TO_MESSAGE => {
                let message_id = str_param(params, "message_id")?;
                let emoji = str_param(params, "emoji")?;
                let conversation_id = str_param(params, "conversation_id")?;
                let req = self.post("/1.1/dm/reaction/new.json").form(&[
                    ("dm_id", message_id),
                    ("conversation_id", conversation_id),
                    ("reaction_key", emoji),
                ]);
                self.web.send(req, Phase::Invoke, operation).await?;
                Ok(json!({
                    "success": true,
                    "message_id": message_id,
                    "emoji": emoji,
                    "conversation_id": conversation_id,
                }))
            }
            ops::DELETE_DM => {
                let message_id = str_param(params, "message_id")?;
                let req = self
                    .web
                    .request(Method::DELETE, "/1.1/direct_messages/events/destroy.json", &self.credentials)
                    .query(&[("id", message_id)]);
                self.web.send(req, Phase::Invoke, operation).await?;
                Ok(json!({ "success": true, "message_id": message_id }))
            }
            other => Err(SessionError::InvalidOperation(format!(
                "unsupported operation: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn creds() -> CredentialPair {
        CredentialPair::new("tokA", "tokB")
    }

    fn me() -> JsonValue {
        json!({"id_str": "42", "screen_name": "me", "name": "Me", "followers_count": 1})
    }

    fn params(v: JsonValue) -> Params {
        v.as_object().cloned().unwrap()
    }

    async fn session(server: &MockServer) -> Arc<dyn UpstreamSession> {
        server.mock(|when, then| {
            when.method(GET).path(VERIFY_PATH);
            then.status(200).json_body(me());
        });
        let web = TwitterWeb::new(server.base_url()).unwrap();
        web.authenticate(&creds()).await.unwrap()
    }

    #[tokio::test]
    async fn authenticate_sends_cookies_and_csrf_header() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path(VERIFY_PATH)
                .header("cookie", "ct0=tokA; auth_token=tokB")
                .header("x-csrf-token", "tokA")
                .header_exists("x-request-id")
                .header_exists("user-agent");
            then.status(200).json_body(me());
        });
        let web = TwitterWeb::new(server.base_url()).unwrap();
        assert!(web.authenticate(&creds()).await.is_ok());
        m.assert();
    }

    #[tokio::test]
    async fn bearer_token_is_sent_when_configured() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path(VERIFY_PATH)
                .header("authorization", "Bearer public-web-token");
            then.status(200).json_body(me());
        });
        let web = TwitterWeb::from_config(&UpstreamConfig {
            base_url: server.base_url(),
            bearer_token: Some("public-web-token".into()),
            ..UpstreamConfig::default()
        })
        .unwrap();
        assert!(web.authenticate(&creds()).await.is_ok());
        m.assert();
    }

    #[tokio::test]
    async fn authenticate_rejection_is_authentication_failed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(VERIFY_PATH);
            then.status(401)
                .json_body(json!({"errors": [{"code": 32, "message": "Could not authenticate you."}]}));
        });
        let web = TwitterWeb::new(server.base_url()).unwrap();
        let err = web.authenticate(&creds()).await.err().unwrap();
        assert_eq!(err.kind(), "authentication_failed");
        assert!(err.to_string().contains("Could not authenticate you."));
    }

    #[tokio::test]
    async fn authenticate_network_failure_is_upstream_error() {
        let web = TwitterWeb::new("http://127.0.0.1:9").unwrap();
        let err = web.authenticate(&creds()).await.err().unwrap();
        assert_eq!(err.kind(), "upstream_error");
    }

    #[tokio::test]
    async fn authenticate_without_user_id_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(VERIFY_PATH);
            then.status(200).json_body(json!({"screen_name": "ghost"}));
        });
        let web = TwitterWeb::new(server.base_url()).unwrap();
        let err = web.authenticate(&creds()).await.err().unwrap();
        assert_eq!(err.kind(), "authentication_failed");
    }

    #[tokio::test]
    async fn timeline_is_shaped_into_tweets() {
        let server = MockServer::start();
        let s = session(&server).await;
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/1.1/statuses/home_timeline.json")
                .query_param("count", "20")
                .query_param("timeline_type", "for_you");
            then.status(200).json_body(json!([{
                "id_str": "1", "full_text": "hello",
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "user": {"id_str": "7", "screen_name": "rustlang", "name": "Rust"},
                "favorite_count": 5, "retweet_count": 2, "reply_count": 1
            }]));
        });

        let out = s
            .invoke(ops::GET_TIMELINE, &params(json!({"count": 20})))
            .await
            .unwrap();
        m.assert();
        assert_eq!(out["tweets"][0]["id"], "1");
        assert_eq!(out["tweets"][0]["author"], "rustlang");
        assert_eq!(out["tweets"][0]["like_count"], 5);
        assert_eq!(out["tweets"][0]["created_at"], "2018-10-10T20:19:24+00:00");
    }

    #[tokio::test]
    async fn latest_timeline_uses_following_feed() {
        let server = MockServer::start();
        let s = session(&server).await;
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/1.1/statuses/home_timeline.json")
                .query_param("timeline_type", "following");
            then.status(200).json_body(json!([]));
        });
        let out = s.invoke(ops::GET_LATEST_TIMELINE, &Params::new()).await.unwrap();
        m.assert();
        assert_eq!(out["tweets"], json!([]));
    }

    #[tokio::test]
    async fn search_maps_product_to_result_type() {
        let server = MockServer::start();
        let s = session(&server).await;
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/1.1/search/tweets.json")
                .query_param("q", "rust")
                .query_param("count", "5")
                .query_param("result_type", "popular");
            then.status(200).json_body(json!({"statuses": [{"id_str": "3", "text": "t"}]}));
        });
        let out = s
            .invoke(
                ops::SEARCH_TWEETS,
                &params(json!({"query": "rust", "count": 5, "product": "Top"})),
            )
            .await
            .unwrap();
        m.assert();
        assert_eq!(out["tweets"][0]["text"], "t");
    }

    #[tokio::test]
    async fn tweet_posts_status_form() {
        let server = MockServer::start();
        let s = session(&server).await;
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/1.1/statuses/update.json")
                .x_www_form_urlencoded_tuple("status", "hello world");
            then.status(200).json_body(json!({
                "id_str": "99", "text": "hello world",
                "user": {"id_str": "42", "screen_name": "me", "name": "Me"}
            }));
        });
        let out = s
            .invoke(ops::TWEET, &params(json!({"text": "hello world"})))
            .await
            .unwrap();
        m.assert();
        assert_eq!(out["id"], "99");
        assert_eq!(out["author"], "me");
    }

    #[tokio::test]
    async fn like_and_retweet_acknowledge() {
        let server = MockServer::start();
        let s = session(&server).await;
        let like = server.mock(|when, then| {
            when.method(POST)
                .path("/1.1/favorites/create.json")
                .x_www_form_urlencoded_tuple("id", "123");
            then.status(200).json_body(json!({"id_str": "123"}));
        });
        let rt = server.mock(|when, then| {
            when.method(POST).path("/1.1/statuses/retweet/123.json");
            then.status(200).json_body(json!({"id_str": "124"}));
        });

        let p = params(json!({"tweet_id": "123"}));
        assert_eq!(
            s.invoke(ops::LIKE_TWEET, &p).await.unwrap(),
            json!({"success": true, "tweet_id": "123"})
        );
        assert_eq!(
            s.invoke(ops::RETWEET, &p).await.unwrap(),
            json!({"success": true, "tweet_id": "123"})
        );
        like.assert();
        rt.assert();
    }

    #[tokio::test]
    async fn non_numeric_tweet_ids_never_reach_upstream() {
        let server = MockServer::start();
        let s = session(&server).await;
        let elsewhere = server.mock(|when, then| {
            when.method(POST).path("/1.1/account/settings.json");
            then.status(200).json_body(json!({}));
        });
        let like = server.mock(|when, then| {
            when.method(POST).path("/1.1/favorites/create.json");
            then.status(200).json_body(json!({}));
        });

        for id in ["../../account/settings", "123?x=1", "", "12a"] {
            let p = params(json!({ "tweet_id": id }));
            for op in [ops::RETWEET, ops::LIKE_TWEET] {
                let err = s.invoke(op, &p).await.unwrap_err();
                assert_eq!(err.kind(), "invalid_operation", "{op} {id}");
            }
        }
        elsewhere.assert_hits(0);
        like.assert_hits(0);
    }

    #[tokio::test]
    async fn send_dm_resolves_recipient_first() {
        let server = MockServer::start();
        let s = session(&server).await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/1.1/users/show.json")
                .query_param("screen_name", "friend");
            then.status(200).json_body(json!({"id_str": "77", "screen_name": "friend"}));
        });
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/1.1/direct_messages/events/new.json")
                .json_body(json!({"event": {
                    "type": "message_create",
                    "message_create": {
                        "target": {"recipient_id": "77"},
                        "message_data": {"text": "hey"}
                    }
                }}));
            then.status(200).json_body(json!({"event": {
                "id": "dm1", "created_timestamp": "1539202764000"
            }}));
        });

        let out = s
            .invoke(ops::SEND_DM, &params(json!({"recipient_username": "friend", "text": "hey"})))
            .await
            .unwrap();
        m.assert();
        assert_eq!(out["recipient_user_id"], "77");
        assert_eq!(out["message_id"], "dm1");
        assert_eq!(out["created_at"], "2018-10-10T20:19:24+00:00");
    }

    #[tokio::test]
    async fn dm_history_is_filtered_and_truncated() {
        let server = MockServer::start();
        let s = session(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/1.1/users/show.json");
            then.status(200).json_body(json!({"id_str": "77", "screen_name": "friend"}));
        });
        let event = |id: &str, sender: &str, recipient: &str| {
            json!({
                "id": id, "created_timestamp": "1539202764000",
                "message_create": {
                    "sender_id": sender,
                    "target": {"recipient_id": recipient},
                    "message_data": {"text": id}
                }
            })
        };
        server.mock(|when, then| {
            when.method(GET).path("/1.1/direct_messages/events/list.json");
            then.status(200).json_body(json!({"events": [
                event("a", "77", "42"),
                event("b", "13", "42"),
                event("c", "42", "77"),
                event("d", "77", "42"),
            ]}));
        });

        let out = s
            .invoke(
                ops::GET_DM_HISTORY,
                &params(json!({"recipient_username": "friend", "count": 2})),
            )
            .await
            .unwrap();
        let ids: Vec<_> = out["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[tokio::test]
    async fn reaction_and_delete_acknowledge() {
        let server = MockServer::start();
        let s = session(&server).await;
        let react = server.mock(|when, then| {
            when.method(POST)
                .path("/1.1/dm/reaction/new.json")
                .x_www_form_urlencoded_tuple("dm_id", "m1")
                .x_www_form_urlencoded_tuple("conversation_id", "c1")
                .x_www_form_urlencoded_tuple("reaction_key", "👍");
            then.status(204);
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE)
                .path("/1.1/direct_messages/events/destroy.json")
                .query_param("id", "m1");
            then.status(204);
        });

        let out = s
            .invoke(
                ops::ADD_REACTION_TO_MESSAGE,
                &params(json!({"message_id": "m1", "emoji": "👍", "conversation_id": "c1"})),
            )
            .await
            .unwrap();
        assert_eq!(out["emoji"], "👍");
        let out = s
            .invoke(ops::DELETE_DM, &params(json!({"message_id": "m1"})))
            .await
            .unwrap();
        assert_eq!(out, json!({"success": true, "message_id": "m1"}));
        react.assert();
        delete.assert();
    }

    #[tokio::test]
    async fn unauthorized_during_invoke_is_session_expired() {
        let server = MockServer::start();
        let s = session(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/1.1/statuses/home_timeline.json");
            then.status(401).body("");
        });
        let err = s.invoke(ops::GET_TIMELINE, &Params::new()).await.unwrap_err();
        assert_eq!(err.kind(), "session_expired");
    }

    #[tokio::test]
    async fn rate_limit_is_transient_upstream_error() {
        let server = MockServer::start();
        let s = session(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/1.1/statuses/home_timeline.json");
            then.status(429)
                .json_body(json!({"errors": [{"code": 88, "message": "Rate limit exceeded"}]}));
        });
        let err = s.invoke(ops::GET_TIMELINE, &Params::new()).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_error");
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn unknown_operation_and_missing_param_are_rejected() {
        let server = MockServer::start();
        let s = session(&server).await;
        let err = s.invoke("follow", &Params::new()).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");
        let err = s.invoke(ops::TWEET, &Params::new()).await.unwrap_err();
        assert!(err.to_string().contains("missing required field: text"));
    }

    #[test]
    fn classify_covers_the_taxonomy() {
        let expired = r#"{"errors":[{"code":89,"message":"Invalid or expired token."}]}"#;
        assert_eq!(
            classify(StatusCode::FORBIDDEN, expired, Phase::Invoke).kind(),
            "session_expired"
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, expired, Phase::Authenticate).kind(),
            "authentication_failed"
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, "", Phase::Invoke).kind(),
            "upstream_error"
        );
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, "oops", Phase::Authenticate).kind(),
            "upstream_error"
        );
        assert!(classify(StatusCode::BAD_GATEWAY, "", Phase::Invoke)
            .to_string()
            .contains("502"));
    }
}
