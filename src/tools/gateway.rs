//! The MCP server handler.
//!
//! Tools and resources are served from the static catalog rather than
//! macro-generated routes, so the advertised schemas are exactly the ones
//! arguments are validated against. Every call goes through the shared
//! [`SessionCache`].

use std::sync::Arc;

use rmcp::model::{
    AnnotateAble, CallToolRequestParam, CallToolResult, Implementation, ListResourcesResult,
    ListToolsResult, PaginatedRequestParam, RawResource, ReadResourceRequestParam,
    ReadResourceResult, Resource, ResourceContents, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use serde_json::{json, Value as JsonValue};

use super::catalog::{self, AUTH_TOKEN, CT0};
use super::resources::{self, ResourceError, MIME_TYPE, RESOURCES};
use crate::core::Params;
use crate::infra::config::CredentialConfig;
use crate::infra::logging;
use crate::session::{Authenticator, CredentialPair, SessionCache, SessionError};

pub const SERVER_NAME: &str = "twitter-mcp";

const MISSING_ENV_CREDENTIALS: &str = "Authentication required. Please provide TWITTER_AUTH_TOKEN and TWITTER_CT0 environment variables or use tools with ct0 and auth_token parameters.";

pub struct GatewaySvc<A> {
    cache: SessionCache<A>,
    credentials: Arc<CredentialConfig>,
}

impl<A> Clone for GatewaySvc<A> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            credentials: Arc::clone(&self.credentials),
        }
    }
}

impl<A: Authenticator> GatewaySvc<A> {
    pub fn new(cache: SessionCache<A>, credentials: CredentialConfig) -> Self {
        Self {
            cache,
            credentials: Arc::new(credentials),
        }
    }

    pub fn cache(&self) -> &SessionCache<A> {
        &self.cache
    }

    fn credentials_required(&self) -> bool {
        !self.credentials.allow_environment_fallback
    }

    pub fn tools(&self) -> Vec<Tool> {
        let required = self.credentials_required();
        catalog::TOOLS
            .iter()
            .map(|t| Tool::new(t.name, t.description, catalog::input_schema(t, required)))
            .collect()
    }

    pub fn resources(&self) -> Vec<Resource> {
        RESOURCES
            .iter()
            .map(|r| {
                let mut raw = RawResource::new(r.uri(), r.name.to_string());
                raw.description = Some(r.description.to_string());
                raw.mime_type = Some(MIME_TYPE.to_string());
                raw.no_annotation()
            })
            .collect()
    }

    /// Per-call cookies win. Without any, the process-wide pair is used only
    /// when fallback is enabled.
    fn resolve_credentials(&self, args: &Params) -> Result<CredentialPair, SessionError> {
        let ct0 = cookie_arg(args, CT0)?;
        let auth = cookie_arg(args, AUTH_TOKEN)?;
        match (ct0, auth) {
            (Some(c), Some(a)) => Ok(CredentialPair::new(c, a)),
            (None, None) if self.credentials.allow_environment_fallback => {
                self.credentials.environment.clone().ok_or_else(|| {
                    SessionError::InvalidCredentialFormat(
                        "no cookies supplied and TWITTER_CT0/TWITTER_AUTH_TOKEN are not configured"
                            .into(),
                    )
                })
            }
            _ => Err(SessionError::InvalidCredentialFormat(
                "both ct0 and auth_token cookies are required for all operations".into(),
            )),
        }
    }

    /// Validate and dispatch one tool call. Bad arguments are protocol
    /// errors; everything that goes wrong after that is an `isError` result
    /// carrying `{"error": {"kind", "message"}}`.
    pub async fn call(&self, name: &str, args: Params) -> Result<CallToolResult, McpError> {
        let spec = catalog::find(name)
            .ok_or_else(|| McpError::invalid_params(format!("unknown tool: {name}"), None))?;
        let params = spec
            .validate(&args)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        tracing::debug!(tool = name, params = ?params, "tool call");

        let started = std::time::Instant::now();
        let outcome = match self.resolve_credentials(&args) {
            Ok(creds) => self.cache.invoke(&creds, spec.operation, &params).await,
            Err(e) => Err(e),
        };
        logging::log_metric(name, "latency_ms", started.elapsed().as_secs_f64() * 1000.0);
        match outcome {
            Ok(value) => Ok(CallToolResult::structured(value)),
            Err(e) => {
                tracing::info!(tool = name, kind = e.kind(), error = %e, "tool call failed");
                Ok(CallToolResult::structured_error(e.to_structured()))
            }
        }
    }

    /// Read a `twitter://` resource with the process-wide credentials. The
    /// body is pretty JSON; session failures are reported in it.
    pub async fn read(&self, uri: &str) -> Result<String, McpError> {
        let read = resources::resolve(uri).map_err(|e| match e {
            ResourceError::InvalidUri(_) => McpError::invalid_params(e.to_string(), None),
            _ => McpError::resource_not_found(e.to_string(), Some(json!({ "uri": uri }))),
        })?;

        let body = match &self.credentials.environment {
            None => json!({ "error": MISSING_ENV_CREDENTIALS }),
            Some(creds) => self
                .cache
                .invoke(creds, read.spec.operation, &read.params)
                .await
                .unwrap_or_else(|e| e.to_structured()),
        };
        serde_json::to_string_pretty(&body).map_err(|e| McpError::internal_error(e.to_string(), None))
    }
}

fn cookie_arg<'a>(args: &'a Params, name: &str) -> Result<Option<&'a str>, SessionError> {
    match args.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s)),
        Some(_) => Err(SessionError::InvalidCredentialFormat(format!(
            "{name} must be a string"
        ))),
    }
}

impl<A: Authenticator> ServerHandler for GatewaySvc<A> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Twitter tools. Pass the ct0 and auth_token cookies of a logged-in session with every call."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tools(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&request.name, request.arguments.unwrap_or_default())
            .await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.resources(),
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.read(&request.uri).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}
