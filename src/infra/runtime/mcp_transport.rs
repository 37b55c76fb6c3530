//! MCP transports (stdio + streamable HTTP) for any [`ServerHandler`].

use std::sync::Arc;

use rmcp::serve_server;
use rmcp::transport::streamable_http_server::tower::{StreamableHttpServerConfig, StreamableHttpService};

pub use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
pub use rmcp::ServerHandler;

/// Speak JSON-RPC over stdin/stdout until the peer closes the stream.
pub async fn serve_stdio<H>(handler: H) -> anyhow::Result<()>
where
    H: ServerHandler,
{
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let running = serve_server(handler, (stdin, stdout)).await?;
    let reason = running.waiting().await?;
    tracing::info!(reason = ?reason, "stdio session closed");
    Ok(())
}

/// Every MCP session gets its own handler from `factory`; handlers are
/// expected to share state (the session cache) behind cheap clones.
pub fn make_streamable_http_service<H>(
    factory: impl Fn() -> H + Send + Sync + 'static,
    session_mgr: Arc<LocalSessionManager>,
) -> StreamableHttpService<H, LocalSessionManager>
where
    H: ServerHandler,
{
    let cfg = StreamableHttpServerConfig::default();
    tracing::debug!(stateful_mode = %cfg.stateful_mode, keep_alive = ?cfg.sse_keep_alive, "StreamableHttpServerConfig");
    StreamableHttpService::new(move || Ok(factory()), session_mgr, cfg)
}

/// Hand out clones of one handler.
pub fn shared<H>(handler: H) -> impl Fn() -> H + Send + Sync + 'static
where
    H: ServerHandler + Clone,
{
    move || handler.clone()
}
