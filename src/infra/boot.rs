use std::net::SocketAddr;
use std::time::Duration;

use crate::clients::TwitterWeb;
use crate::infra::config::{Config, Mode};
use crate::infra::http_app::build_app;
use crate::infra::runtime::mcp_transport::{serve_stdio, shared};
use crate::session::SessionCache;
use crate::tools::gateway::GatewaySvc;

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

pub async fn run_server() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;
    run(cfg).await
}

/// One upstream client and one session cache for the whole process.
pub fn build_gateway(cfg: &Config) -> anyhow::Result<GatewaySvc<TwitterWeb>> {
    let web = TwitterWeb::from_config(&cfg.upstream)?;
    let cache = SessionCache::with_idle_timeout(web, cfg.session.idle_timeout);
    Ok(GatewaySvc::new(cache, cfg.credentials.clone()))
}

/// Sweep twice per idle window, but not more than once a second.
pub fn sweep_period(idle_timeout: Option<Duration>) -> Duration {
    idle_timeout
        .map(|t| (t / 2).max(MIN_SWEEP_PERIOD))
        .unwrap_or(MIN_SWEEP_PERIOD)
}

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    tracing::info!(
        mode = %cfg.mode,
        port = cfg.port,
        base_url = %cfg.upstream.base_url,
        idle_timeout = ?cfg.session.idle_timeout,
        env_fallback = cfg.credentials.allow_environment_fallback,
        "BOOT twitter-mcp-gateway"
    );

    let gateway = build_gateway(&cfg)?;
    let sweeper = gateway
        .cache()
        .spawn_idle_sweeper(sweep_period(cfg.session.idle_timeout));

    let served = match cfg.mode {
        // stdout carries protocol frames; no HTTP listener.
        Mode::Stdio => serve_stdio(gateway).await,
        Mode::Server => {
            let app = build_app(shared(gateway));
            let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(%addr, "listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(anyhow::Error::from)
        }
    };

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
